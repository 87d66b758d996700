//! Vote toggling rules shared by every votable content kind.

use crate::domain::types::VoteDirection;

/// What the repository has to do after a vote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    /// No vote existed; store the requested one.
    Cast(VoteDirection),
    /// The same direction was requested again; remove the vote.
    Retract,
    /// The opposite direction was requested; overwrite the stored vote.
    Flip(VoteDirection),
}

impl VoteChange {
    /// The vote standing after the change has been applied.
    pub fn resulting(self) -> Option<VoteDirection> {
        match self {
            Self::Cast(direction) | Self::Flip(direction) => Some(direction),
            Self::Retract => None,
        }
    }

    /// Whether this change results in a freshly standing up-vote, which notifies the author.
    pub fn is_new_upvote(self) -> bool {
        matches!(
            self,
            Self::Cast(VoteDirection::Up) | Self::Flip(VoteDirection::Up)
        )
    }
}

/// A stored vote change plus what the voter had already done on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub change: VoteChange,
    /// The voter had never voted on this target before.
    pub first_vote: bool,
    /// The voter's vote became an up-vote for the first time.
    pub first_upvote: bool,
}

impl VoteOutcome {
    /// Classify `change` given whether the voter had voted or up-voted before.
    pub fn new(change: VoteChange, voted_before: bool, upvoted_before: bool) -> Self {
        Self {
            change,
            first_vote: !voted_before,
            first_upvote: change.is_new_upvote() && !upvoted_before,
        }
    }
}

/// Resolve a vote request against the voter's current vote on the same target.
pub fn resolve_vote(current: Option<VoteDirection>, requested: VoteDirection) -> VoteChange {
    match current {
        None => VoteChange::Cast(requested),
        Some(existing) if existing == requested => VoteChange::Retract,
        Some(_) => VoteChange::Flip(requested),
    }
}

/// Score contribution of a single vote.
pub fn weight(direction: VoteDirection) -> i64 {
    match direction {
        VoteDirection::Up => 1,
        VoteDirection::Down => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_vote_is_cast() {
        assert_eq!(
            resolve_vote(None, VoteDirection::Down),
            VoteChange::Cast(VoteDirection::Down)
        );
    }

    #[test]
    fn repeating_a_vote_retracts_it() {
        let change = resolve_vote(Some(VoteDirection::Up), VoteDirection::Up);
        assert_eq!(change, VoteChange::Retract);
        assert_eq!(change.resulting(), None);
        assert!(!change.is_new_upvote());
    }

    #[test]
    fn opposite_vote_flips() {
        let change = resolve_vote(Some(VoteDirection::Down), VoteDirection::Up);
        assert_eq!(change, VoteChange::Flip(VoteDirection::Up));
        assert!(change.is_new_upvote());
        assert_eq!(change.resulting(), Some(VoteDirection::Up));
    }

    #[test]
    fn weights_cancel_out() {
        assert_eq!(weight(VoteDirection::Up) + weight(VoteDirection::Down), 0);
    }

    #[test]
    fn toggling_back_is_not_a_first_vote() {
        let first = VoteOutcome::new(VoteChange::Cast(VoteDirection::Up), false, false);
        assert!(first.first_vote && first.first_upvote);

        let again = VoteOutcome::new(VoteChange::Cast(VoteDirection::Up), true, true);
        assert!(!again.first_vote && !again.first_upvote);

        let flipped_up = VoteOutcome::new(VoteChange::Flip(VoteDirection::Up), true, false);
        assert!(!flipped_up.first_vote && flipped_up.first_upvote);
    }
}
