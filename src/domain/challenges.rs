//! Challenge progress arithmetic.

use crate::domain::entities::ChallengeRecord;

/// Outcome of advancing one user's progress on one challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Already completed; nothing changes.
    AlreadyComplete,
    /// Progress moved forward without reaching the target.
    Progressed { progress: i32 },
    /// This step reached the target.
    Completed { progress: i32, reward_points: i32 },
}

/// Advance progress by one step, never beyond the challenge target.
pub fn advance(challenge: &ChallengeRecord, current: i32, already_completed: bool) -> Advance {
    let target = challenge.target.max(1);
    if already_completed || current >= target {
        return Advance::AlreadyComplete;
    }

    let progress = (current + 1).min(target);
    if progress == target {
        Advance::Completed {
            progress,
            reward_points: challenge.reward_points,
        }
    } else {
        Advance::Progressed { progress }
    }
}
