//! Domain layer types and invariants.

pub mod challenges;
pub mod content;
pub mod entities;
pub mod error;
pub mod notifications;
pub mod polls;
pub mod questions;
pub mod sessions;
pub mod slug;
pub mod types;
pub mod users;
pub mod votes;
