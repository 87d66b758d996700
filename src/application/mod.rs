//! Application services: orchestration over the repository traits.

pub mod answers;
pub mod articles;
pub mod auth;
pub mod challenges;
pub mod comments;
pub mod communities;
pub mod error;
pub mod events;
pub mod fanout;
pub mod jobs;
pub mod notifications;
pub mod pagination;
pub mod polls;
pub mod questions;
pub mod repos;
pub mod tags;
pub mod users;
pub mod votes;

#[cfg(test)]
pub(crate) mod test_support;
