//! Route handlers, one module per resource.

pub mod answers;
pub mod articles;
pub mod challenges;
pub mod comments;
pub mod communities;
pub mod notifications;
pub mod polls;
pub mod questions;
pub mod tags;
pub mod users;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}
