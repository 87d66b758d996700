//! Agora: a self-hosted community Q&A backend.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
