//! CLI command implementations.

pub mod cards;
pub mod common;
pub mod config;
pub mod play;
pub mod record;
