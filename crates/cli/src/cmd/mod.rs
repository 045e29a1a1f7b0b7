//! CLI command implementations

pub mod config;
pub mod create;
pub mod list;
pub mod prune;
pub mod restore;
