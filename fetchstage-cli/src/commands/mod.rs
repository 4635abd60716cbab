//! CLI subcommands.

pub mod clean;
pub mod common;
pub mod config;
pub mod fetch;
pub mod status;
