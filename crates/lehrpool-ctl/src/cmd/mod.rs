//! CLI command modules.

pub mod config;
pub mod fetch;
pub mod inspect;
