//! CLI command implementations

pub mod config;
pub mod ls;
pub mod watch;
