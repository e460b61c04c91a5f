//! CLI command handlers.

mod commands;

pub use commands::*;
