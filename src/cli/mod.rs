//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the audit log.

pub mod log;
pub mod tracked;

pub use log::{handle_log_command, ActionFilter, LogCommands};
pub use tracked::{handle_tracked_command, TrackedCommands};
