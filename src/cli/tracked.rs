//! Tracked entity CLI commands
//!
//! Implements commands for inspecting and checking the entity types
//! registered from configuration.

use std::sync::Arc;

use clap::Subcommand;

use crate::audit::{MemorySink, Recorder, Registry, TrackedEntityConfig};
use crate::config::settings::Settings;
use crate::error::AuditResult;

/// Tracked entity subcommands
#[derive(Subcommand, Debug)]
pub enum TrackedCommands {
    /// List configured entity types and their field policy
    List,
    /// Register every configured entity type and report failures
    Check,
}

/// Handle a tracked entity command
pub fn handle_tracked_command(settings: &Settings, cmd: TrackedCommands) -> AuditResult<()> {
    match cmd {
        TrackedCommands::List => {
            if settings.tracked.is_empty() {
                println!("No tracked entity types configured.");
                return Ok(());
            }
            for config in &settings.tracked {
                println!("{}", describe_policy(config));
            }
        }
        TrackedCommands::Check => {
            let registry = Registry::new(Arc::new(Recorder::new(Arc::new(MemorySink::new()))));
            let types = settings.register_all(&registry)?;
            println!("{} entity type(s) registered successfully.", types.len());
        }
    }

    Ok(())
}

fn join(fields: &std::collections::BTreeSet<String>) -> String {
    fields.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// One-line summary of a field policy
pub fn describe_policy(config: &TrackedEntityConfig) -> String {
    let mut parts = vec![format!(
        "include: {}",
        if config.include_fields.is_empty() {
            "*".to_string()
        } else {
            join(&config.include_fields)
        }
    )];

    if !config.exclude_fields.is_empty() {
        parts.push(format!("exclude: {}", join(&config.exclude_fields)));
    }
    if !config.mask_fields.is_empty() {
        parts.push(format!("mask: {}", join(&config.mask_fields)));
    }

    format!("{}  [{}]", config.entity_type, parts.join("; "))
}
