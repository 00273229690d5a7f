//! Configuration module for the audit log
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - Settings persistence (sink, rendering, tracked entity types)

pub mod paths;
pub mod settings;

pub use paths::AuditPaths;
pub use settings::{Settings, SinkKind};
