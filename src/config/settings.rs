//! Audit log settings
//!
//! Manages where records are emitted, how change sets are rendered, and the
//! entity types registered from configuration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::paths::AuditPaths;
use crate::audit::{
    AuditSink, ChangeFormat, EntityType, JsonlSink, Registry, TracingSink, TrackedEntityConfig,
};
use crate::error::{AuditError, AuditResult};

/// Where finished audit records go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Append to the JSON-lines audit log file (default)
    #[default]
    Jsonl,
    /// Emit as structured log events
    Log,
}

/// Settings for the audit log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Emission target
    #[serde(default)]
    pub sink: SinkKind,

    /// Audit log file, relative to the base directory
    #[serde(default = "default_audit_log_file")]
    pub audit_log_file: String,

    /// Default log filter when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Rendering of change sets
    #[serde(default)]
    pub change_format: ChangeFormat,

    /// Entity types registered at startup
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracked: Vec<TrackedEntityConfig>,
}

fn default_schema_version() -> u32 {
    1
}

fn default_audit_log_file() -> String {
    "audit.log".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            sink: SinkKind::default(),
            audit_log_file: default_audit_log_file(),
            log_filter: default_log_filter(),
            change_format: ChangeFormat::default(),
            tracked: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or create default settings if file doesn't exist
    pub fn load_or_create(paths: &AuditPaths) -> Result<Self, AuditError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path)
                .map_err(|e| AuditError::Io(format!("Failed to read settings file: {}", e)))?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                AuditError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &AuditPaths) -> Result<(), AuditError> {
        paths.ensure_directories()?;

        let settings_path = paths.settings_file();
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| AuditError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(&settings_path, contents)
            .map_err(|e| AuditError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }

    /// The configured audit log file
    pub fn audit_log_path(&self, paths: &AuditPaths) -> std::path::PathBuf {
        paths.log_file(&self.audit_log_file)
    }

    /// Build the configured sink
    pub fn build_sink(&self, paths: &AuditPaths) -> AuditResult<Arc<dyn AuditSink>> {
        match self.sink {
            SinkKind::Jsonl => {
                paths.ensure_directories()?;
                Ok(Arc::new(JsonlSink::new(self.audit_log_path(paths))))
            }
            SinkKind::Log => Ok(Arc::new(TracingSink::new(self.change_format.clone()))),
        }
    }

    /// Register every configured entity type
    ///
    /// Stops at the first registration error.
    pub fn register_all(&self, registry: &Registry) -> AuditResult<Vec<EntityType>> {
        self.tracked
            .iter()
            .cloned()
            .map(|config| registry.register(config))
            .collect()
    }
}
