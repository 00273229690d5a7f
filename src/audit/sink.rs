//! Emission targets for audit records
//!
//! Where a record ends up is the host's decision. A sink receives each
//! finished record exactly once.

use parking_lot::Mutex;

use crate::error::AuditResult;

use super::diff::ChangeFormat;
use super::entry::AuditRecord;

/// Receives completed audit records for storage or emission
pub trait AuditSink: Send + Sync {
    /// Store or emit one record
    fn emit(&self, record: &AuditRecord) -> AuditResult<()>;
}

/// Keeps records in memory, in emission order
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record emitted so far
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Remove and return every record emitted so far
    pub fn drain(&self) -> Vec<AuditRecord> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl AuditSink for MemorySink {
    fn emit(&self, record: &AuditRecord) -> AuditResult<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Emits each record as a structured log event
#[derive(Debug, Clone, Default)]
pub struct TracingSink {
    format: ChangeFormat,
}

impl TracingSink {
    pub fn new(format: ChangeFormat) -> Self {
        Self { format }
    }
}

impl AuditSink for TracingSink {
    fn emit(&self, record: &AuditRecord) -> AuditResult<()> {
        tracing::info!(
            target: "auditlog",
            id = %record.id(),
            entity_type = record.entity_type(),
            object_pk = record.object_pk(),
            action = %record.action(),
            actor = record.actor_label(),
            session = record.session(),
            remote_addr = record.remote_addr().unwrap_or_default(),
            "{}: {} with changes: '{}'",
            record.actor_label(),
            record,
            record.changes_str(&self.format)
        );
        Ok(())
    }
}
