//! Event recorder
//!
//! Turns a change set plus the bound context into an [`AuditRecord`] and
//! hands it to the configured sink, skipping updates that changed nothing.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::error::AuditResult;

use super::context::UnitOfWork;
use super::diff::ChangeSet;
use super::entry::{Action, AuditRecord, ObjectRef};
use super::sink::AuditSink;

/// Builds audit records and emits each one exactly once
pub struct Recorder {
    sink: Arc<dyn AuditSink>,
    last_timestamp: Mutex<Option<DateTime<Utc>>>,
}

impl Recorder {
    /// Create a recorder emitting to `sink`
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            last_timestamp: Mutex::new(None),
        }
    }

    /// Record one mutation
    ///
    /// Returns `Ok(None)` for an update whose change set is empty; nothing is
    /// emitted in that case. Otherwise the record is built from the unit of
    /// work's context, emitted, and returned.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if emission fails.
    pub fn record(
        &self,
        action: Action,
        entity_type: &str,
        object: &ObjectRef,
        changes: &ChangeSet,
        uow: &UnitOfWork,
    ) -> AuditResult<Option<AuditRecord>> {
        if action == Action::Update && changes.is_empty() {
            tracing::debug!(
                entity_type = %entity_type,
                object_pk = %object.pk,
                "update changed no tracked fields, nothing recorded"
            );
            return Ok(None);
        }

        // Held through emission so sinks receive records in timestamp order
        let mut last = self.last_timestamp.lock();
        let record = AuditRecord::new(
            action,
            entity_type,
            object,
            changes,
            uow,
            next_timestamp(&mut last),
        );
        self.sink.emit(&record)?;
        drop(last);

        tracing::info!(
            entity_type = %entity_type,
            object_pk = %object.pk,
            action = %action,
            fields = changes.len(),
            "{}: {}",
            uow.default_log_message(),
            record
        );

        Ok(Some(record))
    }
}

/// Wall-clock time, nudged forward so timestamps strictly increase
fn next_timestamp(last: &mut Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    let timestamp = match *last {
        Some(prev) if now <= prev => prev + Duration::microseconds(1),
        _ => now,
    };
    *last = Some(timestamp);
    timestamp
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("last_timestamp", &*self.last_timestamp.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::context::{Actor, RemoteAddr};
    use crate::audit::diff::diff;
    use crate::audit::registry::TrackedEntityConfig;
    use crate::audit::sink::MemorySink;
    use crate::audit::snapshot::Snapshot;
    use crate::error::AuditError;
    use serde_json::json;

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn emit(&self, _record: &AuditRecord) -> AuditResult<()> {
            Err(AuditError::Sink("disk full".into()))
        }
    }

    fn recorder() -> (Recorder, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (Recorder::new(sink.clone()), sink)
    }

    fn title_change() -> ChangeSet {
        let before = Snapshot::from_json(json!({"title": "Old"})).unwrap();
        let after = Snapshot::from_json(json!({"title": "New"})).unwrap();
        diff(Some(&before), Some(&after), &TrackedEntityConfig::new("Article"))
    }

    #[test]
    fn test_empty_update_is_suppressed() {
        let (recorder, sink) = recorder();
        let result = recorder
            .record(
                Action::Update,
                "Article",
                &ObjectRef::new("1", "Article 1"),
                &ChangeSet::default(),
                &UnitOfWork::new(),
            )
            .unwrap();

        assert!(result.is_none());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_empty_create_and_delete_are_recorded() {
        let (recorder, sink) = recorder();
        let object = ObjectRef::new("1", "Article 1");
        let uow = UnitOfWork::new();

        recorder
            .record(Action::Create, "Article", &object, &ChangeSet::default(), &uow)
            .unwrap();
        recorder
            .record(Action::Delete, "Article", &object, &ChangeSet::default(), &uow)
            .unwrap();

        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_record_is_emitted_once() {
        let (recorder, sink) = recorder();
        let uow = UnitOfWork::bound(
            Some(Actor::authenticated("7", "alice")),
            RemoteAddr::direct("10.0.0.1"),
        );

        let record = recorder
            .record(
                Action::Update,
                "Article",
                &ObjectRef::new("1", "Article 1"),
                &title_change(),
                &uow,
            )
            .unwrap()
            .unwrap();

        let emitted = sink.records();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0], record);
        assert_eq!(record.actor(), Some("7"));
        assert_eq!(record.remote_addr(), Some("10.0.0.1"));
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let (recorder, sink) = recorder();
        let uow = UnitOfWork::new();
        for i in 0..50 {
            recorder
                .record(
                    Action::Create,
                    "Article",
                    &ObjectRef::new(i.to_string(), "a"),
                    &title_change(),
                    &uow,
                )
                .unwrap();
        }

        let records = sink.records();
        assert!(records
            .windows(2)
            .all(|pair| pair[0].timestamp() < pair[1].timestamp()));
    }

    #[test]
    fn test_sink_error_propagates() {
        let recorder = Recorder::new(Arc::new(FailingSink));
        let err = recorder
            .record(
                Action::Create,
                "Article",
                &ObjectRef::new("1", "a"),
                &title_change(),
                &UnitOfWork::new(),
            )
            .unwrap_err();

        assert!(matches!(err, AuditError::Sink(_)));
    }

    #[test]
    fn test_concurrent_emission_follows_timestamp_order() {
        let (recorder, sink) = recorder();
        let after = Snapshot::from_json(json!({"title": "New"})).unwrap();
        let changes = diff(None, Some(&after), &TrackedEntityConfig::new("Article"));

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let (recorder, changes) = (&recorder, &changes);
                scope.spawn(move || {
                    for n in 0..50 {
                        recorder
                            .record(
                                Action::Create,
                                "Article",
                                &ObjectRef::new(format!("{worker}-{n}"), "New"),
                                changes,
                                &UnitOfWork::new(),
                            )
                            .unwrap();
                    }
                });
            }
        });

        let records = sink.records();
        assert_eq!(records.len(), 200);
        assert!(records
            .windows(2)
            .all(|pair| pair[0].timestamp() < pair[1].timestamp()));
    }
}
