//! Audit record display formatting
//!
//! Formats audit records for terminal output in table and detail views.

use crate::audit::{AuditRecord, ChangeFormat, ABSENT_VALUE};

/// Format a list of audit records as a table
pub fn format_record_list(records: &[AuditRecord]) -> String {
    if records.is_empty() {
        return "No audit records found.".to_string();
    }

    let entity_width = records
        .iter()
        .map(|r| r.entity_type().len() + 1 + r.object_pk().len())
        .max()
        .unwrap_or(6)
        .max(6);

    let actor_width = records
        .iter()
        .map(|r| r.actor_label().len())
        .max()
        .unwrap_or(5)
        .max(5);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<8}  {:<19}  {:<6}  {:<entity_width$}  {:<actor_width$}  {}\n",
        "ID",
        "Timestamp",
        "Action",
        "Object",
        "Actor",
        "Fields",
        entity_width = entity_width,
        actor_width = actor_width,
    ));

    output.push_str(&format!(
        "{:-<8}  {:-<19}  {:-<6}  {:-<entity_width$}  {:-<actor_width$}  {:-<6}\n",
        "",
        "",
        "",
        "",
        "",
        "",
        entity_width = entity_width,
        actor_width = actor_width,
    ));

    for record in records {
        let changes = record.changes_dict();
        output.push_str(&format!(
            "{:<8}  {:<19}  {:<6}  {:<entity_width$}  {:<actor_width$}  {}\n",
            &record.id().to_string()[..8],
            record.timestamp().format("%Y-%m-%d %H:%M:%S"),
            record.action().to_string(),
            format!("{}:{}", record.entity_type(), record.object_pk()),
            record.actor_label(),
            changes.fields().collect::<Vec<_>>().join(","),
            entity_width = entity_width,
            actor_width = actor_width,
        ));
    }

    output.push_str(&format!("\n{} record(s)\n", records.len()));
    output
}

/// Format a single audit record with every field change on its own line
pub fn format_record_details(record: &AuditRecord, format: &ChangeFormat) -> String {
    let mut output = String::new();

    output.push_str(&format!("{}\n", record));
    output.push_str(&format!("  ID:          {}\n", record.id()));
    output.push_str(&format!(
        "  Timestamp:   {}\n",
        record.timestamp().format("%Y-%m-%d %H:%M:%S%.6f UTC")
    ));
    output.push_str(&format!("  Action:      {}\n", record.action()));
    output.push_str(&format!(
        "  Object:      {} {}",
        record.entity_type(),
        record.object_pk()
    ));
    if let Some(id) = record.object_id() {
        output.push_str(&format!(" (#{})", id));
    }
    output.push('\n');
    output.push_str(&format!("  Actor:       {}", record.actor_label()));
    if let Some(actor) = record.actor() {
        output.push_str(&format!(" [{}]", actor));
    }
    output.push('\n');
    output.push_str(&format!("  Session:     {}\n", record.session()));
    output.push_str(&format!(
        "  Remote addr: {}\n",
        record.remote_addr().unwrap_or(ABSENT_VALUE)
    ));

    if let Some(data) = record.additional_data() {
        output.push_str(&format!("  Metadata:    {}\n", data));
    }

    let changes = record.changes_dict();
    if changes.is_empty() {
        output.push_str("  Changes:     (none)\n");
    } else {
        output.push_str("  Changes:\n");
        for (field, change) in changes.iter() {
            output.push_str(&format!("    {}\n", change.render(field, format)));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{
        diff, Action, Actor, MemorySink, ObjectRef, Recorder, RemoteAddr, Snapshot,
        TrackedEntityConfig, UnitOfWork,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn sample_record() -> AuditRecord {
        let before = Snapshot::from_json(json!({"status": "draft"})).unwrap();
        let after = Snapshot::from_json(json!({"status": "published"})).unwrap();
        let changes = diff(Some(&before), Some(&after), &TrackedEntityConfig::new("Article"));
        let uow = UnitOfWork::bound(
            Some(Actor::authenticated("7", "alice")),
            RemoteAddr::direct("10.0.0.1"),
        );

        Recorder::new(Arc::new(MemorySink::new()))
            .record(Action::Update, "Article", &ObjectRef::new("42", "Hello"), &changes, &uow)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(format_record_list(&[]), "No audit records found.");
    }

    #[test]
    fn test_list_contains_rows() {
        let output = format_record_list(&[sample_record()]);
        assert!(output.contains("UPDATE"));
        assert!(output.contains("Article:42"));
        assert!(output.contains("alice"));
        assert!(output.contains("status"));
        assert!(output.contains("1 record(s)"));
    }

    #[test]
    fn test_details() {
        let output = format_record_details(&sample_record(), &ChangeFormat::default());
        assert!(output.starts_with("Updated Hello"));
        assert!(output.contains("(#42)"));
        assert!(output.contains("alice [7]"));
        assert!(output.contains("status: draft \u{2192} published"));
    }

    #[test]
    fn test_details_follow_change_format() {
        let format = ChangeFormat {
            arrow: " -> ".into(),
            ..ChangeFormat::default()
        };
        let record = sample_record();
        let output = format_record_details(&record, &format);

        assert!(output.contains("    status: draft -> published\n"));
        assert!(output.contains(&record.changes_str(&format)));
    }
}
