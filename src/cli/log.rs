//! Audit log CLI commands
//!
//! Implements commands for inspecting a JSON-lines audit log.

use clap::{Subcommand, ValueEnum};

use crate::audit::{Action, AuditRecord, JsonlSink};
use crate::config::settings::Settings;
use crate::display::{format_record_details, format_record_list};
use crate::error::{AuditError, AuditResult};

/// Action filter accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionFilter {
    Create,
    Update,
    Delete,
}

impl From<ActionFilter> for Action {
    fn from(filter: ActionFilter) -> Self {
        match filter {
            ActionFilter::Create => Action::Create,
            ActionFilter::Update => Action::Update,
            ActionFilter::Delete => Action::Delete,
        }
    }
}

/// Audit log subcommands
#[derive(Subcommand, Debug)]
pub enum LogCommands {
    /// List audit records
    List {
        /// Only the most recent N records
        #[arg(short, long)]
        recent: Option<usize>,

        /// Only records for this entity type
        #[arg(short, long)]
        entity: Option<String>,

        /// Only records for this object primary key
        #[arg(short, long)]
        object: Option<String>,

        /// Only records of this action
        #[arg(short, long, value_enum)]
        action: Option<ActionFilter>,

        /// Print records as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Show one record with its field changes
    Show {
        /// Record ID or unique ID prefix
        id: String,
    },
    /// Print the changes of every matching record, one line each
    Changes {
        /// Only records for this entity type
        #[arg(short, long)]
        entity: Option<String>,
    },
    /// Count records in the audit log
    Count,
}

/// Handle an audit log command
pub fn handle_log_command(
    sink: &JsonlSink,
    settings: &Settings,
    cmd: LogCommands,
) -> AuditResult<()> {
    match cmd {
        LogCommands::List {
            recent,
            entity,
            object,
            action,
            json,
        } => {
            let records = match recent {
                Some(count) => sink.read_recent(count)?,
                None => sink.read_all()?,
            };
            let records: Vec<_> = records
                .into_iter()
                .filter(|r| entity.as_deref().map_or(true, |e| r.entity_type() == e))
                .filter(|r| object.as_deref().map_or(true, |o| r.object_pk() == o))
                .filter(|r| action.map_or(true, |a| r.action() == Action::from(a)))
                .collect();

            if json {
                for record in &records {
                    println!("{}", serde_json::to_string(record)?);
                }
            } else {
                print!("{}", format_record_list(&records));
            }
        }
        LogCommands::Show { id } => {
            let record = find_record(sink, &id)?;
            print!(
                "{}",
                format_record_details(&record, &settings.change_format)
            );
        }
        LogCommands::Changes { entity } => {
            for record in sink.read_all()? {
                if entity.as_deref().is_some_and(|e| record.entity_type() != e) {
                    continue;
                }
                println!(
                    "{} {}: {}",
                    record.timestamp().format("%Y-%m-%d %H:%M:%S"),
                    record,
                    record.changes_str(&settings.change_format)
                );
            }
        }
        LogCommands::Count => {
            println!("{}", sink.entry_count()?);
        }
    }

    Ok(())
}

/// Find a record by full ID or unique prefix
fn find_record(sink: &JsonlSink, id: &str) -> AuditResult<AuditRecord> {
    let needle = id.trim().to_lowercase();
    let mut matches: Vec<_> = sink
        .read_all()?
        .into_iter()
        .filter(|r| r.id().to_string().starts_with(&needle))
        .collect();

    match matches.len() {
        0 => Err(AuditError::not_found("Audit record", id)),
        1 => Ok(matches.remove(0)),
        n => Err(AuditError::Config(format!(
            "ID prefix '{}' matches {} records, use more characters",
            id, n
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{
        diff, ObjectRef, Recorder, Snapshot, TrackedEntityConfig, UnitOfWork,
    };
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn populated_sink() -> (Arc<JsonlSink>, TempDir, Vec<AuditRecord>) {
        let temp_dir = TempDir::new().unwrap();
        let sink = Arc::new(JsonlSink::new(temp_dir.path().join("audit.log")));
        let recorder = Recorder::new(sink.clone());
        let after = Snapshot::from_json(json!({"title": "Hello"})).unwrap();
        let changes = diff(None, Some(&after), &TrackedEntityConfig::new("Article"));

        let records = (0..3)
            .map(|i| {
                recorder
                    .record(
                        Action::Create,
                        "Article",
                        &ObjectRef::new(i.to_string(), "Hello"),
                        &changes,
                        &UnitOfWork::new(),
                    )
                    .unwrap()
                    .unwrap()
            })
            .collect();

        (sink, temp_dir, records)
    }

    #[test]
    fn test_find_record_by_prefix() {
        let (sink, _temp, records) = populated_sink();
        let wanted = &records[1];

        let found = find_record(&sink, &wanted.id().to_string()).unwrap();
        assert_eq!(&found, wanted);

        let prefix = &wanted.id().to_string()[..12];
        assert_eq!(find_record(&sink, prefix).unwrap().id(), wanted.id());
    }

    #[test]
    fn test_find_record_missing() {
        let (sink, _temp, _) = populated_sink();
        let err = find_record(&sink, "zzzz").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_action_filter_conversion() {
        assert_eq!(Action::from(ActionFilter::Update), Action::Update);
    }
}
