//! Audit record data structures
//!
//! Defines the action kinds, the reference to the mutated object, and the
//! immutable record produced for each qualifying mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::context::UnitOfWork;
use super::diff::{ChangeFormat, ChangeSet};
use super::snapshot::TrackedRecord;

/// Kinds of mutation that are audited
///
/// Ordered by intrusiveness, so `action >= Action::Update` selects updates
/// and deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Action {
    /// Record was created
    Create = 0,
    /// Record was updated
    Update = 1,
    /// Record was deleted
    Delete = 2,
}

impl Action {
    /// Numeric code of the action
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Action for a numeric code, if it is one
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Action::Create),
            1 => Some(Action::Update),
            2 => Some(Action::Delete),
            _ => None,
        }
    }

    /// Past-tense verb used in display text
    pub fn verb(self) -> &'static str {
        action_verb(self.code())
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Create => write!(f, "CREATE"),
            Action::Update => write!(f, "UPDATE"),
            Action::Delete => write!(f, "DELETE"),
        }
    }
}

/// Verb for an action code; unknown codes read as "Logged"
pub fn action_verb(code: u8) -> &'static str {
    match Action::from_code(code) {
        Some(Action::Create) => "Created",
        Some(Action::Update) => "Updated",
        Some(Action::Delete) => "Deleted",
        None => "Logged",
    }
}

/// The mutated object as stored in an audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Textual primary key
    pub pk: String,
    /// Numeric primary key, when the textual one is an integer
    pub id: Option<i64>,
    /// Human-readable representation
    pub repr: String,
    /// Free-form metadata to attach to the record
    pub additional_data: Option<Value>,
}

impl ObjectRef {
    /// Reference an object by primary key and representation
    pub fn new(pk: impl Into<String>, repr: impl Into<String>) -> Self {
        let pk = pk.into();
        Self {
            id: pk.trim().parse().ok(),
            pk,
            repr: repr.into(),
            additional_data: None,
        }
    }

    /// Attach metadata
    pub fn with_additional_data(mut self, data: Value) -> Self {
        self.additional_data = Some(data);
        self
    }

    /// Reference a tracked record; `None` while it has no primary key
    pub fn of(record: &dyn TrackedRecord) -> Option<Self> {
        let pk = record.primary_key()?;
        let mut object = Self::new(pk, record.object_repr());
        object.additional_data = record.additional_data();
        Some(object)
    }
}

/// A single, immutable audit record
///
/// Fields are only readable: editing a record after the fact would break the
/// attribution to the actor that was bound when it was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    id: Uuid,

    /// When the mutation was recorded (UTC)
    timestamp: DateTime<Utc>,

    action: Action,

    entity_type: String,

    object_pk: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    object_id: Option<i64>,

    object_repr: String,

    /// Serialized change set, `{"field": [old, new]}`
    changes: String,

    /// Identifier of the authenticated actor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    actor: Option<String>,

    /// Actor display name or the unauthenticated sentinel
    actor_label: String,

    session: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote_addr: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    additional_data: Option<Value>,
}

impl AuditRecord {
    pub(crate) fn new(
        action: Action,
        entity_type: &str,
        object: &ObjectRef,
        changes: &ChangeSet,
        uow: &UnitOfWork,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            action,
            entity_type: entity_type.to_string(),
            object_pk: object.pk.clone(),
            object_id: object.id,
            object_repr: object.repr.clone(),
            changes: changes.to_json(),
            actor: uow.current_actor().map(|a| a.id.clone()),
            actor_label: uow.actor_label(),
            session: uow.session_tag().to_string(),
            remote_addr: uow.current_remote_address().map(str::to_string),
            additional_data: object.additional_data.clone(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn object_pk(&self) -> &str {
        &self.object_pk
    }

    pub fn object_id(&self) -> Option<i64> {
        self.object_id
    }

    pub fn object_repr(&self) -> &str {
        &self.object_repr
    }

    /// The serialized change set text
    pub fn changes(&self) -> &str {
        &self.changes
    }

    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    pub fn actor_label(&self) -> &str {
        &self.actor_label
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn remote_addr(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    pub fn additional_data(&self) -> Option<&Value> {
        self.additional_data.as_ref()
    }

    /// The recorded changes, empty if the stored text is unreadable
    pub fn changes_dict(&self) -> ChangeSet {
        ChangeSet::from_json(&self.changes)
    }

    /// The recorded changes as one line of text
    pub fn changes_str(&self, format: &ChangeFormat) -> String {
        self.changes_dict().render(format)
    }

    /// Format the record for human-readable output
    pub fn format_human_readable(&self, format: &ChangeFormat) -> String {
        let mut output = format!(
            "[{}] {} {} {} ({}) by {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.action,
            self.entity_type,
            self.object_pk,
            self.object_repr,
            self.actor_label
        );

        if let Some(addr) = &self.remote_addr {
            output.push_str(&format!(" from {}", addr));
        }

        let changes = self.changes_str(format);
        if !changes.is_empty() {
            output.push_str(&format!("\n  Changes: {}", changes));
        }

        output
    }
}

impl std::fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.action.verb(), self.object_repr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::context::{Actor, RemoteAddr};
    use crate::audit::diff::diff;
    use crate::audit::registry::TrackedEntityConfig;
    use crate::audit::snapshot::Snapshot;
    use serde_json::json;

    fn sample_changes() -> ChangeSet {
        let after = Snapshot::from_json(json!({"title": "Hello"})).unwrap();
        diff(None, Some(&after), &TrackedEntityConfig::new("Article"))
    }

    fn sample_record(uow: &UnitOfWork) -> AuditRecord {
        AuditRecord::new(
            Action::Create,
            "Article",
            &ObjectRef::new("42", "Hello"),
            &sample_changes(),
            uow,
            Utc::now(),
        )
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::Create.to_string(), "CREATE");
        assert_eq!(Action::Update.to_string(), "UPDATE");
        assert_eq!(Action::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_action_ordering() {
        assert!(Action::Create < Action::Update);
        assert!(Action::Update < Action::Delete);
        assert_eq!(Action::from_code(Action::Delete.code()), Some(Action::Delete));
        assert_eq!(Action::from_code(9), None);
    }

    #[test]
    fn test_verbs() {
        assert_eq!(Action::Create.verb(), "Created");
        assert_eq!(Action::Update.verb(), "Updated");
        assert_eq!(Action::Delete.verb(), "Deleted");
        assert_eq!(action_verb(7), "Logged");
    }

    #[test]
    fn test_object_ref_numeric_id() {
        assert_eq!(ObjectRef::new("42", "x").id, Some(42));
        assert_eq!(ObjectRef::new("acc-1", "x").id, None);
    }

    #[test]
    fn test_record_attribution() {
        let uow = UnitOfWork::bound(
            Some(Actor::authenticated("7", "alice")),
            RemoteAddr::direct("10.0.0.1").with_forwarded_for("1.2.3.4, 5.6.7.6"),
        );
        let record = sample_record(&uow);

        assert_eq!(record.actor(), Some("7"));
        assert_eq!(record.actor_label(), "alice");
        assert_eq!(record.remote_addr(), Some("1.2.3.4"));
        assert_eq!(record.object_id(), Some(42));
        assert_eq!(record.to_string(), "Created Hello");
    }

    #[test]
    fn test_record_without_actor() {
        let record = sample_record(&UnitOfWork::new());

        assert_eq!(record.actor(), None);
        assert_eq!(record.actor_label(), "An unauthenticated user");
        assert_eq!(record.session(), "NO_SESSION");
        assert_eq!(record.remote_addr(), None);
    }

    #[test]
    fn test_changes_accessors() {
        let record = sample_record(&UnitOfWork::new());

        assert_eq!(record.changes(), r#"{"title":[null,"Hello"]}"#);
        assert_eq!(record.changes_dict(), sample_changes());
        assert_eq!(
            record.changes_str(&ChangeFormat::default()),
            "title: None \u{2192} Hello"
        );
    }

    #[test]
    fn test_serialization() {
        let record = sample_record(&UnitOfWork::new());

        let json = serde_json::to_string(&record).unwrap();
        let deserialized: AuditRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized, record);
        assert!(json.contains(r#""action":"create""#));
    }

    #[test]
    fn test_human_readable_format() {
        let uow = UnitOfWork::bound(
            Some(Actor::authenticated("7", "alice")),
            RemoteAddr::direct("10.0.0.1"),
        );
        let formatted = sample_record(&uow).format_human_readable(&ChangeFormat::default());

        assert!(formatted.contains("CREATE"));
        assert!(formatted.contains("Article 42 (Hello)"));
        assert!(formatted.contains("by alice from 10.0.0.1"));
        assert!(formatted.contains("Changes: title"));
    }
}
