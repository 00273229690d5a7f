//! Field-level diffing of record snapshots
//!
//! Compares a prior and a current snapshot under a field policy and produces
//! the minimal set of changed fields. Values are normalized to text before
//! comparison so equal logical values never show up as a change.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use super::registry::TrackedEntityConfig;
use super::snapshot::Snapshot;

/// Placeholder written instead of the value of a masked field
pub const MASKED_VALUE: &str = "********";

/// Text shown for an absent value when rendering changes
pub const ABSENT_VALUE: &str = "None";

/// One field's movement from an old value to a new value
///
/// Serialized as a two-element array `[old, new]`, absent values as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "(Option<String>, Option<String>)",
    into = "(Option<String>, Option<String>)"
)]
pub struct FieldChange {
    old: Option<String>,
    new: Option<String>,
}

impl FieldChange {
    /// Build a change, or `None` when nothing moved
    ///
    /// Both sides absent and both sides equal are not changes.
    pub fn between(old: Option<String>, new: Option<String>) -> Option<Self> {
        if old == new {
            return None;
        }
        Some(Self { old, new })
    }

    /// The value before the mutation
    pub fn old_value(&self) -> Option<&str> {
        self.old.as_deref()
    }

    /// The value after the mutation
    pub fn new_value(&self) -> Option<&str> {
        self.new.as_deref()
    }

    /// Render as `field{colon}old{arrow}new`, absent values as `None`
    pub fn render(&self, field: &str, format: &ChangeFormat) -> String {
        format!(
            "{}{}{}{}{}",
            field,
            format.colon,
            self.old_value().unwrap_or(ABSENT_VALUE),
            format.arrow,
            self.new_value().unwrap_or(ABSENT_VALUE)
        )
    }

    fn masked(self) -> Self {
        Self {
            old: self.old.map(|_| MASKED_VALUE.to_string()),
            new: self.new.map(|_| MASKED_VALUE.to_string()),
        }
    }
}

impl TryFrom<(Option<String>, Option<String>)> for FieldChange {
    type Error = &'static str;

    fn try_from((old, new): (Option<String>, Option<String>)) -> Result<Self, Self::Error> {
        if old.is_none() && new.is_none() {
            return Err("a field change needs an old or a new value");
        }
        Ok(Self { old, new })
    }
}

impl From<FieldChange> for (Option<String>, Option<String>) {
    fn from(change: FieldChange) -> Self {
        (change.old, change.new)
    }
}

/// How a change set is rendered as a single line of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeFormat {
    /// Placed between the field name and the values
    pub colon: String,
    /// Placed between the old and the new value
    pub arrow: String,
    /// Placed between fields
    pub separator: String,
}

impl Default for ChangeFormat {
    fn default() -> Self {
        Self {
            colon: ": ".to_string(),
            arrow: " \u{2192} ".to_string(),
            separator: "; ".to_string(),
        }
    }
}

/// The filtered per-field differences of one mutation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<String, FieldChange>);

impl ChangeSet {
    /// Whether no visible field changed
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of changed fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Change recorded for a field, if any
    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.0.get(field)
    }

    /// Iterate over changed fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldChange)> {
        self.0.iter().map(|(name, change)| (name.as_str(), change))
    }

    /// Names of the changed fields in order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Serialize to the JSON text stored in audit records
    pub fn to_json(&self) -> String {
        // A map of strings always serializes.
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    /// Parse stored JSON text, yielding an empty set for anything unreadable
    pub fn from_json(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_default()
    }

    /// Render as `name{colon}old{arrow}new` joined by the separator
    pub fn render(&self, format: &ChangeFormat) -> String {
        self.iter()
            .map(|(field, change)| change.render(field, format))
            .collect::<Vec<_>>()
            .join(&format.separator)
    }
}

/// Compute the change set between two optional snapshots
///
/// - only `new`: every visible field is reported as added (a creation)
/// - only `old`: every visible field is reported as removed (a deletion)
/// - both: only visible fields whose normalized values differ
///
/// Masked fields are compared on their real values, then reported with the
/// placeholder in place of each present value.
pub fn diff(
    old: Option<&Snapshot>,
    new: Option<&Snapshot>,
    policy: &TrackedEntityConfig,
) -> ChangeSet {
    let fields: BTreeSet<&str> = [old, new]
        .into_iter()
        .flatten()
        .flat_map(Snapshot::fields)
        .collect();

    let mut changes = BTreeMap::new();

    for field in fields.into_iter().filter(|f| policy.is_visible(f)) {
        let before = old.and_then(|s| s.get(field)).map(normalize_value);
        let after = new.and_then(|s| s.get(field)).map(normalize_value);

        let Some(change) = FieldChange::between(before, after) else {
            continue;
        };

        let change = if policy.is_masked(field) {
            change.masked()
        } else {
            change
        };

        changes.insert(field.to_string(), change);
    }

    ChangeSet(changes)
}

/// Convert a raw value to its stable comparable text
///
/// Integral floats collapse to integers and RFC 3339 timestamps are moved to
/// UTC, so `1.0`/`1` and the same instant in two offsets compare equal. The
/// same rules apply inside arrays and objects before they are rendered as
/// compact JSON.
///
/// Scalars are compared by their text alone: `null` and the string `"None"`
/// normalize identically, as do `true` and `"True"`. A field moving between
/// such a pair is not reported as a change.
pub fn normalize_value(value: &Value) -> String {
    match value {
        Value::Null => ABSENT_VALUE.to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => normalize_number(n),
        Value::String(s) => normalize_text(s),
        Value::Array(_) | Value::Object(_) => canonical(value).to_string(),
    }
}

/// Nested values with numbers and timestamps in their normalized form
fn canonical(value: &Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                Value::from(f as i64)
            }
            _ => value.clone(),
        },
        Value::String(s) => Value::String(normalize_text(s)),
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        Value::Object(members) => Value::Object(
            members
                .iter()
                .map(|(key, member)| (key.clone(), canonical(member)))
                .collect(),
        ),
        Value::Null | Value::Bool(_) => value.clone(),
    }
}

fn normalize_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => (f as i64).to_string(),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

fn normalize_text(s: &str) -> String {
    match DateTime::parse_from_rfc3339(s) {
        Ok(ts) => ts
            .with_timezone(&Utc)
            .format("%Y-%m-%d %H:%M:%S%.f+00:00")
            .to_string(),
        Err(_) => s.to_string(),
    }
}
