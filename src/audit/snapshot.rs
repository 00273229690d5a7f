//! Record snapshots
//!
//! A snapshot is the field-by-field state of a tracked record at one instant.
//! The diff engine compares two of them; the lifecycle source produces them.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::ser::{self, Impossible};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{AuditError, AuditResult};

/// Field name to raw JSON value, ordered by field name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, Value>);

impl Snapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from any record that serializes as a struct or map
    ///
    /// Fields are serialized one at a time. A field that fails is stored as
    /// a placeholder naming its type and the error, and the remaining fields
    /// are kept.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Json`] if the record is not a struct or map.
    pub fn from_serialize<T: Serialize + ?Sized>(record: &T) -> AuditResult<Self> {
        record.serialize(FieldCollector)
    }

    /// Build a snapshot from a JSON object
    pub fn from_json(value: Value) -> AuditResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            other => Err(not_an_object(json_kind(&other))),
        }
    }

    /// Set a single field
    ///
    /// A value that fails to serialize is stored as its `Debug` text so one
    /// bad field never costs the rest of the snapshot.
    pub fn set<T: Serialize + Debug>(&mut self, field: impl Into<String>, value: &T) {
        let field = field.into();
        let value = serde_json::to_value(value).unwrap_or_else(|err| {
            tracing::warn!(field = %field, error = %err, "field value did not serialize, storing debug text");
            Value::String(format!("{:?}", value))
        });
        self.0.insert(field, value);
    }

    /// Builder-style variant of [`Snapshot::set`]
    pub fn with_field<T: Serialize + Debug>(mut self, field: impl Into<String>, value: &T) -> Self {
        self.set(field, value);
        self
    }

    /// Get the raw value of a field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Iterate over field names in order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of fields in the snapshot
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn not_an_object(kind: &str) -> AuditError {
    AuditError::Json(format!("Snapshot must be a JSON object, got {}", kind))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Serializer accepting only structs and maps, collecting each field's value
struct FieldCollector;

macro_rules! via_json {
    ($($method:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method(self, v: $ty) -> AuditResult<Snapshot> {
                Snapshot::from_json(serde_json::to_value(v)?)
            }
        )*
    };
}

impl Serializer for FieldCollector {
    type Ok = Snapshot;
    type Error = AuditError;
    type SerializeSeq = Impossible<Snapshot, AuditError>;
    type SerializeTuple = Impossible<Snapshot, AuditError>;
    type SerializeTupleStruct = Impossible<Snapshot, AuditError>;
    type SerializeTupleVariant = Impossible<Snapshot, AuditError>;
    type SerializeMap = FieldWriter;
    type SerializeStruct = FieldWriter;
    type SerializeStructVariant = Impossible<Snapshot, AuditError>;

    via_json!(
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_f32: f32,
        serialize_f64: f64,
        serialize_char: char,
        serialize_str: &str,
        serialize_bytes: &[u8],
    );

    fn serialize_none(self) -> AuditResult<Snapshot> {
        Err(not_an_object("null"))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> AuditResult<Snapshot> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> AuditResult<Snapshot> {
        Err(not_an_object("null"))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> AuditResult<Snapshot> {
        Err(not_an_object("null"))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> AuditResult<Snapshot> {
        Err(not_an_object("a string"))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> AuditResult<Snapshot> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _value: &T,
    ) -> AuditResult<Snapshot> {
        Err(not_an_object(&format!("enum variant {}", variant)))
    }

    fn serialize_seq(self, _len: Option<usize>) -> AuditResult<Self::SerializeSeq> {
        Err(not_an_object("an array"))
    }

    fn serialize_tuple(self, _len: usize) -> AuditResult<Self::SerializeTuple> {
        Err(not_an_object("an array"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> AuditResult<Self::SerializeTupleStruct> {
        Err(not_an_object("an array"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> AuditResult<Self::SerializeTupleVariant> {
        Err(not_an_object(&format!("enum variant {}", variant)))
    }

    fn serialize_map(self, _len: Option<usize>) -> AuditResult<FieldWriter> {
        Ok(FieldWriter::default())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> AuditResult<FieldWriter> {
        Ok(FieldWriter::default())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> AuditResult<Self::SerializeStructVariant> {
        Err(not_an_object(&format!("enum variant {}", variant)))
    }
}

#[derive(Default)]
struct FieldWriter {
    snapshot: Snapshot,
    pending_key: Option<String>,
}

impl FieldWriter {
    fn insert<T: ?Sized + Serialize>(&mut self, field: String, value: &T) {
        let value = serde_json::to_value(value).unwrap_or_else(|err| {
            let type_name = std::any::type_name::<T>();
            tracing::warn!(field = %field, type_name, error = %err, "field value did not serialize, storing placeholder");
            Value::String(format!("<unserializable {}: {}>", type_name, err))
        });
        self.snapshot.0.insert(field, value);
    }
}

impl ser::SerializeStruct for FieldWriter {
    type Ok = Snapshot;
    type Error = AuditError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> AuditResult<()> {
        self.insert(key.to_string(), value);
        Ok(())
    }

    fn end(self) -> AuditResult<Snapshot> {
        Ok(self.snapshot)
    }
}

impl ser::SerializeMap for FieldWriter {
    type Ok = Snapshot;
    type Error = AuditError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> AuditResult<()> {
        let name = match serde_json::to_value(key)? {
            Value::String(name) => name,
            other => other.to_string(),
        };
        self.pending_key = Some(name);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> AuditResult<()> {
        let field = self
            .pending_key
            .take()
            .ok_or_else(|| AuditError::Json("map value serialized before its key".to_string()))?;
        self.insert(field, value);
        Ok(())
    }

    fn end(self) -> AuditResult<Snapshot> {
        Ok(self.snapshot)
    }
}

/// A record type whose mutations can be audited
///
/// Implemented by the host's entity types so lifecycle hooks can identify,
/// describe and snapshot an instance without knowing its concrete type.
pub trait TrackedRecord {
    /// Identifier of the record's entity type, as registered
    fn entity_type(&self) -> &str;

    /// Textual primary key, `None` while the record is not yet persisted
    fn primary_key(&self) -> Option<String>;

    /// Human-readable representation stored alongside the audit record
    fn object_repr(&self) -> String;

    /// Current field values
    fn snapshot(&self) -> Snapshot;

    /// Free-form metadata attached to every audit record of this instance
    fn additional_data(&self) -> Option<Value> {
        None
    }
}
