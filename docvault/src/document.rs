//! In-memory document model.
//!
//! Sources translate their driver types into [`Value`]. Only part of it has a
//! canonical JSON form: identifiers and timestamps are normalized into
//! strings before encoding, and the remaining driver types are rejected by
//! the serializer.

use chrono::{DateTime, Utc};
use std::fmt;

/// 12-byte document identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Parse the 24-character hex form.
    pub fn parse_str(s: &str) -> Option<Self> {
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).ok()?;
        Some(Self(bytes))
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Lowercase hex, 24 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A field value as read from the document store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Document(Document),
    ObjectId(ObjectId),
    DateTime(DateTime<Utc>),
    Binary { subtype: u8, bytes: Vec<u8> },
    Regex { pattern: String, options: String },
    Decimal128([u8; 16]),
    JavaScript(String),
    /// Internal replication timestamp, distinct from `DateTime`.
    Timestamp { time: u32, increment: u32 },
    MinKey,
    MaxKey,
    Undefined,
}

impl Value {
    /// Name used in error messages and logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Document(_) => "document",
            Value::ObjectId(_) => "objectId",
            Value::DateTime(_) => "dateTime",
            Value::Binary { .. } => "binary",
            Value::Regex { .. } => "regex",
            Value::Decimal128(_) => "decimal128",
            Value::JavaScript(_) => "javascript",
            Value::Timestamp { .. } => "timestamp",
            Value::MinKey => "minKey",
            Value::MaxKey => "maxKey",
            Value::Undefined => "undefined",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::ObjectId(id)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Document(doc)
    }
}

/// Field name → value, in the order the store returned them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Builder form of [`Document::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter().map(|(k, v)| (k, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.fields.iter_mut().map(|(k, v)| (&*k, v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

/// Every collection of one database, in discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    database: String,
    collections: Vec<(String, Vec<Document>)>,
}

impl Snapshot {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collections: Vec::new(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Add a collection. A repeated name replaces the earlier documents.
    pub fn push_collection(&mut self, name: impl Into<String>, documents: Vec<Document>) {
        let name = name.into();
        match self.collections.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = documents,
            None => self.collections.push((name, documents)),
        }
    }

    pub fn collections(&self) -> impl Iterator<Item = (&str, &[Document])> {
        self.collections
            .iter()
            .map(|(name, docs)| (name.as_str(), docs.as_slice()))
    }

    pub fn collection(&self, name: &str) -> Option<&[Document]> {
        self.collections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, docs)| docs.as_slice())
    }

    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    pub fn document_count(&self) -> usize {
        self.collections.iter().map(|(_, docs)| docs.len()).sum()
    }
}
