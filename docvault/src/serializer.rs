//! Snapshot → canonical JSON.
//!
//! Output is pretty-printed with four-space indentation and written as UTF-8
//! with international text kept literal. The whole snapshot is encoded into
//! memory first, so an unsupported value never yields partial output.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Number};

use crate::document::{Document, Snapshot, Value};
use crate::error::{BackupError, Result};

const INDENT: &[u8] = b"    ";

/// Encode one value. Identifiers and timestamps must already be normalized.
pub fn encode_value(value: &Value) -> Result<serde_json::Value> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int32(n) => serde_json::Value::Number((*n).into()),
        Value::Int64(n) => serde_json::Value::Number((*n).into()),
        Value::Double(n) => match Number::from_f64(*n) {
            Some(num) => serde_json::Value::Number(num),
            None => return Err(BackupError::unsupported(format!("double({})", n))),
        },
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => serde_json::Value::Array(
            items.iter().map(encode_value).collect::<Result<Vec<_>>>()?,
        ),
        Value::Document(doc) => serde_json::Value::Object(encode_document(doc)?),
        other => return Err(BackupError::unsupported(other.type_name())),
    })
}

/// Encode a document, preserving field order.
pub fn encode_document(doc: &Document) -> Result<Map<String, serde_json::Value>> {
    let mut map = Map::new();
    for (key, value) in doc.iter() {
        map.insert(key.clone(), encode_value(value)?);
    }
    Ok(map)
}

/// Encode a whole snapshot as `{collection: [documents...]}`.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<serde_json::Value> {
    let mut root = Map::new();
    for (name, documents) in snapshot.collections() {
        let docs = documents
            .iter()
            .map(|d| encode_document(d).map(serde_json::Value::Object))
            .collect::<Result<Vec<_>>>()?;
        root.insert(name.to_string(), serde_json::Value::Array(docs));
    }
    Ok(serde_json::Value::Object(root))
}

/// Serialize a snapshot to its final byte form.
///
/// Takes the snapshot by value; it is not needed once encoded.
pub fn serialize_snapshot(snapshot: Snapshot) -> Result<Vec<u8>> {
    let encoded = encode_snapshot(&snapshot)?;
    drop(snapshot);

    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(INDENT));
    encoded.serialize(&mut ser)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ObjectId;

    fn snapshot_with(doc: Document) -> Snapshot {
        let mut snap = Snapshot::new("db");
        snap.push_collection("items", vec![doc]);
        snap
    }

    #[test]
    fn test_indented_multiline_output() {
        let bytes =
            serialize_snapshot(snapshot_with(Document::new().with("name", "Ann"))).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "{\n    \"items\": [\n        {\n            \"name\": \"Ann\"\n        }\n    ]\n}"
        );
    }

    #[test]
    fn test_non_ascii_is_literal() {
        let bytes =
            serialize_snapshot(snapshot_with(Document::new().with("city", "Tromsø 東京")))
                .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Tromsø 東京"));
        assert!(!text.contains("\\u"));
    }

    #[test]
    fn test_field_order_is_preserved() {
        let doc = Document::new().with("z", 1).with("a", 2).with("m", 3);
        let text = String::from_utf8(serialize_snapshot(snapshot_with(doc)).unwrap()).unwrap();
        let z = text.find("\"z\"").unwrap();
        let a = text.find("\"a\"").unwrap();
        let m = text.find("\"m\"").unwrap();
        assert!(z < a && a < m);
    }

    #[test]
    fn test_deterministic() {
        let doc = Document::new()
            .with("n", 1.25)
            .with("tags", Value::Array(vec!["a".into(), Value::Null]))
            .with("inner", Document::new().with("ok", true));
        let first = serialize_snapshot(snapshot_with(doc.clone())).unwrap();
        let second = serialize_snapshot(snapshot_with(doc)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unsupported_type_is_named() {
        let doc = Document::new().with(
            "nested",
            Document::new().with("raw", Value::Binary { subtype: 0, bytes: vec![0xff] }),
        );
        match serialize_snapshot(snapshot_with(doc)) {
            Err(BackupError::UnsupportedType { type_name }) => assert_eq!(type_name, "binary"),
            other => panic!("expected UnsupportedType, got {:?}", other),
        }
    }

    #[test]
    fn test_unnormalized_object_id_is_rejected() {
        let doc = Document::new().with("_id", ObjectId::from_bytes([0; 12]));
        let err = serialize_snapshot(snapshot_with(doc)).unwrap_err();
        assert!(matches!(err, BackupError::UnsupportedType { ref type_name } if type_name == "objectId"));
    }

    #[test]
    fn test_non_finite_double_is_rejected() {
        let doc = Document::new().with("ratio", f64::NAN);
        let err = serialize_snapshot(snapshot_with(doc)).unwrap_err();
        assert!(matches!(err, BackupError::UnsupportedType { .. }));
    }

    #[test]
    fn test_empty_snapshot() {
        let bytes = serialize_snapshot(Snapshot::new("empty")).unwrap();
        assert_eq!(bytes, b"{}");
    }

    #[test]
    fn test_empty_collection() {
        let mut snap = Snapshot::new("db");
        snap.push_collection("nothing", vec![]);
        let text = String::from_utf8(serialize_snapshot(snap).unwrap()).unwrap();
        assert_eq!(text, "{\n    \"nothing\": []\n}");
    }
}
