//! Property-based round-trip tests for the snapshot serializer.
//!
//! Random snapshots built from JSON-representable values must decode back
//! to the same collections and documents. Snapshots that also carry
//! identifiers and timestamps must always serialize once normalized.

use docvault::document::{Document, ObjectId, Snapshot, Value};
use docvault::normalize::normalize_document;
use docvault::serializer::serialize_snapshot;
use proptest::prelude::*;
use serde_json::{json, Map};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn canonical_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::Int32),
        any::<i64>().prop_map(Value::Int64),
        // quarter steps are exact in binary and print without rounding
        (-1_000_000i32..1_000_000).prop_map(|n| Value::Double(n as f64 / 4.0)),
        "\\PC{0,12}".prop_map(Value::String),
    ]
}

fn driver_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        canonical_leaf(),
        any::<[u8; 12]>().prop_map(|b| Value::ObjectId(ObjectId::from_bytes(b))),
        (0i64..4_102_444_800_000).prop_map(|ms| {
            Value::DateTime(chrono::DateTime::from_timestamp_millis(ms).unwrap())
        }),
    ]
}

fn nested(leaf: impl Strategy<Value = Value> + 'static) -> impl Strategy<Value = Value> {
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec(("[a-z_]{1,8}", inner), 0..4)
                .prop_map(|fields| Value::Document(fields.into_iter().collect())),
        ]
    })
}

fn snapshot(leaf: impl Strategy<Value = Value> + 'static) -> impl Strategy<Value = Snapshot> {
    let document = prop::collection::vec(("[a-z_]{1,8}", nested(leaf)), 0..5)
        .prop_map(|fields| fields.into_iter().collect::<Document>());
    prop::collection::vec(("[a-z]{1,10}", prop::collection::vec(document, 0..4)), 0..4).prop_map(
        |collections| {
            let mut snap = Snapshot::new("prop");
            for (name, docs) in collections {
                snap.push_collection(name, docs);
            }
            snap
        },
    )
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn expected_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int32(n) => json!(n),
        Value::Int64(n) => json!(n),
        Value::Double(n) => json!(n),
        Value::String(s) => json!(s),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(expected_value).collect()),
        Value::Document(doc) => serde_json::Value::Object(expected_document(doc)),
        other => panic!("not canonical: {}", other.type_name()),
    }
}

fn expected_document(doc: &Document) -> Map<String, serde_json::Value> {
    doc.iter()
        .map(|(k, v)| (k.clone(), expected_value(v)))
        .collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_canonical_snapshot_round_trips(snap in snapshot(canonical_leaf())) {
        let expected: Map<String, serde_json::Value> = snap
            .collections()
            .map(|(name, docs)| {
                let docs = docs
                    .iter()
                    .map(|d| serde_json::Value::Object(expected_document(d)))
                    .collect();
                (name.to_string(), serde_json::Value::Array(docs))
            })
            .collect();

        let bytes = serialize_snapshot(snap).unwrap();
        let decoded: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        prop_assert_eq!(decoded, serde_json::Value::Object(expected));
    }

    #[test]
    fn prop_normalized_snapshot_always_serializes(snap in snapshot(driver_leaf())) {
        let mut normalized = Snapshot::new(snap.database());
        for (name, docs) in snap.collections() {
            let mut docs = docs.to_vec();
            docs.iter_mut().for_each(normalize_document);
            normalized.push_collection(name, docs);
        }

        let bytes = serialize_snapshot(normalized).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        prop_assert!(serde_json::from_str::<serde_json::Value>(&text).is_ok());
    }
}
