//! MongoDB document source.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document as BsonDocument};
use mongodb::error::ErrorKind;
use mongodb::{Client, Database};
use tokio::sync::OnceCell;
use tracing::debug;

use super::traits::{DatabaseReader, DocumentSource};
use crate::document::{Document, ObjectId, Value};
use crate::error::{BackupError, Result};

/// Source reading from a MongoDB deployment.
///
/// The driver client is created on first use and reused afterwards; it
/// reconnects on its own, so a server that was down during one cycle is
/// picked up again in the next.
pub struct MongoSource {
    uri: String,
    client: OnceCell<Client>,
}

impl MongoSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&Client> {
        self.client
            .get_or_try_init(|| async {
                debug!("Creating MongoDB client");
                Client::with_uri_str(&self.uri).await.map_err(map_driver_error)
            })
            .await
    }
}

#[async_trait]
impl DocumentSource for MongoSource {
    async fn open(&self, database: &str) -> Result<Box<dyn DatabaseReader>> {
        let client = self.client().await?;
        Ok(Box::new(MongoReader {
            db: client.database(database),
        }))
    }

    fn source_name(&self) -> &'static str {
        "mongodb"
    }
}

struct MongoReader {
    db: Database,
}

#[async_trait]
impl DatabaseReader for MongoReader {
    async fn list_collection_names(&mut self) -> Result<Vec<String>> {
        self.db
            .list_collection_names()
            .await
            .map_err(map_driver_error)
    }

    async fn read_all(&mut self, collection: &str) -> Result<Vec<Document>> {
        let cursor = self
            .db
            .collection::<BsonDocument>(collection)
            .find(doc! {})
            .await
            .map_err(map_driver_error)?;
        let raw: Vec<BsonDocument> = cursor.try_collect().await.map_err(map_driver_error)?;
        raw.into_iter().map(convert_document).collect()
    }
}

fn map_driver_error(err: mongodb::error::Error) -> BackupError {
    match *err.kind {
        ErrorKind::Authentication { .. } => BackupError::Auth(err.to_string()),
        _ => BackupError::Connection(err.to_string()),
    }
}

fn convert_document(raw: BsonDocument) -> Result<Document> {
    raw.into_iter()
        .map(|(key, value)| Ok((key, convert_value(value)?)))
        .collect()
}

fn convert_value(value: Bson) -> Result<Value> {
    let converted = match value {
        Bson::Null => Value::Null,
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(n) => Value::Int32(n),
        Bson::Int64(n) => Value::Int64(n),
        Bson::Double(n) => Value::Double(n),
        Bson::String(s) | Bson::Symbol(s) => Value::String(s),
        Bson::Array(items) => {
            Value::Array(items.into_iter().map(convert_value).collect::<Result<_>>()?)
        }
        Bson::Document(doc) => Value::Document(convert_document(doc)?),
        Bson::ObjectId(oid) => Value::ObjectId(ObjectId::from_bytes(oid.bytes())),
        Bson::DateTime(dt) => {
            match chrono::DateTime::from_timestamp_millis(dt.timestamp_millis()) {
                Some(utc) => Value::DateTime(utc),
                None => {
                    return Err(BackupError::unsupported(format!(
                        "dateTime({}ms, out of range)",
                        dt.timestamp_millis()
                    )))
                }
            }
        }
        Bson::Binary(bin) => Value::Binary {
            subtype: u8::from(bin.subtype),
            bytes: bin.bytes,
        },
        Bson::RegularExpression(re) => Value::Regex {
            pattern: re.pattern,
            options: re.options,
        },
        Bson::Decimal128(d) => Value::Decimal128(d.bytes()),
        Bson::JavaScriptCode(code) => Value::JavaScript(code),
        Bson::JavaScriptCodeWithScope(cws) => Value::JavaScript(cws.code),
        Bson::Timestamp(ts) => Value::Timestamp {
            time: ts.time,
            increment: ts.increment,
        },
        Bson::MinKey => Value::MinKey,
        Bson::MaxKey => Value::MaxKey,
        // Undefined and the deprecated DBPointer
        _ => Value::Undefined,
    };
    Ok(converted)
}
