use async_trait::async_trait;

use crate::document::Document;
use crate::error::Result;

/// Connection factory for a document database.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Open a read session on `database`.
    ///
    /// Connection and authentication failures surface here or on the first
    /// read, depending on how lazily the driver connects.
    async fn open(&self, database: &str) -> Result<Box<dyn DatabaseReader>>;

    /// Short name for logs.
    fn source_name(&self) -> &'static str;
}

/// Read session on one database, used for a single export.
#[async_trait]
pub trait DatabaseReader: Send {
    /// Every collection in the database. Order is up to the source.
    async fn list_collection_names(&mut self) -> Result<Vec<String>>;

    /// Every document of `collection`, unfiltered, in source order.
    async fn read_all(&mut self, collection: &str) -> Result<Vec<Document>>;
}
