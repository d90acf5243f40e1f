//! In-memory document source.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::traits::{DatabaseReader, DocumentSource};
use crate::document::Document;
use crate::error::{BackupError, Result};

type Collections = Vec<(String, Vec<Document>)>;

/// Where an injected failure fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailurePoint {
    Open,
    ListCollections,
    Read(String),
}

/// Source backed by a map of databases held in memory.
///
/// Clones share state, so a test can keep one handle and change data or
/// inject failures while the exporter holds another.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    databases: Arc<RwLock<HashMap<String, Collections>>>,
    failure: Arc<Mutex<Option<FailurePoint>>>,
    opens: Arc<AtomicUsize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemorySource::insert_collection`].
    pub fn with_collection(
        self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> Self {
        self.insert_collection(database, collection, documents);
        self
    }

    /// Add or replace a collection.
    pub fn insert_collection(&self, database: &str, collection: &str, documents: Vec<Document>) {
        let mut databases = self.databases.write();
        let collections = databases.entry(database.to_string()).or_default();
        match collections.iter_mut().find(|(name, _)| name == collection) {
            Some(slot) => slot.1 = documents,
            None => collections.push((collection.to_string(), documents)),
        }
    }

    /// Make every following call at `point` fail until cleared.
    pub fn fail_on(&self, point: FailurePoint) {
        *self.failure.lock() = Some(point);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    /// Number of sessions opened so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn check(failure: &Mutex<Option<FailurePoint>>, point: &FailurePoint) -> Result<()> {
        match failure.lock().as_ref() {
            Some(active) if active == point => Err(BackupError::Connection(format!(
                "injected failure at {:?}",
                point
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn open(&self, database: &str) -> Result<Box<dyn DatabaseReader>> {
        Self::check(&self.failure, &FailurePoint::Open)?;
        self.opens.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryReader {
            collections: self
                .databases
                .read()
                .get(database)
                .cloned()
                .unwrap_or_default(),
            failure: self.failure.clone(),
        }))
    }

    fn source_name(&self) -> &'static str {
        "memory"
    }
}

/// Reader over a copy of one database taken when the session opened.
struct MemoryReader {
    collections: Collections,
    failure: Arc<Mutex<Option<FailurePoint>>>,
}

#[async_trait]
impl DatabaseReader for MemoryReader {
    async fn list_collection_names(&mut self) -> Result<Vec<String>> {
        MemorySource::check(&self.failure, &FailurePoint::ListCollections)?;
        Ok(self.collections.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn read_all(&mut self, collection: &str) -> Result<Vec<Document>> {
        MemorySource::check(&self.failure, &FailurePoint::Read(collection.to_string()))?;
        Ok(self
            .collections
            .iter()
            .find(|(name, _)| name == collection)
            .map(|(_, docs)| docs.clone())
            .unwrap_or_default())
    }
}
