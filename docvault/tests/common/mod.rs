//! Shared fakes for backup integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use docvault::exporter::Clock;
use docvault::source::{DatabaseReader, DocumentSource, MemorySource};
use docvault_storage::{Bytes, ObjectKey, RemoteObjectId, RemoteStore, StorageError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Store that keeps every upload in memory.
#[derive(Default)]
pub struct RecordingStore {
    uploads: Mutex<Vec<(ObjectKey, Bytes, String)>>,
}

impl RecordingStore {
    pub fn uploads(&self) -> Vec<(ObjectKey, Bytes, String)> {
        self.uploads.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.uploads.lock().len()
    }
}

#[async_trait]
impl RemoteStore for RecordingStore {
    async fn put_object(
        &self,
        key: &ObjectKey,
        data: Bytes,
        content_type: &str,
    ) -> docvault_storage::Result<RemoteObjectId> {
        let mut uploads = self.uploads.lock();
        uploads.push((key.clone(), data, content_type.to_string()));
        Ok(RemoteObjectId(format!("remote-{}", uploads.len())))
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// Store that rejects every upload with a server error.
#[derive(Default)]
pub struct FailingStore {
    calls: AtomicUsize,
}

impl FailingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for FailingStore {
    async fn put_object(
        &self,
        _key: &ObjectKey,
        _data: Bytes,
        _content_type: &str,
    ) -> docvault_storage::Result<RemoteObjectId> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Upload {
            status: 503,
            message: "backend unavailable".to_string(),
        })
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Source whose first `open` panics; later calls go to `inner`.
pub struct PanicOnceSource {
    pub inner: MemorySource,
    panicked: AtomicBool,
}

impl PanicOnceSource {
    pub fn new(inner: MemorySource) -> Self {
        Self {
            inner,
            panicked: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DocumentSource for PanicOnceSource {
    async fn open(&self, database: &str) -> docvault::Result<Box<dyn DatabaseReader>> {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("driver exploded");
        }
        self.inner.open(database).await
    }

    fn source_name(&self) -> &'static str {
        "panic-once"
    }
}

/// Source whose `open` waits until the test releases it.
pub struct GatedSource {
    pub inner: MemorySource,
    /// Signalled once `open` has been entered.
    pub entered: Notify,
    /// Lets a waiting `open` continue.
    pub release: Notify,
}

impl GatedSource {
    pub fn new(inner: MemorySource) -> Self {
        Self {
            inner,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl DocumentSource for GatedSource {
    async fn open(&self, database: &str) -> docvault::Result<Box<dyn DatabaseReader>> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.open(database).await
    }

    fn source_name(&self) -> &'static str {
        "gated"
    }
}

pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

pub fn fixed_clock(t: DateTime<Utc>) -> Clock {
    Arc::new(move || t)
}

/// Clock that advances one second per call.
pub fn ticking_clock(start: DateTime<Utc>) -> Clock {
    let ticks = Arc::new(AtomicI64::new(0));
    Arc::new(move || start + chrono::Duration::seconds(ticks.fetch_add(1, Ordering::SeqCst)))
}
