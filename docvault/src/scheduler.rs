//! Fixed-delay backup loop.
//!
//! Each cycle exports, then uploads when the export succeeded. The loop then
//! sleeps for the configured period, so the time between cycle starts is the
//! period plus the cycle's own duration. A failed or panicking cycle is
//! logged and the loop carries on.

use futures::FutureExt;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::artifact::Artifact;
use crate::error::{BackupError, Result};
use crate::exporter::{ExportResult, Exporter};
use crate::uploader::{UploadResult, Uploader};

/// Default wait between cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next cycle
    Idle,
    /// A cycle is in progress
    Running,
}

/// What happened in one cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub export: ExportResult,
    /// `None` when the export failed and no upload was attempted
    pub upload: Option<UploadResult>,
    pub elapsed: Duration,
}

impl CycleReport {
    /// True when both stages succeeded.
    pub fn is_success(&self) -> bool {
        self.export.is_ok() && matches!(self.upload, Some(Ok(_)))
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.export.as_ref().ok()
    }

    /// Collapse into the first error, if any.
    pub fn into_result(self) -> Result<(Artifact, docvault_storage::RemoteObjectId)> {
        let artifact = self.export?;
        match self.upload {
            Some(upload) => Ok((artifact, upload?)),
            None => Err(BackupError::Upload("upload was not attempted".to_string())),
        }
    }
}

pub struct Scheduler {
    exporter: Exporter,
    uploader: Uploader,
    folder: String,
    interval: Duration,
    state: RwLock<SchedulerState>,
}

impl Scheduler {
    pub fn new(exporter: Exporter, uploader: Uploader, folder: impl Into<String>) -> Self {
        Self {
            exporter,
            uploader,
            folder: folder.into(),
            interval: DEFAULT_INTERVAL,
            state: RwLock::new(SchedulerState::Idle),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.read()
    }

    /// Run one export + upload cycle.
    pub async fn run_cycle(&self) -> CycleReport {
        let _running = StateGuard::enter(&self.state);
        let started = Instant::now();

        let export = self.exporter.export().await;
        let upload = match &export {
            Ok(artifact) => Some(self.uploader.upload(artifact, &self.folder).await),
            Err(_) => None,
        };

        CycleReport {
            export,
            upload,
            elapsed: started.elapsed(),
        }
    }

    /// Run a single cycle, turning a panic into an error.
    pub async fn run_once(&self) -> Result<(Artifact, docvault_storage::RemoteObjectId)> {
        match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
            Ok(report) => {
                log_report(&report);
                report.into_result()
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(panic = %message, "Backup cycle panicked");
                Err(BackupError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("backup cycle panicked: {}", message),
                )))
            }
        }
    }

    /// Loop until `shutdown` reads `true` or its sender is dropped.
    ///
    /// Shutdown is only observed before a cycle and while waiting; a cycle
    /// in progress always runs to completion.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            database = %self.exporter.database(),
            backend = self.uploader.backend_name(),
            interval_secs = self.interval.as_secs(),
            "Backup scheduler started"
        );

        let mut cycles: u64 = 0;
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            cycles += 1;
            match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
                Ok(report) => log_report(&report),
                Err(panic) => {
                    error!(cycle = cycles, panic = %panic_message(panic.as_ref()), "Backup cycle panicked")
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        info!(cycles, "Backup scheduler stopped");
    }
}

/// Resolves once `true` is sent or the sender goes away.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

fn log_report(report: &CycleReport) {
    let elapsed_ms = report.elapsed.as_millis() as u64;
    match (&report.export, &report.upload) {
        (Ok(artifact), Some(Ok(id))) => {
            info!(artifact = %artifact.name, remote_id = %id, elapsed_ms, "Backup cycle succeeded")
        }
        (Ok(artifact), _) => {
            warn!(artifact = %artifact.name, elapsed_ms, "Backup cycle exported but upload failed; artifact kept")
        }
        (Err(e), _) => warn!(kind = e.kind(), elapsed_ms, "Backup cycle skipped upload; export failed"),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Marks the scheduler running; back to idle on drop, panics included.
struct StateGuard<'a>(&'a RwLock<SchedulerState>);

impl<'a> StateGuard<'a> {
    fn enter(state: &'a RwLock<SchedulerState>) -> Self {
        *state.write() = SchedulerState::Running;
        Self(state)
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        *self.0.write() = SchedulerState::Idle;
    }
}
