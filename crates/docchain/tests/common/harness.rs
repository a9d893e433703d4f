//! Test harness for isolated pipeline runs.
//!
//! Each harness owns a temp directory with an upload area and an archive
//! root, an in-memory ledger, and builds worker pools wired to them.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

use docchain::inference::InferenceBackend;
use docchain::notify::{ChannelSink, Notification};
use docchain::pipeline::{Pipeline, PipelineConfig};
use docchain::text::{FileTextExtractor, TextExtractor};
use docchain::worker::{PoolConfig, ProcessingTask, WorkerPool};
use docchain::{Database, LedgerStore, SqliteLedger};

pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub storage_dir: PathBuf,
    pub ledger: Arc<SqliteLedger>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");
        let storage_dir = temp_dir.path().join("archive");
        std::fs::create_dir_all(&upload_dir).expect("Failed to create upload dir");

        let db = Database::open_in_memory().expect("Failed to open database");
        let ledger = Arc::new(SqliteLedger::new(db, &storage_dir, 90));

        Self {
            temp_dir,
            upload_dir,
            storage_dir,
            ledger,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes an uploaded file the way a front end would before submitting.
    pub fn write_upload(&self, filename: &str, content: &str) -> PathBuf {
        let path = self.upload_dir.join(format!("{}.upload", filename));
        std::fs::write(&path, content).expect("Failed to write upload");
        path
    }

    pub fn pool_config(workers: usize) -> PoolConfig {
        PoolConfig {
            worker_count: workers,
            poll_interval: Duration::from_millis(50),
            ..PoolConfig::default()
        }
    }

    /// Pool reading real files with no inference backend.
    pub fn pool(&self, workers: usize) -> (WorkerPool, UnboundedReceiver<Notification>) {
        self.pool_with(workers, Arc::new(FileTextExtractor::new()), None)
    }

    pub fn pool_with(
        &self,
        workers: usize,
        text: Arc<dyn TextExtractor>,
        backend: Option<Arc<dyn InferenceBackend>>,
    ) -> (WorkerPool, UnboundedReceiver<Notification>) {
        let ledger: Arc<dyn LedgerStore> = self.ledger.clone();
        let pipeline = Pipeline::new(PipelineConfig::default(), text, backend, ledger);
        let (sink, rx) = ChannelSink::new();
        let pool = WorkerPool::new(Self::pool_config(workers), pipeline, Arc::new(sink));
        (pool, rx)
    }

    /// Submits one document, waits for the pool to go idle and returns the
    /// finished task.
    pub async fn process(
        &self,
        pool: &WorkerPool,
        submitter: &str,
        filename: &str,
        content: &str,
    ) -> ProcessingTask {
        let path = self.write_upload(filename, content);
        let task_id = pool
            .submit(submitter, filename, path)
            .await
            .expect("Failed to submit");
        wait_idle(pool).await;
        pool.status(&task_id).expect("Task disappeared")
    }
}

/// `wait_idle` with a deadline so a stuck pool fails the test instead of
/// hanging it.
pub async fn wait_idle(pool: &WorkerPool) {
    tokio::time::timeout(Duration::from_secs(10), pool.wait_idle())
        .await
        .expect("Pool did not go idle");
}

/// Polls until `check` holds or the deadline passes.
pub async fn wait_until<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "Condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Notifications received so far.
pub fn drain(rx: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}
