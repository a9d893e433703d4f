use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use futures_util::FutureExt;
use log::{debug, error, info, warn};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::WorkerError;
use crate::notify::messages::{self, CompletionSummary, FailureReason};
use crate::notify::{self, NotificationSink};
use crate::pipeline::{Pipeline, PipelineContext, PipelineError, PipelineOutcome};

use super::queue::TaskQueue;
use super::registry::TaskRegistry;
use super::stats::{Counters, PoolStats};
use super::task::{ProcessingTask, TaskResult};

const CANCELLED: &str = "cancelled: worker pool stopped while the task was processing";

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub worker_count: usize,
    /// How long an idle worker waits on the queue before re-checking for
    /// shutdown.
    pub poll_interval: Duration,
    pub completed_retention: usize,
    pub recent_completed_per_submitter: usize,
}

impl PoolConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            worker_count: config.worker_count,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            completed_retention: config.completed_retention,
            recent_completed_per_submitter: config.recent_completed_per_submitter,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

struct Shared {
    config: PoolConfig,
    pipeline: Pipeline,
    notifier: Arc<dyn NotificationSink>,
    queue: TaskQueue,
    tasks: TaskRegistry,
    counters: Mutex<Counters>,
    running: AtomicBool,
    idle: Notify,
}

impl Shared {
    fn counters(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signal_if_idle(&self) {
        if self.tasks.active_len() == 0 {
            self.idle.notify_waiters();
        }
    }
}

/// Fixed set of async workers draining one FIFO queue of documents.
///
/// Tasks are registered before they are queued, so `status` sees a task as
/// soon as `submit` returns. Stopping the pool aborts the workers; tasks
/// they were processing end as `FAILED`, queued tasks wait for the next
/// `start`.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(config: PoolConfig, pipeline: Pipeline, notifier: Arc<dyn NotificationSink>) -> Self {
        let tasks = TaskRegistry::new(config.completed_retention);
        Self {
            shared: Arc::new(Shared {
                config,
                pipeline,
                notifier,
                queue: TaskQueue::new(),
                tasks,
                counters: Mutex::new(Counters::default()),
                running: AtomicBool::new(false),
                idle: Notify::new(),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the workers on the current tokio runtime.
    pub fn start(&self) -> Result<(), WorkerError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| WorkerError::NoRuntime)?;
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return Err(WorkerError::AlreadyRunning);
        }

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        for worker_id in 0..self.shared.config.worker_count {
            workers.push(runtime.spawn(run_worker(worker_id, Arc::clone(&self.shared))));
        }

        info!("Started {} workers", self.shared.config.worker_count);
        Ok(())
    }

    /// Aborts every worker and waits for them to finish. Tasks that were
    /// being processed are marked failed; queued tasks stay queued.
    pub async fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        info!("Stopping worker pool...");

        let handles = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in &handles {
            handle.abort();
        }
        for (worker_id, result) in join_all(handles).await.into_iter().enumerate() {
            match result {
                Err(e) if e.is_panic() => error!("Worker {} panicked", worker_id),
                _ => debug!("Worker {} finished", worker_id),
            }
        }

        for task_id in self.shared.tasks.in_flight() {
            let Some(task) = self.shared.tasks.finish(&task_id, |t| t.mark_failed(CANCELLED)) else {
                continue;
            };
            warn!("Task {} cancelled mid-processing", task.id);
            remove_temp_file(&task.source_path);
            self.shared.counters().record_failed();
            notify::deliver(
                self.shared.notifier.as_ref(),
                &task.submitter_id,
                &messages::failed(&task.filename, FailureReason::Internal),
            )
            .await;
        }
        self.shared.signal_if_idle();

        info!(
            "Worker pool stopped, {} tasks left in the queue",
            self.shared.queue.len()
        );
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Registers a task and queues it. Returns the task id.
    pub async fn submit(
        &self,
        submitter_id: &str,
        filename: &str,
        source_path: impl Into<PathBuf>,
    ) -> Result<String, WorkerError> {
        let task = ProcessingTask::new(submitter_id, filename, source_path);
        let task_id = task.id.clone();

        self.shared.tasks.insert(task);
        // Acknowledge first so the submitter never hears "started" before "queued".
        notify::deliver(
            self.shared.notifier.as_ref(),
            submitter_id,
            &messages::queued(filename, &task_id),
        )
        .await;

        if let Err(e) = self.shared.queue.push(task_id.clone()) {
            self.shared.tasks.remove_active(&task_id);
            return Err(e);
        }
        info!("Queued task {} for {}: {}", task_id, submitter_id, filename);

        Ok(task_id)
    }

    pub fn status(&self, task_id: &str) -> Option<ProcessingTask> {
        self.shared.tasks.get(task_id)
    }

    /// Every active task of the submitter followed by their most recent
    /// finished ones, newest first.
    pub fn tasks_for(&self, submitter_id: &str) -> Vec<ProcessingTask> {
        self.shared
            .tasks
            .for_submitter(submitter_id, self.shared.config.recent_completed_per_submitter)
    }

    pub fn stats(&self) -> PoolStats {
        let counters = self.shared.counters().clone();
        let worker_count = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        PoolStats {
            active_count: self.shared.tasks.active_len(),
            completed_count: self.shared.tasks.completed_len(),
            queue_depth: self.shared.queue.len(),
            worker_count,
            total_processed: counters.processed,
            total_failed: counters.failed,
            total_validation_failed: counters.validation_failed,
            average_processing_time_secs: counters.average_secs,
        }
    }

    /// Resolves once no task is pending or processing. Only returns while
    /// the pool is running or the active set is already empty.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.shared.tasks.active_len() == 0 {
                return;
            }
            let _ = tokio::time::timeout(self.shared.config.poll_interval, notified).await;
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let workers = self.workers.get_mut().unwrap_or_else(PoisonError::into_inner);
        for handle in workers.drain(..) {
            handle.abort();
        }
    }
}

async fn run_worker(worker_id: usize, shared: Arc<Shared>) {
    debug!("Worker {} started", worker_id);

    while shared.running.load(Ordering::Acquire) {
        let Some(task_id) = shared.queue.pop(shared.config.poll_interval).await else {
            continue;
        };
        process_task(&shared, worker_id, &task_id).await;
    }

    debug!("Worker {} stopped", worker_id);
}

/// Runs one task to a terminal state. Nothing raised here reaches the
/// worker loop.
async fn process_task(shared: &Shared, worker_id: usize, task_id: &str) {
    let Some(task) = shared.tasks.begin(task_id) else {
        warn!("Worker {} dequeued unknown task {}", worker_id, task_id);
        return;
    };
    debug!("Worker {} processing task {}: {}", worker_id, task.id, task.filename);

    let mut temp_file = TempFile::new(task.source_path.clone());
    notify::deliver(
        shared.notifier.as_ref(),
        &task.submitter_id,
        &messages::started(&task.filename, &task.id),
    )
    .await;

    let started = Instant::now();
    let mut ctx = PipelineContext::new(
        task.id.clone(),
        task.submitter_id.clone(),
        task.filename.clone(),
        task.source_path.clone(),
    );
    let result = AssertUnwindSafe(shared.pipeline.run(&mut ctx, shared.notifier.as_ref()))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(PipelineError::Internal(panic_message(panic.as_ref()))));
    let processing_secs = started.elapsed().as_secs_f64();

    temp_file.remove();

    let message = match result {
        Ok(PipelineOutcome::Completed {
            doc_type,
            fields,
            saved,
            warnings,
        }) => {
            let message = messages::completed(
                &task.filename,
                &CompletionSummary {
                    doc_type,
                    fields: &fields,
                    document_id: saved.document_id,
                    processing_secs,
                    chain_note: messages::chain_note(
                        &saved.chain,
                        doc_type,
                        fields.contract_number.as_deref(),
                    ),
                    warnings: &warnings,
                },
            );
            let result = TaskResult {
                doc_type,
                fields,
                document_id: Some(saved.document_id),
                chain: Some(saved.chain),
                processing_secs,
            };
            shared
                .tasks
                .finish(task_id, |t| t.mark_completed(result, warnings));
            shared.counters().record_completed(processing_secs);
            info!("Task {} completed in {:.2}s", task_id, processing_secs);
            message
        }
        Ok(PipelineOutcome::ValidationFailed {
            doc_type,
            fields,
            report,
        }) => {
            let message =
                messages::validation_failed(&task.filename, &report.errors, &report.warnings);
            let result = TaskResult {
                doc_type,
                fields,
                document_id: None,
                chain: None,
                processing_secs,
            };
            shared.tasks.finish(task_id, |t| {
                t.mark_validation_failed(result, report.errors, report.warnings)
            });
            shared.counters().record_validation_failed();
            info!("Task {} failed validation", task_id);
            message
        }
        Err(e) => {
            error!("Task {} failed: {}", task_id, e);
            let message = messages::failed(&task.filename, e.failure_reason());
            shared.tasks.finish(task_id, |t| t.mark_failed(e.to_string()));
            shared.counters().record_failed();
            message
        }
    };

    notify::deliver(shared.notifier.as_ref(), &task.submitter_id, &message).await;
    shared.signal_if_idle();
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("pipeline panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("pipeline panicked: {}", s)
    } else {
        "pipeline panicked".to_string()
    }
}

/// The submitted file, removed on every exit path including cancellation.
struct TempFile {
    path: Option<PathBuf>,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn remove(&mut self) {
        if let Some(path) = self.path.take() {
            remove_temp_file(&path);
        }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        self.remove();
    }
}

fn remove_temp_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove temporary file {}: {}", path.display(), e),
    }
}
