//! Runs documents through a worker pool and prints the notifications a
//! submitter would receive.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use log::info;
use tempfile::TempDir;

use docchain::inference::InferenceBackend;
use docchain::notify::ChannelSink;
use docchain::worker::{PoolConfig, TaskStatus, WorkerPool};
use docchain::{Config, FileTextExtractor, LedgerStore, OllamaClient, Pipeline, PipelineConfig};

#[derive(Args)]
pub struct ProcessArgs {
    /// Document files to process
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Submitter id recorded with every document
    #[arg(short, long, default_value = "cli")]
    submitter: String,

    /// Skip the inference backend and rely on pattern matching only
    #[arg(long)]
    no_inference: bool,
}

pub async fn run(args: ProcessArgs, config: &Config) -> anyhow::Result<()> {
    let ledger: Arc<dyn LedgerStore> = Arc::new(super::open_ledger(config)?);

    let backend: Option<Arc<dyn InferenceBackend>> =
        if config.inference.enabled && !args.no_inference {
            Some(Arc::new(OllamaClient::from_config(&config.inference)?))
        } else {
            None
        };

    let pipeline = Pipeline::new(
        PipelineConfig::from_config(config),
        Arc::new(FileTextExtractor::new()),
        backend,
        ledger,
    );
    let (sink, mut rx) = ChannelSink::new();
    let pool = WorkerPool::new(PoolConfig::from_config(config), pipeline, Arc::new(sink));

    let printer = tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            println!("{}\n", notification.message);
        }
    });

    // The pool deletes what it processes, so it gets copies.
    let staging = TempDir::new().context("Failed to create staging directory")?;
    pool.start()?;

    let mut task_ids = Vec::with_capacity(args.files.len());
    for (i, file) in args.files.iter().enumerate() {
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        let staged = staging.path().join(format!("{}-{}", i, filename));
        std::fs::copy(file, &staged)
            .with_context(|| format!("Failed to read {}", file.display()))?;

        task_ids.push(pool.submit(&args.submitter, &filename, staged).await?);
    }

    pool.wait_idle().await;
    let stats = pool.stats();
    let tasks: Vec<_> = task_ids.iter().filter_map(|id| pool.status(id)).collect();

    pool.stop().await;
    drop(pool);
    printer.await?;

    for task in &tasks {
        match &task.result {
            Some(result) if task.status == TaskStatus::Completed => println!(
                "{:<40} {:<18} {} (ledger id {})",
                task.filename,
                task.status,
                result.doc_type,
                result.document_id.unwrap_or_default()
            ),
            _ => println!(
                "{:<40} {:<18} {}",
                task.filename,
                task.status,
                task.error.as_deref().unwrap_or("")
            ),
        }
    }
    println!(
        "\nProcessed {}, validation failed {}, failed {}, average {:.1}s",
        stats.total_processed,
        stats.total_validation_failed,
        stats.total_failed,
        stats.average_processing_time_secs
    );
    info!("Pool finished with {} tasks retained", stats.completed_count);

    let not_saved = tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Completed)
        .count();
    if not_saved > 0 {
        anyhow::bail!("{} of {} documents were not saved", not_saved, tasks.len());
    }
    Ok(())
}
