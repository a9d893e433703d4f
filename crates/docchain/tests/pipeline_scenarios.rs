//! End-to-end runs of the worker pool against a real ledger.

mod common;

use std::sync::Arc;

use common::harness::{drain, wait_idle, wait_until};
use common::{GatedTextExtractor, ScriptedBackend, TestHarness};

use docchain::db::chain_repo::ChainStatus;
use docchain::document_type::{DocumentType, LinkType};
use docchain::ledger::{ChainOutcome, LedgerReports};
use docchain::worker::TaskStatus;

const CONTRACT: &str =
    "ДОГОВОР №Д-2024-001 от 15.01.2024 ООО Поставщик ИНН 1234567890 Сумма 1000000";
const ACT: &str =
    "АКТ №А-15 от 20.02.2024 ООО Поставщик ИНН 1234567890 по договору №Д-2024-001 Сумма 500000";
const UTD_BAD_TAX_ID: &str = "УПД №У-77 от 10.03.2024 ООО Поставщик ИНН 123 Сумма 50000";

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_contract_opens_chain() {
    let harness = TestHarness::new();
    let (pool, mut rx) = harness.pool(2);
    pool.start().unwrap();

    let task = harness.process(&pool, "user-1", "dogovor.pdf", CONTRACT).await;

    assert_eq!(task.status, TaskStatus::Completed);
    let result = task.result.as_ref().unwrap();
    assert_eq!(result.doc_type, DocumentType::Contract);
    assert!(matches!(result.chain, Some(ChainOutcome::Created { .. })));

    let detail = harness.ledger.chain_detail("Д-2024-001").unwrap().unwrap();
    assert_eq!(detail.chain.total_amount, 1_000_000.0);
    assert_eq!(detail.chain.closed_amount, 0.0);
    assert_eq!(detail.chain.counterparty, "ООО Поставщик");
    assert_eq!(detail.chain.status, ChainStatus::Active);

    // The upload is gone and the archive holds the only copy.
    assert!(!task.source_path.exists());
    let stored = &detail.documents[0];
    assert_eq!(stored.link_type, LinkType::Contract);

    let messages: Vec<String> = drain(&mut rx).into_iter().map(|n| n.message).collect();
    assert_eq!(messages.len(), 4, "{:?}", messages);
    assert!(messages[0].contains("added to the processing queue"));
    assert!(messages[1].starts_with("Started processing"));
    assert!(messages[2].contains("detected as contract"));
    assert!(messages[3].contains("processed successfully"));
    assert!(messages[3].contains("Chain: opened for contract Д-2024-001"));

    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_act_closes_part_of_chain() {
    let harness = TestHarness::new();
    let (pool, _rx) = harness.pool(2);
    pool.start().unwrap();

    harness.process(&pool, "user-1", "dogovor.pdf", CONTRACT).await;
    let task = harness.process(&pool, "user-1", "akt.pdf", ACT).await;

    assert_eq!(task.status, TaskStatus::Completed);
    let result = task.result.as_ref().unwrap();
    assert_eq!(result.doc_type, DocumentType::Act);
    assert!(matches!(
        result.chain,
        Some(ChainOutcome::Linked {
            link_type: LinkType::Closing,
            ..
        })
    ));

    let detail = harness.ledger.chain_detail("Д-2024-001").unwrap().unwrap();
    assert_eq!(detail.chain.closed_amount, 500_000.0);
    assert_eq!(detail.chain.remaining_amount, 500_000.0);
    assert_eq!(detail.closing_count, 1);
    assert_eq!(detail.documents.len(), 2);

    let unclosed = harness.ledger.list_unclosed_chains().unwrap();
    assert_eq!(unclosed.len(), 1);

    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_short_tax_id_fails_validation_without_saving() {
    let harness = TestHarness::new();
    let (pool, mut rx) = harness.pool(1);
    pool.start().unwrap();

    let task = harness.process(&pool, "user-1", "upd.pdf", UTD_BAD_TAX_ID).await;

    assert_eq!(task.status, TaskStatus::ValidationFailed);
    assert!(task
        .validation_errors
        .iter()
        .any(|e| e.contains("invalid tax id length")));
    assert!(task.result.as_ref().unwrap().document_id.is_none());
    assert!(!task.source_path.exists());

    let stats = harness.ledger.database_stats().unwrap();
    assert_eq!(stats.documents, 0);
    assert_eq!(pool.stats().total_validation_failed, 1);

    let last = drain(&mut rx).pop().unwrap();
    assert!(last.message.contains("failed validation"));
    assert!(last.message.contains("invalid tax id length"));

    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_document_is_reported_unreadable() {
    let harness = TestHarness::new();
    let (pool, mut rx) = harness.pool(1);
    pool.start().unwrap();

    let task = harness.process(&pool, "user-9", "blank.txt", "   \n").await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.is_some());
    assert!(!task.source_path.exists());
    assert_eq!(pool.stats().total_failed, 1);

    let messages = drain(&mut rx);
    assert!(messages.iter().all(|n| n.submitter_id == "user-9"));
    assert!(messages
        .last()
        .unwrap()
        .message
        .starts_with("Could not read document 'blank.txt'"));

    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_fails_in_flight_and_keeps_queued_tasks() {
    let harness = TestHarness::new();
    let gated = Arc::new(GatedTextExtractor::new());
    let (pool, mut rx) = harness.pool_with(2, gated.clone(), None);
    pool.start().unwrap();

    let mut ids = Vec::new();
    for i in 1..=5 {
        let text = format!(
            "ДОГОВОР №Д-{0} от 15.01.2024 ООО Поставщик ИНН 1234567890 Сумма {0}00000",
            i
        );
        let path = harness.write_upload(&format!("contract-{}.txt", i), &text);
        ids.push(pool.submit("user-1", &format!("contract-{}.txt", i), path).await.unwrap());
    }

    wait_until(|| gated.entered() == 2).await;
    let stats = pool.stats();
    assert_eq!(stats.queue_depth, 3);
    assert_eq!(stats.worker_count, 2);

    pool.stop().await;
    assert!(!pool.is_running());

    let in_flight: Vec<_> = ids
        .iter()
        .filter_map(|id| pool.status(id))
        .filter(|t| t.status == TaskStatus::Failed)
        .collect();
    assert_eq!(in_flight.len(), 2);
    for task in &in_flight {
        assert!(task.error.as_deref().unwrap().contains("cancelled"));
        assert!(!task.source_path.exists());
    }
    let stats = pool.stats();
    assert_eq!(stats.queue_depth, 3);
    assert_eq!(stats.worker_count, 0);
    assert_eq!(stats.total_failed, 2);

    let cancelled_notices = drain(&mut rx)
        .into_iter()
        .filter(|n| n.message.starts_with("Internal error"))
        .count();
    assert_eq!(cancelled_notices, 2);

    gated.open();
    pool.start().unwrap();
    wait_idle(&pool).await;

    let statuses: Vec<TaskStatus> = ids.iter().map(|id| pool.status(id).unwrap().status).collect();
    assert_eq!(
        statuses.iter().filter(|s| **s == TaskStatus::Completed).count(),
        3
    );
    assert_eq!(
        statuses.iter().filter(|s| **s == TaskStatus::Failed).count(),
        2
    );
    assert_eq!(harness.ledger.database_stats().unwrap().chains, 3);

    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_path_fills_missing_fields() {
    let harness = TestHarness::new();
    let backend = Arc::new(ScriptedBackend::new([
        r#"Here you go: {"date": "05.03.2024", "amount": "12000", "contract_number": "Д-2024-001"}"#,
    ]));
    let (pool, _rx) = harness.pool_with(
        1,
        Arc::new(docchain::FileTextExtractor::new()),
        Some(backend.clone()),
    );
    pool.start().unwrap();

    harness.process(&pool, "user-1", "dogovor.pdf", CONTRACT).await;
    let task = harness
        .process(&pool, "user-1", "schet.pdf", "СЧЕТ №С-9 ООО Поставщик")
        .await;

    assert_eq!(task.status, TaskStatus::Completed, "{:?}", task.error);
    let result = task.result.as_ref().unwrap();
    assert_eq!(result.doc_type, DocumentType::Invoice);
    assert_eq!(result.fields.amount.as_deref(), Some("12000"));
    assert_eq!(result.fields.document_number.as_deref(), Some("С-9"));
    assert!(matches!(
        result.chain,
        Some(ChainOutcome::Linked {
            link_type: LinkType::Invoice,
            ..
        })
    ));

    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("СЧЕТ №С-9"));

    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tasks_for_lists_only_the_submitter() {
    let harness = TestHarness::new();
    let (pool, _rx) = harness.pool(1);
    pool.start().unwrap();

    harness.process(&pool, "alice", "dogovor.pdf", CONTRACT).await;
    harness.process(&pool, "bob", "upd.pdf", UTD_BAD_TAX_ID).await;
    harness.process(&pool, "alice", "akt.pdf", ACT).await;

    let alice = pool.tasks_for("alice");
    assert_eq!(alice.len(), 2);
    assert_eq!(alice[0].filename, "akt.pdf");
    assert!(alice.iter().all(|t| t.submitter_id == "alice"));
    assert_eq!(pool.tasks_for("bob").len(), 1);
    assert!(pool.tasks_for("carol").is_empty());

    let stats = pool.stats();
    assert_eq!(stats.total_processed, 2);
    assert_eq!(stats.completed_count, 3);
    assert_eq!(stats.active_count, 0);
    assert!(stats.average_processing_time_secs > 0.0);

    pool.stop().await;
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let harness = TestHarness::new();
    let (pool, _rx) = harness.pool(1);
    pool.start().unwrap();
    assert!(matches!(
        pool.start(),
        Err(docchain::WorkerError::AlreadyRunning)
    ));
    pool.stop().await;
    pool.stop().await;
}

#[test]
fn test_start_outside_runtime_is_rejected() {
    let harness = TestHarness::new();
    let (pool, _rx) = harness.pool(1);
    assert!(matches!(pool.start(), Err(docchain::WorkerError::NoRuntime)));
    assert!(!pool.is_running());
}
