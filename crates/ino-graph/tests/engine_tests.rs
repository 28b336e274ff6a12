// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine walk behaviour: checkpointing cadence, audit totality,
//! cancellation safety.

use ino_checkpoint::{CheckpointStore, MemoryCheckpointStore};
use ino_clients::{BlobClient, ErpClient, LlmClient, LocalBlobStore, NullNotifier};
use ino_config::AppConfig;
use ino_core::{Attachment, Channel, InboundMessage, Status};
use ino_graph::{CancellationToken, GraphContext, OrchestrationService};
use ino_ledger::{AuditLog, MemoryLedger, RunStore};
use ino_masterdata::{MasterDataCache, StaticMasterDataProvider};
use ino_retry::RetryConfig;
use ino_telemetry::StepMetrics;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    orchestration: OrchestrationService,
    checkpoint: Arc<MemoryCheckpointStore>,
    ledger: Arc<MemoryLedger>,
    _dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let http = reqwest::Client::new();
    let checkpoint = Arc::new(MemoryCheckpointStore::new());
    let ledger = Arc::new(MemoryLedger::new());
    // Dead endpoints: the walks under test never reach an external system.
    let dead = "http://127.0.0.1:9";

    let ctx = Arc::new(GraphContext {
        config: Arc::new(AppConfig::default()),
        checkpoint: checkpoint.clone(),
        runs: ledger.clone(),
        idempotency: ledger.clone(),
        audit: ledger.clone(),
        masterdata: Arc::new(MasterDataCache::new(
            Arc::new(StaticMasterDataProvider::default()),
            Duration::from_secs(300),
        )),
        llm_contract: LlmClient::new(http.clone(), dead, "k", "/v1/chat-messages", Duration::from_secs(1)),
        llm_order: LlmClient::new(http.clone(), dead, "k", "/v1/chat-messages", Duration::from_secs(1)),
        erp: ErpClient::new(http.clone(), dead, "k", "", Duration::from_secs(1)),
        blob: BlobClient::new(http, dead, "k"),
        artifacts: LocalBlobStore::new(dir.path()),
        notifier: Arc::new(NullNotifier),
        metrics: StepMetrics::new(),
        retry: RetryConfig::fast(1),
    });

    Fixture {
        orchestration: OrchestrationService::new(ctx),
        checkpoint,
        ledger,
        _dir: dir,
    }
}

fn event() -> InboundMessage {
    InboundMessage {
        channel: Channel::Email,
        provider: "restmail".into(),
        account: "orders@corp".into(),
        external_uid: "u1".into(),
        message_id: "m1@host".into(),
        sender_id: "nobody@example.com".into(),
        subject: "采购合同".into(),
        body_text: String::new(),
        received_at: "2025-01-01T00:00:00+00:00".into(),
        attachments: vec![Attachment {
            attachment_id: "a1".into(),
            filename: "contract.pdf".into(),
            content_type: "application/pdf".into(),
            size_bytes: 1,
            sha256: None,
            bytes_b64: None,
            blob_path: None,
        }],
        ..Default::default()
    }
}

#[tokio::test]
async fn walk_checkpoints_every_step_and_audits_finalize() {
    let f = fixture();
    let result = f.orchestration.run_message(event()).await.unwrap();
    assert_eq!(result.status, Status::UnknownContact);

    // One checkpoint per executed node, in walk order.
    let history = f.checkpoint.stream_resume(&result.run_id).await.unwrap();
    let steps: Vec<&str> = history.iter().map(|c| c.step.as_str()).collect();
    assert_eq!(
        steps,
        vec![
            "check_idempotency",
            "load_masterdata",
            "match_contact",
            "notify_sales",
            "finalize"
        ]
    );

    // Every step audited; a finalize event exists.
    let events = f.ledger.events_for_run(&result.run_id).await.unwrap();
    assert_eq!(events.len(), steps.len());
    assert!(events.iter().any(|e| e.step == "finalize"));

    // The latest checkpoint holds the terminal state.
    let latest = f.checkpoint.load(&result.run_id).await.unwrap().unwrap();
    assert_eq!(latest.final_status, Some(Status::UnknownContact));
}

#[tokio::test]
async fn cancelled_run_keeps_a_consistent_checkpoint() {
    let f = fixture();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let msg = event().normalized();
    let state = ino_core::RunState::new("run-cancel", msg);
    f.ledger
        .create_run(ino_ledger::RunRecord {
            run_id: "run-cancel".into(),
            message_id: "m1@host".into(),
            status: Status::Pending,
            started_at: ino_core::now_iso(),
            finished_at: None,
            state_json: None,
            errors: vec![],
            warnings: vec![],
        })
        .await
        .unwrap();

    let err = f
        .orchestration
        .resume(state, ino_graph::NodeId::CheckIdempotency, &cancel)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cancelled"));

    // The pre-call state was persisted and the run marked FAILED.
    let checkpointed = f.checkpoint.load("run-cancel").await.unwrap().unwrap();
    assert!(checkpointed.final_status.is_none());
    let run = f.ledger.get_run("run-cancel").await.unwrap().unwrap();
    assert_eq!(run.status, Status::Failed);
}
