// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end orchestration scenarios against stubbed collaborators.

use ino_checkpoint::MemoryCheckpointStore;
use ino_clients::{BlobClient, ErpClient, LlmClient, LocalBlobStore, NullNotifier};
use ino_config::AppConfig;
use ino_core::{
    Attachment, Channel, Contact, Customer, InboundMessage, MAX_ATTACHMENT_BYTES,
    MasterDataSnapshot, Status, idempotency_key, sha256_hex,
};
use ino_graph::{GraphContext, OrchestrationService};
use ino_ledger::{AuditLog, IdempotencyLedger, MemoryLedger, RunStore};
use ino_masterdata::{MasterDataCache, StaticMasterDataProvider};
use ino_retry::RetryConfig;
use ino_review::ReviewService;
use ino_telemetry::StepMetrics;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    orchestration: OrchestrationService,
    review: ReviewService,
    ledger: Arc<MemoryLedger>,
    contract_llm: MockServer,
    order_llm: MockServer,
    erp: MockServer,
    _blob: MockServer,
    _dir: tempfile::TempDir,
}

async fn harness() -> Harness {
    let contract_llm = MockServer::start().await;
    let order_llm = MockServer::start().await;
    let erp = MockServer::start().await;
    let blob = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/files/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file_url": "https://files.corp/v1/blobs/abc123",
            "file_id": "abc123"
        })))
        .mount(&blob)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let http = reqwest::Client::new();
    let ledger = Arc::new(MemoryLedger::new());

    let snapshot = MasterDataSnapshot::new(
        1,
        vec![Customer {
            customer_id: "C1".into(),
            customer_num: "1001".into(),
            name: "Acme Industrial".into(),
            company_id: None,
        }],
        vec![Contact {
            contact_id: "P1".into(),
            email: "customer@example.com".into(),
            name: "Buyer".into(),
            customer_id: "C1".into(),
            telephone: Some("13812345678".into()),
        }],
        vec![],
        vec![],
    );

    let ctx = Arc::new(GraphContext {
        config: Arc::new(AppConfig::default()),
        checkpoint: Arc::new(MemoryCheckpointStore::new()),
        runs: ledger.clone(),
        idempotency: ledger.clone(),
        audit: ledger.clone(),
        masterdata: Arc::new(MasterDataCache::new(
            Arc::new(StaticMasterDataProvider::new(snapshot)),
            Duration::from_secs(300),
        )),
        llm_contract: LlmClient::new(
            http.clone(),
            contract_llm.uri(),
            "contract-key",
            "/v1/chat-messages",
            Duration::from_secs(5),
        )
        .with_retry(RetryConfig::fast(3)),
        llm_order: LlmClient::new(
            http.clone(),
            order_llm.uri(),
            "order-key",
            "/v1/chat-messages",
            Duration::from_secs(5),
        )
        .with_retry(RetryConfig::fast(3)),
        erp: ErpClient::new(
            http.clone(),
            erp.uri(),
            "erp-key",
            "",
            Duration::from_secs(5),
        )
        .with_retry(RetryConfig::fast(3)),
        blob: BlobClient::new(http.clone(), blob.uri(), "blob-key"),
        artifacts: LocalBlobStore::new(dir.path()),
        notifier: Arc::new(NullNotifier),
        metrics: StepMetrics::new(),
        retry: RetryConfig::fast(3),
    });

    let orchestration = OrchestrationService::new(ctx);
    let review = ReviewService::new(orchestration.clone());
    Harness {
        orchestration,
        review,
        ledger,
        contract_llm,
        order_llm,
        erp,
        _blob: blob,
        _dir: dir,
    }
}

fn pdf(id: &str, filename: &str, bytes: &[u8]) -> Attachment {
    use base64::Engine as _;
    Attachment {
        attachment_id: id.into(),
        filename: filename.into(),
        content_type: "application/pdf".into(),
        size_bytes: bytes.len() as u64,
        sha256: Some(sha256_hex(bytes)),
        bytes_b64: Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
        blob_path: None,
    }
}

fn event(message_id: &str, sender: &str, subject: &str, attachments: Vec<Attachment>) -> InboundMessage {
    InboundMessage {
        channel: Channel::Email,
        provider: "restmail".into(),
        account: "orders@corp".into(),
        external_uid: format!("uid-{message_id}"),
        message_id: message_id.into(),
        sender_id: sender.into(),
        recipients: vec!["orders@corp.com".into()],
        cc: vec![],
        subject: subject.into(),
        body_text: String::new(),
        body_html: None,
        received_at: "2025-06-01T09:00:00+08:00".into(),
        attachments,
    }
}

async fn mount_llm_ok(harness: &Harness) {
    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "{\"ok\": true, \"items\": [{\"product\": \"P1\", \"qty\": 1}], \"contract_meta\": {}}"
        })))
        .mount(&harness.contract_llm)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "{\"ok\": true, \"order_payload\": {\"customer_id\": \"C1\", \"items\": [{\"product\": \"P1\", \"qty\": 1}]}}"
        })))
        .mount(&harness.order_llm)
        .await;
}

async fn mount_erp_ok(harness: &Harness) {
    Mock::given(method("POST"))
        .and(path("/api/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sales_order_no": "SO001",
            "order_url": "https://erp/orders/SO001"
        })))
        .mount(&harness.erp)
        .await;
}

// -- 1. Happy path ---------------------------------------------------------

#[tokio::test]
async fn happy_path_creates_order() {
    let h = harness().await;
    mount_llm_ok(&h).await;
    mount_erp_ok(&h).await;

    let result = h
        .orchestration
        .run_message(event(
            "<po-1@buyer>",
            "customer@example.com",
            "采购合同 - June",
            vec![pdf("att1", "contract.pdf", b"pdf-bytes")],
        ))
        .await
        .unwrap();

    assert_eq!(result.status, Status::Success);
    assert_eq!(result.sales_order_no.as_deref(), Some("SO001"));
    assert_eq!(result.order_url.as_deref(), Some("https://erp/orders/SO001"));
    assert!(result.errors.is_empty());
    assert_eq!(result.customer_id.as_deref(), Some("C1"));

    // Canonical ledger entry carries the terminal result.
    let canonical = idempotency_key("po-1@buyer", &sha256_hex(b"pdf-bytes"), "C1");
    let record = h.ledger.get(&canonical).await.unwrap().unwrap();
    assert_eq!(record.status, Status::Success);
    assert_eq!(record.sales_order_no.as_deref(), Some("SO001"));

    // Audit totality: a finalize event exists for the run.
    let events = h.ledger.events_for_run(&result.run_id).await.unwrap();
    assert!(events.iter().any(|e| e.step == "finalize"));

    // Redaction: the persisted state leaks no plain email address.
    let run = h.ledger.get_run(&result.run_id).await.unwrap().unwrap();
    assert_eq!(run.status, Status::Success);
    let state_json = serde_json::to_string(&run.state_json).unwrap();
    assert!(!state_json.contains("customer@example.com"));
}

// -- 2. Unknown contact ----------------------------------------------------

#[tokio::test]
async fn unknown_contact_skips_external_systems() {
    let h = harness().await;
    // Zero expected calls on every collaborator.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.erp)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.contract_llm)
        .await;

    let result = h
        .orchestration
        .run_message(event(
            "<po-2@buyer>",
            "unknown@example.com",
            "采购合同",
            vec![pdf("att1", "contract.pdf", b"x")],
        ))
        .await
        .unwrap();

    assert_eq!(result.status, Status::UnknownContact);
    assert_eq!(result.errors[0].code, "CONTACT_NOT_FOUND");
}

// -- 3. Not a contract mail ------------------------------------------------

#[tokio::test]
async fn non_contract_mail_is_ignored() {
    let h = harness().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.erp)
        .await;

    let mut doc = pdf("att1", "notes.txt", b"hello");
    doc.content_type = "text/plain".into();
    let result = h
        .orchestration
        .run_message(event("<po-3@buyer>", "customer@example.com", "普通邮件", vec![doc]))
        .await
        .unwrap();

    assert_eq!(result.status, Status::Ignored);
}

// -- 4. Multi-PDF manual review and resume ---------------------------------

#[tokio::test]
async fn multi_pdf_pauses_then_resume_succeeds() {
    let h = harness().await;
    mount_llm_ok(&h).await;
    mount_erp_ok(&h).await;

    let result = h
        .orchestration
        .run_message(event(
            "<po-4@buyer>",
            "customer@example.com",
            "采购合同",
            vec![
                pdf("att1", "contract-a.pdf", b"first"),
                pdf("att2", "contract-b.pdf", b"second"),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(result.status, Status::ManualReview);
    let review_info = result.manual_review.expect("candidates generated");
    assert_eq!(review_info.reason_code, "MULTI_PDF_ATTACHMENTS");
    assert_eq!(review_info.candidates.pdfs.len(), 2);
    assert!(review_info.candidates.pdfs.iter().all(|p| !p.suggested));

    let response = h
        .review
        .submit(ino_core::ManualReviewRequest {
            run_id: result.run_id.clone(),
            message_id: Some("po-4@buyer".into()),
            decision: ino_core::ManualReviewDecision {
                action: "RESUME".into(),
                selected_customer_id: Some("C1".into()),
                selected_contact_id: None,
                selected_attachment_id: Some("att2".into()),
                comment: None,
            },
            operator: ino_core::Operator {
                user_id: Some("op-1".into()),
                user_name: Some("Reviewer".into()),
            },
            auth: ino_core::ReviewAuth {
                tenant_id: None,
                scopes: vec!["mcs:sales_email:manual_review".into()],
                request_id: Some("req-1".into()),
            },
        })
        .await;

    assert!(response.ok, "{response:?}");
    assert_eq!(response.status.as_deref(), Some("RESUMING"));
    let resume = response.resume.unwrap();
    assert_eq!(resume["from_node"], "upload_pdf");

    let run = h.ledger.get_run(&result.run_id).await.unwrap().unwrap();
    assert_eq!(run.status, Status::Success);

    // The resumed run settled on the reviewer's selection.
    let canonical = idempotency_key("po-4@buyer", &sha256_hex(b"second"), "C1");
    let record = h.ledger.get(&canonical).await.unwrap().unwrap();
    assert_eq!(record.status, Status::Success);
}

// -- 5. Idempotent replay --------------------------------------------------

#[tokio::test]
async fn replaying_the_same_event_short_circuits() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "{\"ok\": true, \"items\": [], \"contract_meta\": {}}"
        })))
        .expect(1)
        .mount(&h.contract_llm)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat-messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "{\"ok\": true, \"order_payload\": {}}"
        })))
        .expect(1)
        .mount(&h.order_llm)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sales_order_no": "SO001",
            "order_url": "https://erp/orders/SO001"
        })))
        .expect(1)
        .mount(&h.erp)
        .await;

    let make_event = || {
        event(
            "<po-5@buyer>",
            "customer@example.com",
            "采购合同",
            vec![pdf("att1", "contract.pdf", b"same-bytes")],
        )
    };

    let first = h.orchestration.run_message(make_event()).await.unwrap();
    assert_eq!(first.status, Status::Success);

    // Second run hits the ledger at graph entry; the expect(1) mocks prove
    // no further LLM/ERP invocations happened.
    let second = h.orchestration.run_message(make_event()).await.unwrap();
    assert_eq!(second.status, Status::Success);
    assert_eq!(second.sales_order_no.as_deref(), Some("SO001"));
    assert_ne!(first.run_id, second.run_id);
}

// -- 6. ERP transient failure ----------------------------------------------

#[tokio::test]
async fn erp_503_retries_then_succeeds() {
    let h = harness().await;
    mount_llm_ok(&h).await;
    Mock::given(method("POST"))
        .and(path("/api/orders"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&h.erp)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sales_order_no": "SO001",
            "order_url": "https://erp/orders/SO001"
        })))
        .expect(1)
        .mount(&h.erp)
        .await;

    let result = h
        .orchestration
        .run_message(event(
            "<po-6@buyer>",
            "customer@example.com",
            "采购合同",
            vec![pdf("att1", "contract.pdf", b"bytes")],
        ))
        .await
        .unwrap();
    assert_eq!(result.status, Status::Success);
}

#[tokio::test]
async fn erp_exhaustion_fails_without_ledger_success() {
    let h = harness().await;
    mount_llm_ok(&h).await;
    Mock::given(method("POST"))
        .and(path("/api/orders"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&h.erp)
        .await;

    let result = h
        .orchestration
        .run_message(event(
            "<po-7@buyer>",
            "customer@example.com",
            "采购合同",
            vec![pdf("att1", "contract.pdf", b"bytes7")],
        ))
        .await
        .unwrap();

    assert_eq!(result.status, Status::ErpOrderFailed);
    assert!(result.errors.iter().any(|e| e.code == "ERP_CONNECTION_FAILED"));

    let canonical = idempotency_key("po-7@buyer", &sha256_hex(b"bytes7"), "C1");
    let record = h.ledger.get(&canonical).await.unwrap().unwrap();
    assert_ne!(record.status, Status::Success);
}

// -- Boundary: attachment size ---------------------------------------------

#[tokio::test]
async fn oversized_attachment_is_rejected_at_ingest() {
    let h = harness().await;
    let mut big = pdf("att1", "contract.pdf", b"x");
    big.size_bytes = MAX_ATTACHMENT_BYTES + 1;
    let err = h
        .orchestration
        .run_message(event("<po-8@buyer>", "customer@example.com", "采购合同", vec![big]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("exceeds"));

    // Exactly at the limit passes validation.
    let mut ok = pdf("att1", "contract.pdf", b"x");
    ok.size_bytes = MAX_ATTACHMENT_BYTES;
    event("<po-9@buyer>", "customer@example.com", "采购合同", vec![ok])
        .validate()
        .unwrap();
}
