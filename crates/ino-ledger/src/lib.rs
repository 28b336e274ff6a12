// SPDX-License-Identifier: MIT OR Apache-2.0
//! Durable business records: orchestration runs, the idempotency ledger,
//! the message ledger, and the append-only audit log.
//!
//! Each concern is a small trait with an in-memory backend (tests,
//! single-process dev) and a JSON-file backend sharing one root directory.
//! Audit payloads are redacted here, at the persistence boundary, so no
//! caller can accidentally store PII.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod file;
mod memory;
mod records;

pub use file::FileLedger;
pub use memory::MemoryLedger;
pub use records::{
    AttachmentFileRecord, AuditEventRecord, IdempotencyRecord, MessageRecord, RunRecord,
};

use async_trait::async_trait;
use ino_core::{Channel, ErrorInfo, Status};
use serde_json::Value;

/// Errors from ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A uniqueness constraint was violated.
    #[error("duplicate entry: {key}")]
    Duplicate {
        /// Offending key.
        key: String,
    },
    /// The referenced record does not exist.
    #[error("not found: {key}")]
    NotFound {
        /// Missing key.
        key: String,
    },
    /// Underlying storage failed.
    #[error("ledger storage error: {0}")]
    Storage(String),
}

/// Durable store of orchestration run records.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Create a run record at graph entry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Duplicate`] when the run id already exists.
    async fn create_run(&self, record: RunRecord) -> Result<(), LedgerError>;

    /// Update status and terminal fields of a run.
    ///
    /// `None` arguments leave the stored value untouched.
    async fn update_run(
        &self,
        run_id: &str,
        status: Status,
        finished_at: Option<String>,
        state_json: Option<Value>,
        errors: Option<Vec<ErrorInfo>>,
        warnings: Option<Vec<String>>,
    ) -> Result<(), LedgerError>;

    /// Fetch a run by id.
    async fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>, LedgerError>;

    /// The most recent run for a message id, if any.
    async fn find_run_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<RunRecord>, LedgerError>;
}

/// Content-addressed ledger guaranteeing at-most-once ERP submission.
#[async_trait]
pub trait IdempotencyLedger: Send + Sync {
    /// Fetch a record by key.
    async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>, LedgerError>;

    /// Create or update a record.
    ///
    /// A record already in `SUCCESS` is immutable in its `status`,
    /// `sales_order_no`, and `order_url`; such upserts return the stored
    /// record unchanged.
    async fn upsert(&self, record: IdempotencyRecord) -> Result<IdempotencyRecord, LedgerError>;
}

/// At-most-once dispatch ledger for inbound messages.
#[async_trait]
pub trait MessageLedger: Send + Sync {
    /// Find a message record by `(channel, message_id)`; the id may be raw
    /// or normalized (RFC 5322 angle brackets).
    async fn find_message(
        &self,
        channel: Channel,
        message_id: &str,
    ) -> Result<Option<MessageRecord>, LedgerError>;

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Duplicate`] when `(channel, message_id)`
    /// already exists.
    async fn insert_message(&self, record: MessageRecord) -> Result<(), LedgerError>;

    /// Mark a record processed.
    async fn mark_processed(&self, record_id: &str) -> Result<(), LedgerError>;

    /// Record a persisted attachment file for a message.
    async fn record_attachment(
        &self,
        message_id: &str,
        file_path: &str,
    ) -> Result<AttachmentFileRecord, LedgerError>;
}

/// Append-only audit log. Payloads are redacted before persistence.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append an event; returns the stored (redacted) record.
    async fn append(
        &self,
        run_id: &str,
        step: &str,
        payload: Value,
    ) -> Result<AuditEventRecord, LedgerError>;

    /// All events for a run, oldest first.
    async fn events_for_run(&self, run_id: &str) -> Result<Vec<AuditEventRecord>, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ino_core::now_iso;
    use serde_json::json;

    fn run(run_id: &str, message_id: &str) -> RunRecord {
        RunRecord {
            run_id: run_id.into(),
            message_id: message_id.into(),
            status: Status::Pending,
            started_at: now_iso(),
            finished_at: None,
            state_json: None,
            errors: vec![],
            warnings: vec![],
        }
    }

    fn idem(key: &str, status: Status) -> IdempotencyRecord {
        IdempotencyRecord {
            idempotency_key: key.into(),
            message_id: "m1".into(),
            file_sha256: Some("f".repeat(64)),
            customer_id: Some("C1".into()),
            status,
            sales_order_no: None,
            order_url: None,
            created_at: now_iso(),
        }
    }

    fn msg(record_id: &str, message_id: &str) -> MessageRecord {
        MessageRecord {
            record_id: record_id.into(),
            channel: Channel::Email,
            message_id: message_id.into(),
            account: "orders@corp".into(),
            external_uid: "u1".into(),
            sender_id: "buyer@example.com".into(),
            received_at: Some(now_iso()),
            processed: false,
            processed_at: None,
            created_at: now_iso(),
        }
    }

    async fn exercise_run_store(store: &dyn RunStore) {
        store.create_run(run("r1", "m1")).await.unwrap();
        assert!(matches!(
            store.create_run(run("r1", "m1")).await.unwrap_err(),
            LedgerError::Duplicate { .. }
        ));

        store
            .update_run("r1", Status::Success, Some(now_iso()), None, None, None)
            .await
            .unwrap();
        let stored = store.get_run("r1").await.unwrap().unwrap();
        assert_eq!(stored.status, Status::Success);
        assert!(stored.finished_at.is_some());

        // Latest run per message id wins.
        store.create_run(run("r2", "m1")).await.unwrap();
        let latest = store.find_run_by_message_id("m1").await.unwrap().unwrap();
        assert_eq!(latest.run_id, "r2");

        assert!(matches!(
            store
                .update_run("missing", Status::Failed, None, None, None, None)
                .await
                .unwrap_err(),
            LedgerError::NotFound { .. }
        ));
    }

    async fn exercise_idempotency(ledger: &dyn IdempotencyLedger) {
        assert!(ledger.get("k1").await.unwrap().is_none());

        ledger.upsert(idem("k1", Status::Pending)).await.unwrap();

        let mut success = idem("k1", Status::Success);
        success.sales_order_no = Some("SO001".into());
        success.order_url = Some("https://erp/orders/SO001".into());
        ledger.upsert(success).await.unwrap();

        // A later upsert must not disturb the terminal result.
        let mut clobber = idem("k1", Status::Failed);
        clobber.sales_order_no = Some("SO999".into());
        let stored = ledger.upsert(clobber).await.unwrap();
        assert_eq!(stored.status, Status::Success);
        assert_eq!(stored.sales_order_no.as_deref(), Some("SO001"));

        let read_back = ledger.get("k1").await.unwrap().unwrap();
        assert_eq!(read_back.sales_order_no.as_deref(), Some("SO001"));
    }

    async fn exercise_message_ledger(ledger: &dyn MessageLedger) {
        ledger.insert_message(msg("rec1", "m1@host")).await.unwrap();
        assert!(matches!(
            ledger.insert_message(msg("rec2", "m1@host")).await.unwrap_err(),
            LedgerError::Duplicate { .. }
        ));

        // Raw (bracketed) lookup finds the normalized record.
        let found = ledger
            .find_message(Channel::Email, "<m1@host>")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.record_id, "rec1");
        assert!(!found.processed);

        // Channel is part of the key.
        assert!(
            ledger
                .find_message(Channel::Webhook, "m1@host")
                .await
                .unwrap()
                .is_none()
        );

        ledger.mark_processed("rec1").await.unwrap();
        let processed = ledger
            .find_message(Channel::Email, "m1@host")
            .await
            .unwrap()
            .unwrap();
        assert!(processed.processed);
        assert!(processed.processed_at.is_some());

        let att = ledger
            .record_attachment("m1@host", "m1@host/contract.pdf")
            .await
            .unwrap();
        assert_eq!(att.file_path, "m1@host/contract.pdf");
    }

    async fn exercise_audit(log: &dyn AuditLog) {
        let event = log
            .append(
                "r1",
                "finalize",
                json!({"email": "buyer@example.com", "status": "SUCCESS"}),
            )
            .await
            .unwrap();
        // Redaction happened at the boundary.
        assert_eq!(event.payload["email"], "b***@example.com");

        log.append("r1", "manual_review_submit", json!({"action": "BLOCK"}))
            .await
            .unwrap();
        log.append("r2", "finalize", json!({})).await.unwrap();

        let events = log.events_for_run("r1").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].step, "finalize");
        assert_eq!(events[1].step, "manual_review_submit");
    }

    #[tokio::test]
    async fn memory_backends() {
        let ledger = MemoryLedger::new();
        exercise_run_store(&ledger).await;
        exercise_idempotency(&ledger).await;
        exercise_message_ledger(&ledger).await;
        exercise_audit(&ledger).await;
    }

    #[tokio::test]
    async fn file_backends() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::new(dir.path());
        ledger.initialize().await.unwrap();
        exercise_run_store(&ledger).await;
        exercise_idempotency(&ledger).await;
        exercise_message_ledger(&ledger).await;
        exercise_audit(&ledger).await;
    }

    #[tokio::test]
    async fn file_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let ledger = FileLedger::new(dir.path());
            ledger.initialize().await.unwrap();
            ledger.create_run(run("r1", "m1")).await.unwrap();
            let mut success = idem("k1", Status::Success);
            success.sales_order_no = Some("SO001".into());
            ledger.upsert(success).await.unwrap();
        }
        let ledger = FileLedger::new(dir.path());
        assert!(ledger.get_run("r1").await.unwrap().is_some());
        assert_eq!(
            ledger
                .get("k1")
                .await
                .unwrap()
                .unwrap()
                .sales_order_no
                .as_deref(),
            Some("SO001")
        );
    }
}
