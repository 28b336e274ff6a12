// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-process ledger backend.

use crate::{
    AttachmentFileRecord, AuditEventRecord, AuditLog, IdempotencyLedger, IdempotencyRecord,
    LedgerError, MessageLedger, MessageRecord, RunRecord, RunStore,
};
use async_trait::async_trait;
use ino_core::{Channel, ErrorInfo, Status, normalize_message_id, now_iso};
use ino_redact::redact_value;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    runs: HashMap<String, RunRecord>,
    idempotency: HashMap<String, IdempotencyRecord>,
    messages: Vec<MessageRecord>,
    attachments: Vec<AttachmentFileRecord>,
    audit: Vec<AuditEventRecord>,
}

/// In-memory ledger for tests and single-process dev.
///
/// Implements all four ledger traits behind one shared lock; writes to a
/// single idempotency key are linearized by the lock.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for MemoryLedger {
    async fn create_run(&self, record: RunRecord) -> Result<(), LedgerError> {
        let mut guard = self.inner.write().await;
        if guard.runs.contains_key(&record.run_id) {
            return Err(LedgerError::Duplicate {
                key: record.run_id,
            });
        }
        guard.runs.insert(record.run_id.clone(), record);
        Ok(())
    }

    async fn update_run(
        &self,
        run_id: &str,
        status: Status,
        finished_at: Option<String>,
        state_json: Option<Value>,
        errors: Option<Vec<ErrorInfo>>,
        warnings: Option<Vec<String>>,
    ) -> Result<(), LedgerError> {
        let mut guard = self.inner.write().await;
        let run = guard.runs.get_mut(run_id).ok_or_else(|| LedgerError::NotFound {
            key: run_id.to_string(),
        })?;
        run.status = status;
        if finished_at.is_some() {
            run.finished_at = finished_at;
        }
        if state_json.is_some() {
            run.state_json = state_json;
        }
        if let Some(errors) = errors {
            run.errors = errors;
        }
        if let Some(warnings) = warnings {
            run.warnings = warnings;
        }
        Ok(())
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>, LedgerError> {
        Ok(self.inner.read().await.runs.get(run_id).cloned())
    }

    async fn find_run_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<RunRecord>, LedgerError> {
        let guard = self.inner.read().await;
        Ok(guard
            .runs
            .values()
            .filter(|r| r.message_id == message_id)
            .max_by(|a, b| a.started_at.cmp(&b.started_at))
            .cloned())
    }
}

/// Merge an upsert into an existing record, honouring SUCCESS immutability.
pub(crate) fn merge_upsert(
    existing: Option<IdempotencyRecord>,
    incoming: IdempotencyRecord,
) -> IdempotencyRecord {
    match existing {
        Some(stored) if stored.status == Status::Success => stored,
        Some(mut stored) => {
            stored.status = incoming.status;
            stored.sales_order_no = incoming.sales_order_no;
            stored.order_url = incoming.order_url;
            if incoming.file_sha256.is_some() {
                stored.file_sha256 = incoming.file_sha256;
            }
            if incoming.customer_id.is_some() {
                stored.customer_id = incoming.customer_id;
            }
            stored
        }
        None => incoming,
    }
}

#[async_trait]
impl IdempotencyLedger for MemoryLedger {
    async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>, LedgerError> {
        Ok(self.inner.read().await.idempotency.get(key).cloned())
    }

    async fn upsert(&self, record: IdempotencyRecord) -> Result<IdempotencyRecord, LedgerError> {
        let mut guard = self.inner.write().await;
        let key = record.idempotency_key.clone();
        let merged = merge_upsert(guard.idempotency.get(&key).cloned(), record);
        guard.idempotency.insert(key, merged.clone());
        Ok(merged)
    }
}

#[async_trait]
impl MessageLedger for MemoryLedger {
    async fn find_message(
        &self,
        channel: Channel,
        message_id: &str,
    ) -> Result<Option<MessageRecord>, LedgerError> {
        let canonical = normalize_message_id(message_id);
        let guard = self.inner.read().await;
        Ok(guard
            .messages
            .iter()
            .find(|m| m.channel == channel && (m.message_id == message_id || m.message_id == canonical))
            .cloned())
    }

    async fn insert_message(&self, mut record: MessageRecord) -> Result<(), LedgerError> {
        record.message_id = normalize_message_id(&record.message_id);
        let mut guard = self.inner.write().await;
        if guard
            .messages
            .iter()
            .any(|m| m.channel == record.channel && m.message_id == record.message_id)
        {
            return Err(LedgerError::Duplicate {
                key: format!("{}:{}", record.channel, record.message_id),
            });
        }
        guard.messages.push(record);
        Ok(())
    }

    async fn mark_processed(&self, record_id: &str) -> Result<(), LedgerError> {
        let mut guard = self.inner.write().await;
        let record = guard
            .messages
            .iter_mut()
            .find(|m| m.record_id == record_id)
            .ok_or_else(|| LedgerError::NotFound {
                key: record_id.to_string(),
            })?;
        record.processed = true;
        record.processed_at = Some(now_iso());
        Ok(())
    }

    async fn record_attachment(
        &self,
        message_id: &str,
        file_path: &str,
    ) -> Result<AttachmentFileRecord, LedgerError> {
        let record = AttachmentFileRecord {
            id: Uuid::new_v4().to_string(),
            message_id: message_id.to_string(),
            file_path: file_path.to_string(),
            created_at: now_iso(),
        };
        self.inner.write().await.attachments.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl AuditLog for MemoryLedger {
    async fn append(
        &self,
        run_id: &str,
        step: &str,
        payload: Value,
    ) -> Result<AuditEventRecord, LedgerError> {
        let record = AuditEventRecord {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            step: step.to_string(),
            payload: redact_value(&payload),
            created_at: now_iso(),
        };
        self.inner.write().await.audit.push(record.clone());
        Ok(record)
    }

    async fn events_for_run(&self, run_id: &str) -> Result<Vec<AuditEventRecord>, LedgerError> {
        let guard = self.inner.read().await;
        Ok(guard
            .audit
            .iter()
            .filter(|e| e.run_id == run_id)
            .cloned()
            .collect())
    }
}
