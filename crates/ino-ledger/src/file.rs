// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON-file ledger backend.
//!
//! Layout under the root directory:
//!
//! ```text
//! runs/<run_id>.json            one record per run
//! idempotency/<key>.json        one record per idempotency key
//! messages/<channel>-<id>.json  one record per (channel, message id)
//! attachments.jsonl             append-only attachment file records
//! audit/<run_id>.jsonl          append-only audit events per run
//! ```
//!
//! Point writes go through a temp file and an atomic rename; the JSONL
//! files are append-only.

use crate::memory::merge_upsert;
use crate::{
    AttachmentFileRecord, AuditEventRecord, AuditLog, IdempotencyLedger, IdempotencyRecord,
    LedgerError, MessageLedger, MessageRecord, RunRecord, RunStore,
};
use async_trait::async_trait;
use ino_core::{Channel, ErrorInfo, Status, normalize_message_id, now_iso, sha256_hex};
use ino_redact::redact_value;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Durable JSON-file ledger.
#[derive(Clone)]
pub struct FileLedger {
    root: PathBuf,
    // Linearizes read-merge-write cycles (idempotency upserts, message
    // inserts) and JSONL appends.
    write_lock: Arc<Mutex<()>>,
}

fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn storage_err(e: impl std::fmt::Display) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

impl FileLedger {
    /// Create a ledger rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Create the directory layout.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] when directories cannot be created.
    pub async fn initialize(&self) -> Result<(), LedgerError> {
        for dir in ["runs", "idempotency", "messages", "audit"] {
            tokio::fs::create_dir_all(self.root.join(dir))
                .await
                .map_err(storage_err)?;
        }
        Ok(())
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.root.join("runs").join(format!("{}.json", sanitize(run_id)))
    }

    fn idempotency_path(&self, key: &str) -> PathBuf {
        self.root
            .join("idempotency")
            .join(format!("{}.json", sanitize(key)))
    }

    fn message_path(&self, channel: Channel, canonical_id: &str) -> PathBuf {
        self.root
            .join("messages")
            .join(format!("{}-{}.json", channel, sha256_hex(canonical_id.as_bytes())))
    }

    fn audit_path(&self, run_id: &str) -> PathBuf {
        self.root
            .join("audit")
            .join(format!("{}.jsonl", sanitize(run_id)))
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), LedgerError> {
        let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
        let bytes = serde_json::to_vec_pretty(value).map_err(storage_err)?;
        tokio::fs::write(&tmp, &bytes).await.map_err(storage_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(storage_err)?;
        Ok(())
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &Path,
    ) -> Result<Option<T>, LedgerError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_err(e)),
        };
        serde_json::from_slice(&bytes).map(Some).map_err(storage_err)
    }

    async fn append_jsonl<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), LedgerError> {
        let mut line = serde_json::to_vec(value).map_err(storage_err)?;
        line.push(b'\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(storage_err)?;
        file.write_all(&line).await.map_err(storage_err)?;
        file.flush().await.map_err(storage_err)?;
        Ok(())
    }

    async fn all_messages(&self) -> Result<Vec<(PathBuf, MessageRecord)>, LedgerError> {
        let mut out = Vec::new();
        let dir = self.root.join("messages");
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(storage_err(e)),
        };
        while let Some(entry) = entries.next_entry().await.map_err(storage_err)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json")
                && let Some(record) = self.read_json::<MessageRecord>(&path).await?
            {
                out.push((path, record));
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl RunStore for FileLedger {
    async fn create_run(&self, record: RunRecord) -> Result<(), LedgerError> {
        let _guard = self.write_lock.lock().await;
        let path = self.run_path(&record.run_id);
        if tokio::fs::try_exists(&path).await.map_err(storage_err)? {
            return Err(LedgerError::Duplicate {
                key: record.run_id,
            });
        }
        self.write_json(&path, &record).await
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
        let _guard = self.write_lock.lock().await;
        let path = self.run_path(run_id);
        let mut run: RunRecord =
            self.read_json(&path)
                .await?
                .ok_or_else(|| LedgerError::NotFound {
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
        self.write_json(&path, &run).await
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>, LedgerError> {
        self.read_json(&self.run_path(run_id)).await
    }

    async fn find_run_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<RunRecord>, LedgerError> {
        let dir = self.root.join("runs");
        let mut best: Option<RunRecord> = None;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_err(e)),
        };
        while let Some(entry) = entries.next_entry().await.map_err(storage_err)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(run) = self.read_json::<RunRecord>(&path).await?
                && run.message_id == message_id
                && best
                    .as_ref()
                    .is_none_or(|b| run.started_at > b.started_at)
            {
                best = Some(run);
            }
        }
        Ok(best)
    }
}

#[async_trait]
impl IdempotencyLedger for FileLedger {
    async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>, LedgerError> {
        self.read_json(&self.idempotency_path(key)).await
    }

    async fn upsert(&self, record: IdempotencyRecord) -> Result<IdempotencyRecord, LedgerError> {
        let _guard = self.write_lock.lock().await;
        let path = self.idempotency_path(&record.idempotency_key);
        let merged = merge_upsert(self.read_json(&path).await?, record);
        self.write_json(&path, &merged).await?;
        Ok(merged)
    }
}

#[async_trait]
impl MessageLedger for FileLedger {
    async fn find_message(
        &self,
        channel: Channel,
        message_id: &str,
    ) -> Result<Option<MessageRecord>, LedgerError> {
        let canonical = normalize_message_id(message_id);
        self.read_json(&self.message_path(channel, &canonical)).await
    }

    async fn insert_message(&self, mut record: MessageRecord) -> Result<(), LedgerError> {
        record.message_id = normalize_message_id(&record.message_id);
        let _guard = self.write_lock.lock().await;
        let path = self.message_path(record.channel, &record.message_id);
        if tokio::fs::try_exists(&path).await.map_err(storage_err)? {
            return Err(LedgerError::Duplicate {
                key: format!("{}:{}", record.channel, record.message_id),
            });
        }
        self.write_json(&path, &record).await
    }

    async fn mark_processed(&self, record_id: &str) -> Result<(), LedgerError> {
        let _guard = self.write_lock.lock().await;
        for (path, mut record) in self.all_messages().await? {
            if record.record_id == record_id {
                record.processed = true;
                record.processed_at = Some(now_iso());
                return self.write_json(&path, &record).await;
            }
        }
        Err(LedgerError::NotFound {
            key: record_id.to_string(),
        })
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
        let _guard = self.write_lock.lock().await;
        self.append_jsonl(&self.root.join("attachments.jsonl"), &record)
            .await?;
        Ok(record)
    }
}

#[async_trait]
impl AuditLog for FileLedger {
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
        let _guard = self.write_lock.lock().await;
        self.append_jsonl(&self.audit_path(run_id), &record).await?;
        Ok(record)
    }

    async fn events_for_run(&self, run_id: &str) -> Result<Vec<AuditEventRecord>, LedgerError> {
        let path = self.audit_path(run_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_err(e)),
        };
        let mut out = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            out.push(serde_json::from_str(line).map_err(storage_err)?);
        }
        Ok(out)
    }
}
