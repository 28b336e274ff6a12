// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-run checkpoint persistence.
//!
//! The orchestration engine writes the full run state at every step
//! boundary; a paused run (manual review) is reloaded from here, possibly
//! after a process restart. The graph compiles against [`CheckpointStore`]
//! only; backend selection is a configuration concern.
//!
//! Guarantees:
//! - a step write is atomic with respect to concurrent readers (the file
//!   backend writes to a temp file and renames into place);
//! - runs on different `run_id`s never interfere;
//! - entries for runs paused in manual review are never evicted.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ino_core::{RunState, Status, now_iso};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Errors from checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Underlying storage failed.
    #[error("checkpoint storage error: {0}")]
    Storage(String),
    /// A stored snapshot could not be decoded.
    #[error("checkpoint decode error for run {run_id}: {reason}")]
    Decode {
        /// Run whose snapshot is corrupt.
        run_id: String,
        /// Decode failure detail.
        reason: String,
    },
}

/// One checkpointed step state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepCheckpoint {
    /// Node that produced this state.
    pub step: String,
    /// When the checkpoint was written.
    pub saved_at: String,
    /// The state after the step.
    pub state: RunState,
}

/// Stored record: latest state plus the per-step history.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct CheckpointRecord {
    run_id: String,
    latest: StepCheckpoint,
    history: Vec<StepCheckpoint>,
}

/// Abstract checkpoint store.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Prepare the backend (create directories, open handles).
    async fn initialize(&self) -> Result<(), CheckpointError>;

    /// Persist the state after `step` for `run_id`, appending to the
    /// step history.
    async fn save(&self, run_id: &str, step: &str, state: &RunState)
    -> Result<(), CheckpointError>;

    /// Load the latest state for `run_id`.
    async fn load(&self, run_id: &str) -> Result<Option<RunState>, CheckpointError>;

    /// Replace the latest state without recording a step (used by the
    /// manual-review patch).
    async fn update(&self, run_id: &str, state: &RunState) -> Result<(), CheckpointError>;

    /// The per-step history for `run_id`, oldest first.
    async fn stream_resume(&self, run_id: &str) -> Result<Vec<StepCheckpoint>, CheckpointError>;

    /// Remove entries finalized before `cutoff`. Runs paused in manual
    /// review are exempt. Returns the number of pruned entries.
    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize, CheckpointError>;

    /// Health probe: `true` when the backend can currently accept writes.
    async fn healthy(&self) -> bool;

    /// Release backend resources.
    async fn close(&self) -> Result<(), CheckpointError>;
}

fn is_prunable(record: &CheckpointRecord, cutoff: DateTime<Utc>) -> bool {
    let state = &record.latest.state;
    if state.final_status == Some(Status::ManualReview) {
        return false;
    }
    if state.final_status.is_none() {
        return false;
    }
    match DateTime::parse_from_rfc3339(&record.latest.saved_at) {
        Ok(saved) => saved.with_timezone(&Utc) < cutoff,
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Memory backend
// ---------------------------------------------------------------------------

/// In-process checkpoint store for tests and single-process dev.
#[derive(Debug, Default, Clone)]
pub struct MemoryCheckpointStore {
    inner: Arc<RwLock<HashMap<String, CheckpointRecord>>>,
}

impl MemoryCheckpointStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn initialize(&self) -> Result<(), CheckpointError> {
        Ok(())
    }

    async fn save(
        &self,
        run_id: &str,
        step: &str,
        state: &RunState,
    ) -> Result<(), CheckpointError> {
        let checkpoint = StepCheckpoint {
            step: step.to_string(),
            saved_at: now_iso(),
            state: state.clone(),
        };
        let mut guard = self.inner.write().await;
        let record = guard
            .entry(run_id.to_string())
            .or_insert_with(|| CheckpointRecord {
                run_id: run_id.to_string(),
                latest: checkpoint.clone(),
                history: Vec::new(),
            });
        record.latest = checkpoint.clone();
        record.history.push(checkpoint);
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<Option<RunState>, CheckpointError> {
        let guard = self.inner.read().await;
        Ok(guard.get(run_id).map(|r| r.latest.state.clone()))
    }

    async fn update(&self, run_id: &str, state: &RunState) -> Result<(), CheckpointError> {
        let mut guard = self.inner.write().await;
        match guard.get_mut(run_id) {
            Some(record) => {
                record.latest = StepCheckpoint {
                    step: record.latest.step.clone(),
                    saved_at: now_iso(),
                    state: state.clone(),
                };
                Ok(())
            }
            None => {
                guard.insert(
                    run_id.to_string(),
                    CheckpointRecord {
                        run_id: run_id.to_string(),
                        latest: StepCheckpoint {
                            step: String::new(),
                            saved_at: now_iso(),
                            state: state.clone(),
                        },
                        history: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn stream_resume(&self, run_id: &str) -> Result<Vec<StepCheckpoint>, CheckpointError> {
        let guard = self.inner.read().await;
        Ok(guard.get(run_id).map(|r| r.history.clone()).unwrap_or_default())
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize, CheckpointError> {
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|_, record| !is_prunable(record, cutoff));
        Ok(before - guard.len())
    }

    async fn healthy(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<(), CheckpointError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// Durable JSON-file-per-run checkpoint store.
///
/// Each run lives at `<root>/<run_id>.json`. Writes go through a temp file
/// and an atomic rename so readers never observe partial states.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    /// Create a store rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, run_id: &str) -> PathBuf {
        // Run ids are UUIDs; reject anything that could escape the root.
        let safe: String = run_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        self.root.join(format!("{safe}.json"))
    }

    async fn read_record(&self, run_id: &str) -> Result<Option<CheckpointRecord>, CheckpointError> {
        let path = self.path_for(run_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CheckpointError::Storage(e.to_string())),
        };
        let record =
            serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Decode {
                run_id: run_id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(record))
    }

    async fn write_record(&self, record: &CheckpointRecord) -> Result<(), CheckpointError> {
        let path = self.path_for(&record.run_id);
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        debug!(target: "ino.checkpoint", run_id = %record.run_id, path = %path.display(), "checkpoint written");
        Ok(())
    }

    async fn list_run_ids(&self) -> Result<Vec<String>, CheckpointError> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(CheckpointError::Storage(e.to_string())),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                out.push(stem.to_string());
            }
        }
        out.sort();
        Ok(out)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn initialize(&self) -> Result<(), CheckpointError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))
    }

    async fn save(
        &self,
        run_id: &str,
        step: &str,
        state: &RunState,
    ) -> Result<(), CheckpointError> {
        let checkpoint = StepCheckpoint {
            step: step.to_string(),
            saved_at: now_iso(),
            state: state.clone(),
        };
        let mut record = self
            .read_record(run_id)
            .await?
            .unwrap_or_else(|| CheckpointRecord {
                run_id: run_id.to_string(),
                latest: checkpoint.clone(),
                history: Vec::new(),
            });
        record.latest = checkpoint.clone();
        record.history.push(checkpoint);
        self.write_record(&record).await
    }

    async fn load(&self, run_id: &str) -> Result<Option<RunState>, CheckpointError> {
        Ok(self.read_record(run_id).await?.map(|r| r.latest.state))
    }

    async fn update(&self, run_id: &str, state: &RunState) -> Result<(), CheckpointError> {
        let mut record = self
            .read_record(run_id)
            .await?
            .unwrap_or_else(|| CheckpointRecord {
                run_id: run_id.to_string(),
                latest: StepCheckpoint {
                    step: String::new(),
                    saved_at: now_iso(),
                    state: state.clone(),
                },
                history: Vec::new(),
            });
        record.latest = StepCheckpoint {
            step: record.latest.step.clone(),
            saved_at: now_iso(),
            state: state.clone(),
        };
        self.write_record(&record).await
    }

    async fn stream_resume(&self, run_id: &str) -> Result<Vec<StepCheckpoint>, CheckpointError> {
        Ok(self
            .read_record(run_id)
            .await?
            .map(|r| r.history)
            .unwrap_or_default())
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize, CheckpointError> {
        let mut pruned = 0;
        for run_id in self.list_run_ids().await? {
            if let Some(record) = self.read_record(&run_id).await?
                && is_prunable(&record, cutoff)
            {
                tokio::fs::remove_file(self.path_for(&run_id))
                    .await
                    .map_err(|e| CheckpointError::Storage(e.to_string()))?;
                pruned += 1;
            }
        }
        Ok(pruned)
    }

    async fn healthy(&self) -> bool {
        let probe = self
            .root
            .join(format!(".health-{}", uuid::Uuid::new_v4()));
        match tokio::fs::write(&probe, b"ok").await {
            Ok(()) => {
                let _ = tokio::fs::remove_file(&probe).await;
                true
            }
            Err(_) => false,
        }
    }

    async fn close(&self) -> Result<(), CheckpointError> {
        Ok(())
    }
}

/// Absolute path of the file backend root for a durable base dir.
#[must_use]
pub fn checkpoint_dir(durable_dir: &Path) -> PathBuf {
    durable_dir.join("checkpoints")
}
