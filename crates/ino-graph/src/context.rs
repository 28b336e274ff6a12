// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared dependencies handed to every node.

use ino_checkpoint::CheckpointStore;
use ino_clients::{BlobClient, ErpClient, LlmClient, LocalBlobStore, Notifier};
use ino_config::AppConfig;
use ino_ledger::{AuditLog, IdempotencyLedger, RunStore};
use ino_masterdata::MasterDataCache;
use ino_retry::RetryConfig;
use ino_telemetry::StepMetrics;
use std::sync::Arc;
use std::time::Duration;

/// Everything a node may touch: configuration, stores, and external
/// clients. One context is built at startup and shared across runs; nodes
/// receive it by reference and never hold state of their own.
pub struct GraphContext {
    /// Runtime configuration.
    pub config: Arc<AppConfig>,
    /// Checkpoint store (step-boundary persistence).
    pub checkpoint: Arc<dyn CheckpointStore>,
    /// Run records.
    pub runs: Arc<dyn RunStore>,
    /// Idempotency ledger.
    pub idempotency: Arc<dyn IdempotencyLedger>,
    /// Append-only audit log.
    pub audit: Arc<dyn AuditLog>,
    /// Master-data snapshot cache.
    pub masterdata: Arc<MasterDataCache>,
    /// Contract-recognition chat-flow client.
    pub llm_contract: LlmClient,
    /// Order-payload chat-flow client.
    pub llm_order: LlmClient,
    /// ERP gateway client.
    pub erp: ErpClient,
    /// Remote blob-store client.
    pub blob: BlobClient,
    /// Local artifact store.
    pub artifacts: LocalBlobStore,
    /// Salesperson notifier.
    pub notifier: Arc<dyn Notifier>,
    /// Per-step metrics collector.
    pub metrics: StepMetrics,
    /// Retry policy for transient node-level failures.
    pub retry: RetryConfig,
}

impl GraphContext {
    /// The configured per-step timeout.
    #[must_use]
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.config.step_timeout_seconds)
    }

    /// The tenant runs are recorded under, when configured.
    #[must_use]
    pub fn tenant_id(&self) -> Option<String> {
        let tenant = self.config.erp.tenant_id.trim();
        if tenant.is_empty() {
            None
        } else {
            Some(tenant.to_string())
        }
    }
}
