// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dependency wiring: configuration to a live graph context, scheduler,
//! and services.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use ino_checkpoint::{
    CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, checkpoint_dir,
};
use ino_clients::{
    BlobClient, ErpClient, HttpMailer, LlmClient, LocalBlobStore, Notifier, NullNotifier,
};
use ino_config::{AppConfig, CheckpointBackend};
use ino_core::InboundMessage;
use ino_graph::{GraphContext, OrchestrationService};
use ino_ledger::{FileLedger, MemoryLedger, MessageLedger};
use ino_listener::{
    ChannelAdapter, InboundHandler, ListenerScheduler, RestMailboxAdapter, WebhookAdapter,
};
use ino_masterdata::{
    HttpMasterDataProvider, MasterDataCache, MasterDataProvider, StaticMasterDataProvider,
};
use ino_retry::RetryConfig;
use ino_telemetry::StepMetrics;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Build the shared graph context plus the ingestion message ledger.
///
/// Store backends follow `checkpoint_backend`; the same selector governs
/// the business ledgers so a durable deployment persists everything under
/// `durable_dir`.
///
/// # Errors
///
/// Returns an error when a durable store cannot be initialized.
pub async fn build_context(
    config: Arc<AppConfig>,
) -> Result<(Arc<GraphContext>, Arc<dyn MessageLedger>)> {
    let http = reqwest::Client::new();

    let checkpoint: Arc<dyn CheckpointStore> = match config.checkpoint_backend {
        CheckpointBackend::Memory => Arc::new(MemoryCheckpointStore::new()),
        CheckpointBackend::Durable => Arc::new(FileCheckpointStore::new(checkpoint_dir(
            Path::new(&config.durable_dir),
        ))),
    };
    checkpoint
        .initialize()
        .await
        .context("initialize checkpoint store")?;

    let runs: Arc<dyn ino_ledger::RunStore>;
    let idempotency: Arc<dyn ino_ledger::IdempotencyLedger>;
    let audit: Arc<dyn ino_ledger::AuditLog>;
    let messages: Arc<dyn MessageLedger>;
    match config.checkpoint_backend {
        CheckpointBackend::Memory => {
            let ledger = Arc::new(MemoryLedger::new());
            runs = ledger.clone();
            idempotency = ledger.clone();
            audit = ledger.clone();
            messages = ledger;
        }
        CheckpointBackend::Durable => {
            let ledger = Arc::new(FileLedger::new(
                Path::new(&config.durable_dir).join("ledger"),
            ));
            ledger.initialize().await.context("initialize ledger")?;
            runs = ledger.clone();
            idempotency = ledger.clone();
            audit = ledger.clone();
            messages = ledger;
        }
    }

    let provider: Arc<dyn MasterDataProvider> = if config.masterdata.base_url.is_empty() {
        info!(target: "ino.daemon", "masterdata url unset, serving an empty static snapshot");
        Arc::new(StaticMasterDataProvider::default())
    } else {
        Arc::new(HttpMasterDataProvider::new(
            http.clone(),
            config.masterdata.base_url.clone(),
            config.masterdata.api_key.clone(),
        ))
    };
    let masterdata = Arc::new(MasterDataCache::new(
        provider,
        Duration::from_secs(config.masterdata.cache_ttl_seconds),
    ));

    let notifier: Arc<dyn Notifier> = if config.mail.base_url.is_empty() {
        Arc::new(NullNotifier)
    } else {
        Arc::new(HttpMailer::new(
            http.clone(),
            config.mail.base_url.clone(),
            config.mail.api_key.clone(),
            config.mail.sender.clone(),
        ))
    };

    let ctx = GraphContext {
        llm_contract: LlmClient::new(
            http.clone(),
            config.llm.contract_url.clone(),
            config.llm.contract_key.clone(),
            config.llm.api_path.clone(),
            Duration::from_secs(config.llm.timeout_secs),
        ),
        llm_order: LlmClient::new(
            http.clone(),
            config.llm.order_url.clone(),
            config.llm.order_key.clone(),
            config.llm.api_path.clone(),
            Duration::from_secs(config.llm.timeout_secs),
        ),
        erp: ErpClient::new(
            http.clone(),
            config.erp.base_url.clone(),
            config.erp.api_key.clone(),
            config.erp.tenant_id.clone(),
            Duration::from_secs(config.erp.timeout_secs),
        ),
        blob: BlobClient::new(
            http.clone(),
            config.blob.base_url.clone(),
            config.blob.api_key.clone(),
        ),
        artifacts: LocalBlobStore::new(config.blob.base_dir.clone()),
        checkpoint,
        runs,
        idempotency,
        audit,
        masterdata,
        notifier,
        metrics: StepMetrics::new(),
        retry: RetryConfig::default(),
        config: config.clone(),
    };

    Ok((Arc::new(ctx), messages))
}

/// Adapter from the orchestration service to the listener hand-off seam.
pub struct GraphHandler(pub OrchestrationService);

#[async_trait]
impl InboundHandler for GraphHandler {
    async fn handle(&self, message: InboundMessage) -> anyhow::Result<()> {
        self.0.run_message(message).await?;
        Ok(())
    }
}

/// Build the scheduler over the configured channels, returning it together
/// with the webhook ingress adapter.
pub fn build_scheduler(
    config: &AppConfig,
    orchestration: OrchestrationService,
    messages: Arc<dyn MessageLedger>,
) -> (Arc<ListenerScheduler>, Arc<WebhookAdapter>) {
    let webhook = Arc::new(WebhookAdapter::new(
        config
            .allow_list("webhook")
            .map(<[String]>::to_vec)
            .unwrap_or_default(),
    ));

    let mut adapters: Vec<Arc<dyn ChannelAdapter>> = Vec::new();
    for channel in &config.enabled_listeners {
        match channel.as_str() {
            "email" if !config.mailbox.base_url.is_empty() => {
                adapters.push(Arc::new(RestMailboxAdapter::new(
                    reqwest::Client::new(),
                    &config.mailbox,
                    config
                        .allow_list("email")
                        .map(<[String]>::to_vec)
                        .unwrap_or_default(),
                )));
            }
            "email" => {
                info!(target: "ino.daemon", "mailbox url unset, email listener disabled");
            }
            "webhook" => adapters.push(webhook.clone()),
            other => {
                info!(target: "ino.daemon", channel = other, "unknown listener channel ignored");
            }
        }
    }

    let scheduler = Arc::new(ListenerScheduler::new(
        adapters,
        messages,
        LocalBlobStore::new(config.blob.base_dir.clone()),
        Arc::new(GraphHandler(orchestration)),
        Duration::from_secs(config.poll_interval_seconds),
    ));
    (scheduler, webhook)
}
