// SPDX-License-Identifier: MIT OR Apache-2.0
//! The ingestion scheduler: one cooperative polling loop per channel.
//!
//! Each sweep polls the adapter, de-duplicates against the message
//! ledger, persists attachments under `{message_id}/{filename}`, and
//! hands contract-bearing messages to the orchestration handler. A failed
//! hand-off leaves the ledger entry unprocessed so the next sweep
//! retries; channels poll independently but messages within a channel are
//! processed sequentially to preserve per-account ordering.

use crate::ChannelAdapter;
use async_trait::async_trait;
use ino_clients::LocalBlobStore;
use ino_core::{InboundMessage, now_iso};
use ino_ledger::{MessageLedger, MessageRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Downstream consumer of canonical messages (the orchestration graph).
#[async_trait]
pub trait InboundHandler: Send + Sync {
    /// Process one message; `Ok` marks the ledger entry processed.
    async fn handle(&self, message: InboundMessage) -> anyhow::Result<()>;
}

/// Outcome of one channel sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Messages handed to the orchestration graph.
    pub dispatched: usize,
    /// Messages skipped (duplicates, whitelist, no attachments).
    pub skipped: usize,
    /// Messages that failed and will be retried next sweep.
    pub failed: usize,
}

/// Periodic poller over a set of channel adapters.
pub struct ListenerScheduler {
    adapters: Vec<Arc<dyn ChannelAdapter>>,
    ledger: Arc<dyn MessageLedger>,
    artifacts: LocalBlobStore,
    handler: Arc<dyn InboundHandler>,
    poll_interval: Duration,
    shutdown: Arc<Notify>,
}

impl ListenerScheduler {
    /// Create a scheduler over the given adapters.
    #[must_use]
    pub fn new(
        adapters: Vec<Arc<dyn ChannelAdapter>>,
        ledger: Arc<dyn MessageLedger>,
        artifacts: LocalBlobStore,
        handler: Arc<dyn InboundHandler>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            adapters,
            ledger,
            artifacts,
            handler,
            poll_interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Stop all polling loops after their current sweep.
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    /// Spawn one polling loop per channel.
    #[must_use]
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        self.adapters
            .iter()
            .cloned()
            .map(|adapter| {
                let scheduler = self.clone();
                tokio::spawn(async move {
                    info!(
                        target: "ino.listener",
                        channel = adapter.name(),
                        interval_secs = scheduler.poll_interval.as_secs(),
                        "listener started"
                    );
                    loop {
                        let _ = scheduler.sweep_adapter(adapter.as_ref()).await;
                        tokio::select! {
                            () = tokio::time::sleep(scheduler.poll_interval) => {}
                            () = scheduler.shutdown.notified() => {
                                info!(target: "ino.listener", channel = adapter.name(), "listener stopped");
                                return;
                            }
                        }
                    }
                })
            })
            .collect()
    }

    /// Sweep every channel once (admin trigger).
    pub async fn sweep_all(&self) -> SweepReport {
        let mut total = SweepReport::default();
        for adapter in &self.adapters {
            let report = self.sweep_adapter(adapter.as_ref()).await;
            total.dispatched += report.dispatched;
            total.skipped += report.skipped;
            total.failed += report.failed;
        }
        total
    }

    /// Sweep one channel: poll, de-dup, persist, hand off.
    pub async fn sweep_adapter(&self, adapter: &dyn ChannelAdapter) -> SweepReport {
        let channel = adapter.name();
        let mut report = SweepReport::default();

        if let Err(e) = adapter.connect().await {
            error!(target: "ino.listener", channel, error = %e, "connect failed");
            return report;
        }

        let ids = match adapter.poll_new_message_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!(target: "ino.listener", channel, error = %e, "poll failed");
                let _ = adapter.disconnect().await;
                return report;
            }
        };
        debug!(target: "ino.listener", channel, count = ids.len(), "poll complete");

        for external_uid in ids {
            match self.ingest_one(adapter, &external_uid).await {
                Ok(IngestOutcome::Dispatched) => report.dispatched += 1,
                Ok(IngestOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(
                        target: "ino.listener",
                        channel,
                        external_uid = %external_uid,
                        error = %e,
                        "message ingestion failed, will retry next sweep"
                    );
                }
            }
        }

        let _ = adapter.disconnect().await;
        report
    }

    async fn ingest_one(
        &self,
        adapter: &dyn ChannelAdapter,
        external_uid: &str,
    ) -> anyhow::Result<IngestOutcome> {
        let channel = adapter.name();
        let mut message = adapter.fetch_message(external_uid).await?.normalized();
        message.validate()?;

        if !adapter.is_sender_allowed(&message.sender_id) {
            warn!(
                target: "ino.listener",
                channel,
                message_id = %message.message_id,
                sender = %message.sender_id,
                "sender not allowed, skipping"
            );
            return Ok(IngestOutcome::Skipped);
        }

        // At-most-once dispatch: one ledger row per (channel, message id).
        let existing = self
            .ledger
            .find_message(message.channel, &message.message_id)
            .await?;
        let record_id = match existing {
            Some(record) if record.processed => {
                debug!(
                    target: "ino.listener",
                    channel,
                    message_id = %message.message_id,
                    "already processed, skipping"
                );
                return Ok(IngestOutcome::Skipped);
            }
            Some(record) => record.record_id,
            None => {
                let record_id = Uuid::new_v4().to_string();
                self.ledger
                    .insert_message(MessageRecord {
                        record_id: record_id.clone(),
                        channel: message.channel,
                        message_id: message.message_id.clone(),
                        account: message.account.clone(),
                        external_uid: message.external_uid.clone(),
                        sender_id: message.sender_id.clone(),
                        received_at: Some(message.received_at.clone()),
                        processed: false,
                        processed_at: None,
                        created_at: now_iso(),
                    })
                    .await?;
                record_id
            }
        };

        // Persist attachment payloads before hand-off; the graph reads
        // them back by blob path when inline bytes are dropped.
        for attachment in &mut message.attachments {
            if let Some(bytes) = attachment.decode_bytes() {
                let path = self
                    .artifacts
                    .save(&bytes, &message.message_id, &attachment.filename)
                    .await?;
                self.ledger
                    .record_attachment(&message.message_id, &path)
                    .await?;
                attachment.blob_path = Some(path);
            }
        }

        // Contract runs require an artifact; attachment-less messages are
        // recorded and ignored.
        if message.attachments.is_empty() {
            debug!(
                target: "ino.listener",
                channel,
                message_id = %message.message_id,
                "no attachments, marking ignored"
            );
            self.ledger.mark_processed(&record_id).await?;
            let _ = adapter.mark_processed(external_uid).await;
            return Ok(IngestOutcome::Skipped);
        }

        let message_id = message.message_id.clone();
        self.handler.handle(message).await?;

        self.ledger.mark_processed(&record_id).await?;
        if let Err(e) = adapter.mark_processed(external_uid).await {
            warn!(
                target: "ino.listener",
                channel,
                message_id = %message_id,
                error = %e,
                "provider-side mark-as-read failed"
            );
        }
        Ok(IngestOutcome::Dispatched)
    }
}

enum IngestOutcome {
    Dispatched,
    Skipped,
}
