// SPDX-License-Identifier: MIT OR Apache-2.0
//! Webhook-driven inbound channel.
//!
//! Messages are pushed by the HTTP surface and drained by the scheduler
//! like any polled channel; this keeps ledger de-dup and whitelist
//! behaviour identical across channels.

use crate::adapter::sender_allowed;
use crate::{AdapterError, ChannelAdapter};
use async_trait::async_trait;
use ino_core::{Channel, InboundMessage};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-process queue-backed adapter for webhook deliveries.
#[derive(Default)]
pub struct WebhookAdapter {
    pending: Mutex<HashMap<String, InboundMessage>>,
    allow_from: Vec<String>,
}

impl WebhookAdapter {
    /// Create an adapter with the given whitelist.
    #[must_use]
    pub fn new(allow_from: Vec<String>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            allow_from,
        }
    }

    /// Enqueue a delivered message for the next sweep.
    pub fn push(&self, mut message: InboundMessage) {
        message.channel = Channel::Webhook;
        if message.external_uid.is_empty() {
            message.external_uid = message.message_id.clone();
        }
        let mut guard = self.pending.lock().expect("webhook queue lock poisoned");
        guard.insert(message.external_uid.clone(), message);
    }

    /// Number of messages waiting for the next sweep.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("webhook queue lock poisoned").len()
    }
}

#[async_trait]
impl ChannelAdapter for WebhookAdapter {
    fn channel_type(&self) -> Channel {
        Channel::Webhook
    }

    fn name(&self) -> &str {
        "webhook"
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn poll_new_message_ids(&self) -> Result<Vec<String>, AdapterError> {
        let guard = self.pending.lock().expect("webhook queue lock poisoned");
        let mut ids: Vec<String> = guard.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn fetch_message(&self, external_uid: &str) -> Result<InboundMessage, AdapterError> {
        let guard = self.pending.lock().expect("webhook queue lock poisoned");
        guard
            .get(external_uid)
            .cloned()
            .ok_or_else(|| AdapterError::Client(format!("unknown webhook uid: {external_uid}")))
    }

    async fn mark_processed(&self, external_uid: &str) -> Result<(), AdapterError> {
        let mut guard = self.pending.lock().expect("webhook queue lock poisoned");
        guard.remove(external_uid);
        Ok(())
    }

    fn is_sender_allowed(&self, sender_id: &str) -> bool {
        sender_allowed(&self.allow_from, sender_id)
    }
}
