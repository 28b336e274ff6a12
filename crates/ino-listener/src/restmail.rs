// SPDX-License-Identifier: MIT OR Apache-2.0
//! Vendor REST mailbox adapter (OAuth2 client credentials).
//!
//! Polls a folder for unread messages, fetches message bodies and
//! attachment payloads, and normalizes everything into the canonical
//! [`InboundMessage`] shape. Attachment bytes are downloaded and hashed at
//! fetch time; empty payloads are skipped with a warning.

use crate::adapter::sender_allowed;
use crate::{AdapterError, ChannelAdapter, OAuthTokenManager};
use async_trait::async_trait;
use base64::Engine as _;
use chrono::DateTime;
use ino_config::MailboxConfig;
use ino_core::{Attachment, Channel, InboundMessage, sha256_hex};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Transient-request retry cap (initial attempt plus two retries).
const MAX_ATTEMPTS: u32 = 3;

/// REST mailbox adapter.
pub struct RestMailboxAdapter {
    client: reqwest::Client,
    base_url: String,
    account: String,
    folder_id: String,
    poll_size: u32,
    oauth: OAuthTokenManager,
    allow_from: Vec<String>,
}

impl RestMailboxAdapter {
    /// Build the adapter from its config section and whitelist.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &MailboxConfig, allow_from: Vec<String>) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let oauth = OAuthTokenManager::new(
            client.clone(),
            format!("{base_url}/oauth2/v2.0/token"),
            config.client_id.clone(),
            config.client_secret.clone(),
        );
        Self {
            client,
            base_url,
            account: config.account.clone(),
            folder_id: config.folder_id.clone(),
            poll_size: config.poll_size,
            oauth,
            allow_from,
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/v2/mailboxes/{}/folders/{}/messages",
            self.base_url, self.account, self.folder_id
        )
    }

    /// Issue a request with token handling: one forced refresh on 401,
    /// up to two retries on transient failures with `2^attempt` seconds of
    /// backoff.
    async fn request_json(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, AdapterError> {
        let mut refreshed = false;
        let mut attempt: u32 = 0;
        loop {
            let token = self.oauth.get_token().await?;
            let mut req = self.client.request(method.clone(), url).bearer_auth(token);
            if let Some(body) = body {
                req = req.json(body);
            }
            match req.send().await {
                Ok(resp) if resp.status().as_u16() == 401 && !refreshed => {
                    debug!(target: "ino.listener", url, "401, refreshing token once");
                    self.oauth.force_refresh().await?;
                    refreshed = true;
                }
                Ok(resp) if resp.status().is_server_error() && attempt + 1 < MAX_ATTEMPTS => {
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                    attempt += 1;
                }
                Ok(resp) => {
                    let status = resp.status();
                    if !status.is_success() {
                        return Err(AdapterError::Client(format!("{url} failed: {status}")));
                    }
                    if status.as_u16() == 204 {
                        return Ok(Value::Null);
                    }
                    return resp
                        .json()
                        .await
                        .map_err(|e| AdapterError::Client(format!("{url} decode: {e}")));
                }
                Err(e) if attempt + 1 < MAX_ATTEMPTS => {
                    warn!(target: "ino.listener", url, error = %e, "transport error, retrying");
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                    attempt += 1;
                }
                Err(e) => return Err(AdapterError::Client(e.to_string())),
            }
        }
    }

    async fn fetch_attachment(
        &self,
        uid: &str,
        meta: &Value,
    ) -> Result<Option<Attachment>, AdapterError> {
        let id = meta.get("id").and_then(Value::as_str).unwrap_or_default();
        let filename = meta
            .get("filename")
            .and_then(Value::as_str)
            .unwrap_or("attachment.bin");
        let content_type = meta
            .get("content_type")
            .and_then(Value::as_str)
            .unwrap_or("application/octet-stream");

        let url = format!("{}/{uid}/attachments/{id}/content", self.messages_url());
        let token = self.oauth.get_token().await?;
        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AdapterError::Client(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AdapterError::Client(format!(
                "attachment fetch failed: {}",
                resp.status()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AdapterError::Client(e.to_string()))?;
        if bytes.is_empty() {
            warn!(target: "ino.listener", uid, filename, "empty attachment payload, skipping");
            return Ok(None);
        }

        Ok(Some(Attachment {
            attachment_id: id.to_string(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            size_bytes: bytes.len() as u64,
            sha256: Some(sha256_hex(&bytes)),
            bytes_b64: Some(base64::engine::general_purpose::STANDARD.encode(&bytes)),
            blob_path: None,
        }))
    }
}

fn addresses(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| {
                    v.get("email")
                        .and_then(Value::as_str)
                        .or_else(|| v.as_str())
                })
                .map(|s| s.trim().to_ascii_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

/// Normalize a provider timestamp to RFC 3339 with an explicit offset.
/// Deterministic: parseable inputs re-serialize with their offset; others
/// pass through unchanged.
fn normalize_received_at(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.to_rfc3339(),
        Err(_) => raw.to_string(),
    }
}

#[async_trait]
impl ChannelAdapter for RestMailboxAdapter {
    fn channel_type(&self) -> Channel {
        Channel::Email
    }

    fn name(&self) -> &str {
        "email"
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        // Stateless HTTP; a valid token is the whole connection.
        self.oauth.get_token().await.map(|_| ())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn poll_new_message_ids(&self) -> Result<Vec<String>, AdapterError> {
        let url = format!("{}?size={}&unread_only=true", self.messages_url(), self.poll_size);
        let body = self.request_json(reqwest::Method::GET, &url, None).await?;
        Ok(body
            .get("messages")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|m| m.get("uid").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_message(&self, external_uid: &str) -> Result<InboundMessage, AdapterError> {
        let url = format!("{}/{external_uid}", self.messages_url());
        let body = self.request_json(reqwest::Method::GET, &url, None).await?;

        let mut attachments = Vec::new();
        if let Some(metas) = body.get("attachments").and_then(Value::as_array) {
            for meta in metas {
                if let Some(att) = self.fetch_attachment(external_uid, meta).await? {
                    attachments.push(att);
                }
            }
        }

        let message = InboundMessage {
            channel: Channel::Email,
            provider: "restmail".into(),
            account: self.account.clone(),
            external_uid: external_uid.to_string(),
            message_id: body
                .get("message_id")
                .and_then(Value::as_str)
                .unwrap_or(external_uid)
                .to_string(),
            sender_id: body
                .pointer("/from/email")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            recipients: addresses(body.get("to")),
            cc: addresses(body.get("cc")),
            subject: body
                .get("subject")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            body_text: body
                .get("body_text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            body_html: body
                .get("body_html")
                .and_then(Value::as_str)
                .map(str::to_string),
            received_at: normalize_received_at(
                body.get("received_at")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
            ),
            attachments,
        };

        Ok(message.normalized())
    }

    async fn mark_processed(&self, external_uid: &str) -> Result<(), AdapterError> {
        let url = format!("{}/{external_uid}/read", self.messages_url());
        self.request_json(reqwest::Method::POST, &url, Some(&Value::Null))
            .await
            .map(|_| ())
    }

    fn is_sender_allowed(&self, sender_id: &str) -> bool {
        sender_allowed(&self.allow_from, sender_id)
    }
}
