// SPDX-License-Identifier: MIT OR Apache-2.0
//! The channel-adapter seam.

use async_trait::async_trait;
use ino_core::{Channel, InboundMessage};

/// Adapter failures.
///
/// `Auth` means the credentials are bad and retrying is pointless;
/// `Client` covers transient transport problems where the message stays
/// unconsumed and the next poll retries.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Credential or token-exchange failure.
    #[error("channel auth error: {0}")]
    Auth(String),
    /// Transient transport or provider failure.
    #[error("channel client error: {0}")]
    Client(String),
}

/// A polling adapter over one communication channel.
///
/// Implementations normalize provider-native messages: bare lowercase
/// addresses, angle brackets stripped from message ids, `received_at` as
/// ISO-8601 with an explicit offset, and attachments fetched (and hashed)
/// at fetch time.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// The canonical channel this adapter feeds.
    fn channel_type(&self) -> Channel;

    /// Channel name used for configuration and logging.
    fn name(&self) -> &str;

    /// Establish (or refresh) the provider connection.
    async fn connect(&self) -> Result<(), AdapterError>;

    /// Tear down the provider connection.
    async fn disconnect(&self) -> Result<(), AdapterError>;

    /// Provider-native ids of messages not yet consumed.
    async fn poll_new_message_ids(&self) -> Result<Vec<String>, AdapterError>;

    /// Fetch and normalize one message, downloading attachments.
    async fn fetch_message(&self, external_uid: &str) -> Result<InboundMessage, AdapterError>;

    /// Mark the provider-side message as read/processed, where supported.
    async fn mark_processed(&self, external_uid: &str) -> Result<(), AdapterError>;

    /// Whitelist check; an empty whitelist allows every sender.
    fn is_sender_allowed(&self, sender_id: &str) -> bool;
}

/// Shared whitelist semantics: empty list allows all, otherwise the
/// (lowercased, trimmed) sender must be listed.
#[must_use]
pub fn sender_allowed(allow_from: &[String], sender_id: &str) -> bool {
    if allow_from.is_empty() {
        return true;
    }
    let needle = sender_id.trim().to_ascii_lowercase();
    allow_from
        .iter()
        .any(|a| a.trim().to_ascii_lowercase() == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_whitelist_allows_all() {
        assert!(sender_allowed(&[], "anyone@example.com"));
    }

    #[test]
    fn whitelist_is_case_insensitive() {
        let list = vec!["Buyer@Example.com".to_string()];
        assert!(sender_allowed(&list, "buyer@example.com"));
        assert!(sender_allowed(&list, " BUYER@EXAMPLE.COM "));
        assert!(!sender_allowed(&list, "other@example.com"));
    }
}
