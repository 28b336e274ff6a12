// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonical channel-agnostic inbound message and attachment types.

use serde::{Deserialize, Serialize};

/// Maximum accepted attachment size (50 MiB).
pub const MAX_ATTACHMENT_BYTES: u64 = 50 * 1024 * 1024;

/// Source channel of an inbound message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Mailbox-based channels (IMAP-style or vendor REST mailboxes).
    #[default]
    Email,
    /// Instant-messaging channels.
    Im,
    /// Webhook-delivered inbound messages.
    Webhook,
}

impl Channel {
    /// Canonical lowercase name used in ledger keys and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Im => "im",
            Self::Webhook => "webhook",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single attachment on an inbound message.
///
/// The payload is carried either inline (base64) or as a blob-store path;
/// adapters fetch bytes lazily and hash them at fetch time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Identifier stable within the owning message.
    pub attachment_id: String,
    /// Original filename.
    pub filename: String,
    /// MIME content type.
    pub content_type: String,
    /// Payload size in bytes.
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 of the payload, when computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Inline payload, base64-encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_b64: Option<String>,
    /// Blob-store path when the payload was persisted at ingestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_path: Option<String>,
}

/// Validation failures for inbound messages and attachments.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// An attachment exceeds [`MAX_ATTACHMENT_BYTES`].
    #[error("attachment '{filename}' exceeds {MAX_ATTACHMENT_BYTES} bytes ({size_bytes})")]
    AttachmentTooLarge {
        /// Offending attachment filename.
        filename: String,
        /// Declared size in bytes.
        size_bytes: u64,
    },
    /// A sha256 field is not 64 hex characters.
    #[error("attachment '{filename}' has a malformed sha256")]
    MalformedSha256 {
        /// Offending attachment filename.
        filename: String,
    },
    /// The message id is empty after normalization.
    #[error("message id is empty")]
    EmptyMessageId,
}

impl Attachment {
    /// Returns `true` when the attachment looks like a PDF (by content type
    /// or filename extension).
    #[must_use]
    pub fn is_pdf(&self) -> bool {
        self.content_type == "application/pdf"
            || self.filename.to_ascii_lowercase().ends_with(".pdf")
    }

    /// Decode the inline payload, if present.
    #[must_use]
    pub fn decode_bytes(&self) -> Option<Vec<u8>> {
        use base64::Engine as _;
        let b64 = self.bytes_b64.as_deref()?;
        base64::engine::general_purpose::STANDARD.decode(b64).ok()
    }

    /// Validate size and hash shape.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError`] when the attachment is oversized or the
    /// sha256 is malformed.
    pub fn validate(&self) -> Result<(), MessageError> {
        if self.size_bytes > MAX_ATTACHMENT_BYTES {
            return Err(MessageError::AttachmentTooLarge {
                filename: self.filename.clone(),
                size_bytes: self.size_bytes,
            });
        }
        if let Some(sha) = &self.sha256
            && (sha.len() != 64 || !sha.bytes().all(|b| b.is_ascii_hexdigit()))
        {
            return Err(MessageError::MalformedSha256 {
                filename: self.filename.clone(),
            });
        }
        Ok(())
    }
}

/// Canonical inbound message produced by channel adapters.
///
/// `(channel, message_id)` uniquely identifies a message within the
/// ingestion ledger; the message is consumed at most once by the scheduler.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Source channel.
    pub channel: Channel,
    /// Provider name (free-form, e.g. `"restmail"`).
    pub provider: String,
    /// Provider-side account the message arrived on.
    pub account: String,
    /// Provider-native identifier, stable enough for de-duplication.
    pub external_uid: String,
    /// RFC 5322-like message id with angle brackets stripped.
    pub message_id: String,
    /// Sender identifier (bare lowercase address for mail channels).
    pub sender_id: String,
    /// Recipient addresses.
    #[serde(default)]
    pub recipients: Vec<String>,
    /// CC addresses.
    #[serde(default)]
    pub cc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body_text: String,
    /// HTML body, when the provider supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    /// Receive timestamp, ISO-8601 with explicit offset.
    pub received_at: String,
    /// Attachments, fetched lazily by the adapter.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl InboundMessage {
    /// Normalize identifier and address fields in place and return `self`.
    ///
    /// Strips angle brackets from the message id and lowercases/trims the
    /// sender and recipient addresses. Idempotent.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.message_id = normalize_message_id(&self.message_id);
        self.sender_id = normalize_address(&self.sender_id);
        for addr in self.recipients.iter_mut().chain(self.cc.iter_mut()) {
            *addr = normalize_address(addr);
        }
        self
    }

    /// Validate the message and every attachment.
    ///
    /// # Errors
    ///
    /// Returns the first [`MessageError`] encountered.
    pub fn validate(&self) -> Result<(), MessageError> {
        if self.message_id.trim().is_empty() {
            return Err(MessageError::EmptyMessageId);
        }
        for att in &self.attachments {
            att.validate()?;
        }
        Ok(())
    }

    /// All PDF attachments on the message.
    #[must_use]
    pub fn pdf_attachments(&self) -> Vec<&Attachment> {
        self.attachments.iter().filter(|a| a.is_pdf()).collect()
    }
}

/// Strip surrounding angle brackets and whitespace from an RFC 5322
/// `Message-ID`. Idempotent.
#[must_use]
pub fn normalize_message_id(message_id: &str) -> String {
    let s = message_id.trim();
    if s.len() >= 2 && s.starts_with('<') && s.ends_with('>') {
        s[1..s.len() - 1].trim().to_string()
    } else {
        s.to_string()
    }
}

/// Lowercase and trim a sender/recipient address.
#[must_use]
pub fn normalize_address(addr: &str) -> String {
    addr.trim().to_ascii_lowercase()
}
