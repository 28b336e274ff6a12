// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stored record shapes.

use ino_core::{Channel, ErrorInfo, Status};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One orchestration run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identifier.
    pub run_id: String,
    /// Message the run processed.
    pub message_id: String,
    /// Current status.
    pub status: Status,
    /// Start timestamp.
    pub started_at: String,
    /// Finish timestamp, once terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    /// Redacted state snapshot written at finalize.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_json: Option<Value>,
    /// Accumulated errors.
    #[serde(default)]
    pub errors: Vec<ErrorInfo>,
    /// Accumulated warnings.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// One idempotency-ledger entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Content-addressed key (primary).
    pub idempotency_key: String,
    /// Message that produced the key.
    pub message_id: String,
    /// File hash component, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_sha256: Option<String>,
    /// Customer component, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    /// Record status; `SUCCESS` rows are immutable in their terminal fields.
    pub status: Status,
    /// ERP sales-order number on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_order_no: Option<String>,
    /// ERP order URL on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_url: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
}

/// One ingested message (at-most-once dispatch guard).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Record identifier.
    pub record_id: String,
    /// Source channel.
    pub channel: Channel,
    /// Normalized message id; unique together with `channel`.
    pub message_id: String,
    /// Account the message arrived on.
    pub account: String,
    /// Provider-native identifier.
    pub external_uid: String,
    /// Sender identifier.
    pub sender_id: String,
    /// Receive timestamp from the channel, when parseable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<String>,
    /// Whether orchestration completed for this message.
    pub processed: bool,
    /// When processing completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<String>,
    /// Record creation timestamp.
    pub created_at: String,
}

/// One attachment persisted to the blob store at ingestion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttachmentFileRecord {
    /// Record identifier.
    pub id: String,
    /// Owning message id.
    pub message_id: String,
    /// Relative blob path (`{message_id}/{filename}`).
    pub file_path: String,
    /// Record creation timestamp.
    pub created_at: String,
}

/// One append-only audit event (payload stored redacted).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEventRecord {
    /// Event identifier.
    pub id: String,
    /// Run the event belongs to.
    pub run_id: String,
    /// Step or protocol action that produced the event.
    pub step: String,
    /// Redacted payload.
    pub payload: Value,
    /// Creation timestamp.
    pub created_at: String,
}
