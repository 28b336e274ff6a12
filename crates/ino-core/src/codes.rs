// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error codes attached to [`ErrorInfo`](crate::ErrorInfo) entries and
//! admin-surface failure responses.
//!
//! Codes are plain strings so they survive persistence and cross the HTTP
//! boundary unchanged.

// ── Input / validation ──────────────────────────────────────────────

/// Sender email has no matching contact in master data.
pub const CONTACT_NOT_FOUND: &str = "CONTACT_NOT_FOUND";
/// The message carries no contract signal (keyword / PDF policy).
pub const NOT_CONTRACT_MAIL: &str = "NOT_CONTRACT_MAIL";
/// No PDF attachment was found on a contract mail.
pub const PDF_NOT_FOUND: &str = "PDF_NOT_FOUND";
/// More than one PDF attachment; a human must select one.
pub const MULTI_PDF_ATTACHMENTS: &str = "MULTI_PDF_ATTACHMENTS";
/// Customer match score fell below the acceptance threshold.
pub const CUSTOMER_MATCH_LOW_SCORE: &str = "CUSTOMER_MATCH_LOW_SCORE";
/// Several customers matched with indistinguishable scores.
pub const MULTI_CUSTOMER_AMBIGUOUS: &str = "MULTI_CUSTOMER_AMBIGUOUS";
/// The selected contact does not belong to the selected customer.
pub const CUSTOMER_CONTACT_MISMATCH: &str = "CUSTOMER_CONTACT_MISMATCH";
/// A manual-review decision failed shape validation.
pub const INVALID_DECISION: &str = "INVALID_DECISION";

// ── Authorization ───────────────────────────────────────────────────

/// Caller lacks the tenant or scope required for the operation.
pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
/// The run exists but is not paused in manual review.
pub const RUN_NOT_IN_MANUAL_REVIEW: &str = "RUN_NOT_IN_MANUAL_REVIEW";
/// No run with the given id.
pub const RUN_NOT_FOUND: &str = "RUN_NOT_FOUND";

// ── External services ───────────────────────────────────────────────

/// Blob-store upload failed.
pub const FILE_UPLOAD_FAILED: &str = "FILE_UPLOAD_FAILED";
/// Contract-recognition chat-flow failed or returned `ok = false`.
pub const DIFY_CONTRACT_FAILED: &str = "DIFY_CONTRACT_FAILED";
/// Order-payload chat-flow refused to produce a payload.
pub const DIFY_ORDER_PAYLOAD_BLOCKED: &str = "DIFY_ORDER_PAYLOAD_BLOCKED";
/// ERP rejected the credentials (HTTP 401); never retried.
pub const ERP_AUTH_FAILED: &str = "ERP_AUTH_FAILED";
/// ERP was unreachable (network error / 5xx after retries).
pub const ERP_CONNECTION_FAILED: &str = "ERP_CONNECTION_FAILED";
/// ERP answered 2xx but the body was missing required fields.
pub const ERP_INVALID_RESPONSE: &str = "ERP_INVALID_RESPONSE";
/// ERP refused the order (other 4xx); never retried.
pub const ERP_CREATE_FAILED: &str = "ERP_CREATE_FAILED";

// ── Data ────────────────────────────────────────────────────────────

/// Master data could not be loaded or failed validation.
pub const MASTERDATA_INVALID: &str = "MASTERDATA_INVALID";
/// A storage backend failed.
pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
/// A uniqueness constraint was violated.
pub const DUPLICATE_ENTRY: &str = "DUPLICATE_ENTRY";

// ── Resume ──────────────────────────────────────────────────────────

/// The requested resume node is not on the whitelist.
pub const INVALID_RESUME_NODE: &str = "INVALID_RESUME_NODE";
/// No checkpointed state exists for the run.
pub const STATE_NOT_FOUND: &str = "STATE_NOT_FOUND";
/// Re-entering the graph after a decision failed.
pub const RESUME_FAILED: &str = "RESUME_FAILED";
