// SPDX-License-Identifier: MIT OR Apache-2.0
//! The orchestration run state and the delta type nodes return.
//!
//! Nodes never mutate [`RunState`] directly; they return a sparse
//! [`StateDelta`] which the engine merges with keep-first semantics for
//! single-value fields and append semantics for `errors`/`warnings`. This
//! keeps duplicate initialization (caller-set plus first-node-set) from
//! conflicting, and makes every step's effect explicit and checkpointable.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::{
    Attachment, ContactMatchResult, ContractRecognitionResult, ContractSignalResult,
    CustomerMatchResult, ErpCreateOrderResult, ErrorInfo, FileUploadResult, InboundMessage,
    ManualReviewCandidates, MasterDataSnapshot, OrderPayloadResult, Status, now_iso,
};

/// Pause metadata recorded when a run enters manual review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManualReviewInfo {
    /// Why the run paused (first applicable error code).
    pub reason_code: String,
    /// When the pause was recorded.
    pub created_at: String,
    /// Candidates offered to the reviewer.
    pub candidates: ManualReviewCandidates,
    /// The decision, once one has been submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Value>,
}

/// The full orchestration state for one run.
///
/// The master-data snapshot is held in memory behind an `Arc` and referenced
/// across persistence boundaries by `masterdata_version` only; it is
/// re-attached from the cache on resume.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunState {
    /// Run identifier (set by the caller).
    pub run_id: String,
    /// Tenant recorded for the run, when multi-tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// The canonical inbound message (keep-first).
    pub email_event: InboundMessage,
    /// Version of the snapshot the run observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masterdata_version: Option<u64>,
    /// In-memory snapshot handle; never persisted.
    #[serde(skip)]
    pub masterdata: Option<Arc<MasterDataSnapshot>>,
    /// Contact-match step result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_contact: Option<ContactMatchResult>,
    /// Contract-signal step result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_signals: Option<ContractSignalResult>,
    /// Customer-match step result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_customer: Option<CustomerMatchResult>,
    /// Selected PDF attachment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_attachment: Option<Attachment>,
    /// Blob-store upload result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_upload: Option<FileUploadResult>,
    /// Contract-recognition result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_result: Option<ContractRecognitionResult>,
    /// Order-payload result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_payload_result: Option<OrderPayloadResult>,
    /// ERP submission result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub erp_result: Option<ErpCreateOrderResult>,
    /// Idempotency key; initial (message-only) or canonical form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Terminal status, once determined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_status: Option<Status>,
    /// Accumulated errors (append-only).
    #[serde(default)]
    pub errors: Vec<ErrorInfo>,
    /// Accumulated warnings (append-only).
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Manual-review pause metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_review: Option<ManualReviewInfo>,
    /// Run start timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// Run finish timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

/// Sparse update returned by a node.
///
/// Unset fields leave the state untouched. Single-value fields merge with
/// keep-first semantics; `promoted_idempotency_key` is the one sanctioned
/// overwrite (the key is monotonic: it may only be replaced once all three
/// inputs are known).
#[derive(Clone, Debug, Default)]
pub struct StateDelta {
    /// Contact-match result.
    pub matched_contact: Option<ContactMatchResult>,
    /// Contract-signal result.
    pub contract_signals: Option<ContractSignalResult>,
    /// Customer-match result.
    pub matched_customer: Option<CustomerMatchResult>,
    /// Selected PDF.
    pub pdf_attachment: Option<Attachment>,
    /// Upload result.
    pub file_upload: Option<FileUploadResult>,
    /// Contract-recognition result.
    pub contract_result: Option<ContractRecognitionResult>,
    /// Order-payload result.
    pub order_payload_result: Option<OrderPayloadResult>,
    /// ERP result.
    pub erp_result: Option<ErpCreateOrderResult>,
    /// Initial idempotency key (keep-first).
    pub idempotency_key: Option<String>,
    /// Canonical idempotency key (overwrites; see type docs).
    pub promoted_idempotency_key: Option<String>,
    /// Snapshot version observed by the node.
    pub masterdata_version: Option<u64>,
    /// Snapshot handle loaded by the node.
    pub masterdata: Option<Arc<MasterDataSnapshot>>,
    /// Terminal status (keep-first; short-circuit nodes set it).
    pub final_status: Option<Status>,
    /// Finish timestamp.
    pub finished_at: Option<String>,
    /// Manual-review pause metadata (set by finalize).
    pub manual_review: Option<ManualReviewInfo>,
    /// Errors to append.
    pub errors: Vec<ErrorInfo>,
    /// Warnings to append.
    pub warnings: Vec<String>,
}

macro_rules! keep_first {
    ($state:expr, $delta:expr, $($field:ident),+ $(,)?) => {
        $(
            if $state.$field.is_none() {
                $state.$field = $delta.$field;
            }
        )+
    };
}

impl RunState {
    /// Create the initial state for a run.
    #[must_use]
    pub fn new(run_id: impl Into<String>, email_event: InboundMessage) -> Self {
        Self {
            run_id: run_id.into(),
            email_event,
            started_at: Some(now_iso()),
            ..Self::default()
        }
    }

    /// Merge a node's delta into the state.
    ///
    /// Single-value fields follow keep-first; `errors`/`warnings` append;
    /// a promoted idempotency key overwrites the initial one.
    pub fn apply(&mut self, delta: StateDelta) {
        keep_first!(
            self, delta,
            matched_contact,
            contract_signals,
            matched_customer,
            pdf_attachment,
            file_upload,
            contract_result,
            order_payload_result,
            erp_result,
            idempotency_key,
            masterdata_version,
            masterdata,
            final_status,
            finished_at,
            manual_review,
        );
        if let Some(key) = delta.promoted_idempotency_key {
            self.idempotency_key = Some(key);
        }
        self.errors.extend(delta.errors);
        self.warnings.extend(delta.warnings);
    }

    /// The first recorded error code, if any (used to derive the
    /// manual-review reason).
    #[must_use]
    pub fn first_error_code(&self) -> Option<&str> {
        if let Some(e) = self.errors.first() {
            return Some(&e.code);
        }
        if let Some(mc) = &self.matched_customer
            && !mc.ok
            && let Some(e) = mc.errors.first()
        {
            return Some(&e.code);
        }
        if let Some(cs) = &self.contract_signals
            && let Some(e) = cs.errors.first()
        {
            return Some(&e.code);
        }
        None
    }

    /// The resolved customer id, when the match succeeded.
    #[must_use]
    pub fn customer_id(&self) -> Option<&str> {
        self.matched_customer
            .as_ref()
            .filter(|m| m.ok)
            .and_then(|m| m.customer_id.as_deref())
    }
}

impl StateDelta {
    /// A delta that records a single error.
    #[must_use]
    pub fn error(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            errors: vec![ErrorInfo::new(code, reason)],
            ..Self::default()
        }
    }

    /// A delta that records a single warning.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            warnings: vec![message.into()],
            ..Self::default()
        }
    }
}

/// The caller-facing result of one orchestration run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Run identifier.
    pub run_id: String,
    /// Message the run processed.
    pub message_id: String,
    /// Terminal status.
    pub status: Status,
    /// Start timestamp.
    pub started_at: Option<String>,
    /// Finish timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    /// Idempotency key the run settled on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Matched customer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    /// Matched contact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    /// Uploaded file URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// ERP sales-order number on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_order_no: Option<String>,
    /// ERP order URL on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_url: Option<String>,
    /// Accumulated warnings.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Accumulated errors.
    #[serde(default)]
    pub errors: Vec<ErrorInfo>,
    /// Manual-review summary when the run paused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_review: Option<ManualReviewInfo>,
}

impl RunResult {
    /// Project a finished state into the caller-facing result.
    #[must_use]
    pub fn from_state(state: &RunState) -> Self {
        Self {
            run_id: state.run_id.clone(),
            message_id: state.email_event.message_id.clone(),
            status: state.final_status.unwrap_or(Status::Failed),
            started_at: state.started_at.clone(),
            finished_at: state.finished_at.clone(),
            idempotency_key: state.idempotency_key.clone(),
            customer_id: state
                .matched_customer
                .as_ref()
                .and_then(|m| m.customer_id.clone()),
            contact_id: state
                .matched_contact
                .as_ref()
                .and_then(|m| m.contact_id.clone()),
            file_url: state.file_upload.as_ref().and_then(|f| f.file_url.clone()),
            sales_order_no: state
                .erp_result
                .as_ref()
                .and_then(|e| e.sales_order_no.clone()),
            order_url: state.erp_result.as_ref().and_then(|e| e.order_url.clone()),
            warnings: state.warnings.clone(),
            errors: state.errors.clone(),
            manual_review: state.manual_review.clone(),
        }
    }
}
