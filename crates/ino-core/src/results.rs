// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-step result types carried on the run state.
//!
//! Every step reports `ok` plus step-specific fields; failures are recorded
//! as [`ErrorInfo`] lists rather than bubbling as errors so that `finalize`
//! can compute the terminal status from the whole picture.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structured, serializable error entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable code (see [`crate::codes`]).
    pub code: String,
    /// Human-readable reason.
    pub reason: String,
    /// Optional structured context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorInfo {
    /// Build an entry without details.
    #[must_use]
    pub fn new(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            reason: reason.into(),
            details: None,
        }
    }

    /// Build an entry with structured details.
    #[must_use]
    pub fn with_details(code: impl Into<String>, reason: impl Into<String>, details: Value) -> Self {
        Self {
            code: code.into(),
            reason: reason.into(),
            details: Some(details),
        }
    }
}

/// Result of matching the sender to a contact.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactMatchResult {
    /// Whether a contact was found.
    pub ok: bool,
    /// Matched contact id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    /// The matched contact's customer id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    /// Step errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorInfo>,
}

/// Result of the contract-signal detection step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractSignalResult {
    /// Whether detection itself succeeded.
    pub ok: bool,
    /// Whether the mail is considered contract-related.
    pub is_contract_mail: bool,
    /// Pre-selected PDF attachment, when exactly one was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_attachment_id: Option<String>,
    /// Step errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorInfo>,
}

/// One scored customer candidate with matching evidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerCandidate {
    /// Candidate customer id.
    pub customer_id: String,
    /// Candidate customer number.
    pub customer_num: String,
    /// Candidate customer name.
    pub name: String,
    /// Match score in `[0, 100]`.
    pub score: f64,
}

/// Result of resolving the customer for the run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerMatchResult {
    /// Whether a customer was resolved with sufficient confidence.
    pub ok: bool,
    /// Resolved customer id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    /// Match score in `[0, 100]` (100 for contact-derived or manual picks).
    pub score: f64,
    /// Scored candidates for manual review, best first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_candidates: Vec<CustomerCandidate>,
    /// Step errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorInfo>,
}

/// Result of uploading the selected PDF to the blob store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FileUploadResult {
    /// Whether the upload succeeded.
    pub ok: bool,
    /// Remote URL of the uploaded file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// Blob-store file identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Hex-encoded SHA-256 of the uploaded bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Step errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorInfo>,
}

/// Result of the contract-recognition chat-flow.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractRecognitionResult {
    /// Whether recognition succeeded.
    pub ok: bool,
    /// Recognized line items.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Value>,
    /// Contract-level metadata (PO number, dates, ...).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub contract_meta: Value,
    /// Step errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorInfo>,
    /// Raw chat-flow answer when JSON parsing failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_answer: Option<String>,
}

/// Result of the order-payload chat-flow.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderPayloadResult {
    /// Whether a payload was produced.
    pub ok: bool,
    /// The ERP-ready order payload.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub order_payload: Value,
    /// Step errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorInfo>,
    /// Raw chat-flow answer when JSON parsing failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_answer: Option<String>,
}

/// Result of the ERP create-order call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ErpCreateOrderResult {
    /// Whether the ERP accepted the order.
    pub ok: bool,
    /// Assigned sales-order number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_order_no: Option<String>,
    /// URL of the created order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_url: Option<String>,
    /// Step errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes;

    #[test]
    fn error_info_serializes_without_empty_details() {
        let e = ErrorInfo::new(codes::CONTACT_NOT_FOUND, "no contact");
        let json = serde_json::to_string(&e).unwrap();
        assert!(!json.contains("details"));
    }

    #[test]
    fn contract_result_defaults_parse_from_sparse_json() {
        let r: ContractRecognitionResult =
            serde_json::from_str(r#"{"ok": true, "items": [{"product": "P1", "qty": 1}]}"#)
                .unwrap();
        assert!(r.ok);
        assert_eq!(r.items.len(), 1);
        assert!(r.contract_meta.is_null());
        assert!(r.errors.is_empty());
    }

    #[test]
    fn erp_result_roundtrip() {
        let r = ErpCreateOrderResult {
            ok: true,
            sales_order_no: Some("SO001".into()),
            order_url: Some("https://erp/orders/SO001".into()),
            errors: vec![],
        };
        let json = serde_json::to_string(&r).unwrap();
        let back: ErpCreateOrderResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
