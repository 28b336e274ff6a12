// SPDX-License-Identifier: MIT OR Apache-2.0
//! Manual-review wire types: candidates, decisions, and the submit
//! request/response envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Status;

/// Scope required to submit a manual-review decision.
pub const MANUAL_REVIEW_SCOPE: &str = "mcs:sales_email:manual_review";

/// A PDF attachment offered for selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManualReviewCandidatePdf {
    /// Attachment id within the message.
    pub attachment_id: String,
    /// Original filename.
    pub filename: String,
    /// Hex-encoded SHA-256, when computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Whether this is the suggested pick.
    #[serde(default)]
    pub suggested: bool,
}

/// A scored customer offered for selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManualReviewCandidateCustomer {
    /// Customer id.
    pub customer_id: String,
    /// Customer number.
    pub customer_num: String,
    /// Customer name.
    pub customer_name: String,
    /// Match score in `[0, 100]`.
    pub score: f64,
    /// Matching evidence (`matched_tokens`, `filename_normalized`).
    pub evidence: Value,
    /// Whether this is the suggested pick.
    #[serde(default)]
    pub suggested: bool,
}

/// A contact offered for selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManualReviewCandidateContact {
    /// Contact id.
    pub contact_id: String,
    /// Contact name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Contact telephone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telephone: Option<String>,
    /// Customer the contact belongs to.
    pub customer_id: String,
    /// Whether this is the suggested pick.
    #[serde(default)]
    pub suggested: bool,
}

/// Candidate sets generated when a run pauses for review.
///
/// Invariant: at most one `suggested = true` entry per category.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualReviewCandidates {
    /// PDF candidates.
    #[serde(default)]
    pub pdfs: Vec<ManualReviewCandidatePdf>,
    /// Customer candidates (at most three).
    #[serde(default)]
    pub customers: Vec<ManualReviewCandidateCustomer>,
    /// Contact candidates.
    #[serde(default)]
    pub contacts: Vec<ManualReviewCandidateContact>,
}

/// A reviewer's decision.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualReviewDecision {
    /// `"RESUME"` or `"BLOCK"`.
    pub action: String,
    /// Customer picked by the reviewer (required for RESUME).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_customer_id: Option<String>,
    /// Contact override, when the reviewer corrects the contact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_contact_id: Option<String>,
    /// Attachment picked by the reviewer (required with >1 PDF candidate).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_attachment_id: Option<String>,
    /// Free-form comment (required for BLOCK).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Identity of the human submitting the decision.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    /// Operator user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Operator display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

/// Authorization context of the submission.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewAuth {
    /// Tenant the caller acts for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Granted scopes; must include [`MANUAL_REVIEW_SCOPE`].
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Caller-supplied request id for correlation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Manual-review submission request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManualReviewRequest {
    /// Run to decide on.
    pub run_id: String,
    /// Optional message id; must match the run's when supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// The decision.
    pub decision: ManualReviewDecision,
    /// Submitting operator.
    #[serde(default)]
    pub operator: Operator,
    /// Authorization context.
    #[serde(default)]
    pub auth: ReviewAuth,
}

/// Manual-review submission response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualReviewResponse {
    /// Whether the submission was accepted.
    pub ok: bool,
    /// Run the response refers to.
    pub run_id: String,
    /// `"RESUMING"` or `"BLOCKED"` on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Final status when the run stays paused (BLOCK).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_status: Option<Status>,
    /// Resume plan (`from_node`, `planned_path`) on RESUME.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<Value>,
    /// Audit event id recorded for the decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_id: Option<String>,
    /// Error code on rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Error reason on rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ManualReviewCandidates {
    /// Force the at-most-one-suggested invariant per category, keeping the
    /// first (or best-scoring, for customers) suggestion.
    pub fn enforce_single_suggested(&mut self) {
        if self.pdfs.iter().filter(|p| p.suggested).count() > 1 {
            let keep = self.pdfs.iter().position(|p| p.suggested);
            for (i, pdf) in self.pdfs.iter_mut().enumerate() {
                pdf.suggested = Some(i) == keep;
            }
        }
        if self.customers.iter().filter(|c| c.suggested).count() > 1 {
            let best = self
                .customers
                .iter()
                .enumerate()
                .filter(|(_, c)| c.suggested)
                .max_by(|(_, a), (_, b)| a.score.total_cmp(&b.score))
                .map(|(i, _)| i);
            for (i, customer) in self.customers.iter_mut().enumerate() {
                customer.suggested = Some(i) == best;
            }
        }
        if self.contacts.iter().filter(|c| c.suggested).count() > 1 {
            let keep = self.contacts.iter().position(|c| c.suggested);
            for (i, contact) in self.contacts.iter_mut().enumerate() {
                contact.suggested = Some(i) == keep;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(id: &str, suggested: bool) -> ManualReviewCandidatePdf {
        ManualReviewCandidatePdf {
            attachment_id: id.into(),
            filename: format!("{id}.pdf"),
            sha256: None,
            size_bytes: 10,
            suggested,
        }
    }

    fn customer(id: &str, score: f64, suggested: bool) -> ManualReviewCandidateCustomer {
        ManualReviewCandidateCustomer {
            customer_id: id.into(),
            customer_num: id.into(),
            customer_name: id.into(),
            score,
            evidence: serde_json::json!({}),
            suggested,
        }
    }

    #[test]
    fn single_suggested_pdf_keeps_first() {
        let mut c = ManualReviewCandidates {
            pdfs: vec![pdf("a", true), pdf("b", true)],
            ..Default::default()
        };
        c.enforce_single_suggested();
        assert!(c.pdfs[0].suggested);
        assert!(!c.pdfs[1].suggested);
    }

    #[test]
    fn single_suggested_customer_keeps_highest_score() {
        let mut c = ManualReviewCandidates {
            customers: vec![customer("a", 80.0, true), customer("b", 95.0, true)],
            ..Default::default()
        };
        c.enforce_single_suggested();
        assert!(!c.customers[0].suggested);
        assert!(c.customers[1].suggested);
    }

    #[test]
    fn already_unique_is_untouched() {
        let mut c = ManualReviewCandidates {
            pdfs: vec![pdf("a", false), pdf("b", true)],
            ..Default::default()
        };
        c.enforce_single_suggested();
        assert!(!c.pdfs[0].suggested);
        assert!(c.pdfs[1].suggested);
    }

    #[test]
    fn request_parses_with_defaults() {
        let req: ManualReviewRequest = serde_json::from_str(
            r#"{"run_id": "r1", "decision": {"action": "BLOCK", "comment": "dup"}}"#,
        )
        .unwrap();
        assert_eq!(req.run_id, "r1");
        assert!(req.auth.scopes.is_empty());
        assert_eq!(req.decision.action, "BLOCK");
    }
}
