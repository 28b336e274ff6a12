// SPDX-License-Identifier: MIT OR Apache-2.0
//! Run status enumeration.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an orchestration run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// The message was not a contract mail; nothing was done.
    Ignored,
    /// The sender could not be matched to a known contact.
    UnknownContact,
    /// The run is paused awaiting a human decision.
    ManualReview,
    /// The contract-recognition step rejected the document.
    ContractParseFailed,
    /// The order-payload step refused to produce a payload.
    OrderPayloadBlocked,
    /// The ERP rejected or failed the order submission.
    ErpOrderFailed,
    /// The order was accepted by the ERP.
    Success,
    /// The run has been created but not started.
    Pending,
    /// The run crashed outside the normal status rules.
    Failed,
    /// The run is currently executing.
    Running,
}

impl Status {
    /// Returns `true` for statuses that end a run.
    ///
    /// `ManualReview` is terminal for the graph walk but the run itself
    /// remains resumable.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Canonical string form (matches the serialized representation).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignored => "IGNORED",
            Self::UnknownContact => "UNKNOWN_CONTACT",
            Self::ManualReview => "MANUAL_REVIEW",
            Self::ContractParseFailed => "CONTRACT_PARSE_FAILED",
            Self::OrderPayloadBlocked => "ORDER_PAYLOAD_BLOCKED",
            Self::ErpOrderFailed => "ERP_ORDER_FAILED",
            Self::Success => "SUCCESS",
            Self::Pending => "PENDING",
            Self::Failed => "FAILED",
            Self::Running => "RUNNING",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_form_is_screaming_snake() {
        let json = serde_json::to_string(&Status::ManualReview).unwrap();
        assert_eq!(json, "\"MANUAL_REVIEW\"");
        let back: Status = serde_json::from_str("\"ERP_ORDER_FAILED\"").unwrap();
        assert_eq!(back, Status::ErpOrderFailed);
    }

    #[test]
    fn terminal_classification() {
        assert!(Status::Success.is_terminal());
        assert!(Status::ManualReview.is_terminal());
        assert!(!Status::Running.is_terminal());
        assert!(!Status::Pending.is_terminal());
    }

    #[test]
    fn as_str_roundtrips_through_serde() {
        for status in [
            Status::Ignored,
            Status::UnknownContact,
            Status::ManualReview,
            Status::ContractParseFailed,
            Status::OrderPayloadBlocked,
            Status::ErpOrderFailed,
            Status::Success,
            Status::Pending,
            Status::Failed,
            Status::Running,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }
}
