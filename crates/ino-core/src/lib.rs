// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared contracts for the inorder orchestration platform.
//!
//! This crate defines the canonical data model exchanged between the
//! listener, the orchestration graph, the checkpoint/ledger stores, and the
//! admin surface: inbound messages, master-data snapshots, per-step results,
//! the run state container with its merge rules, and the hashing helpers
//! that derive idempotency keys.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codes;
mod masterdata;
mod message;
mod results;
mod review;
mod similarity;
mod state;
mod status;

pub use masterdata::{Company, Contact, Customer, MasterDataSnapshot, Product};
pub use message::{
    Attachment, Channel, InboundMessage, MAX_ATTACHMENT_BYTES, MessageError, normalize_address,
    normalize_message_id,
};
pub use results::{
    ContactMatchResult, ContractRecognitionResult, ContractSignalResult, CustomerCandidate,
    CustomerMatchResult, ErpCreateOrderResult, ErrorInfo, FileUploadResult, OrderPayloadResult,
};
pub use review::{
    MANUAL_REVIEW_SCOPE, ManualReviewCandidateContact, ManualReviewCandidateCustomer,
    ManualReviewCandidatePdf, ManualReviewCandidates, ManualReviewDecision, ManualReviewRequest,
    ManualReviewResponse, Operator, ReviewAuth,
};
pub use similarity::{normalize_filename, token_overlap_score};
pub use state::{ManualReviewInfo, RunResult, RunState, StateDelta};
pub use status::Status;

use chrono::Utc;
use sha2::{Digest, Sha256};

/// Compute the hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Derive the canonical idempotency key from the full input triple.
///
/// The key is `hex(sha256(message_id ":" file_sha256 ":" customer_id))`;
/// missing components are passed as empty strings by callers that have not
/// yet resolved them.
#[must_use]
pub fn idempotency_key(message_id: &str, file_sha256: &str, customer_id: &str) -> String {
    sha256_hex(format!("{message_id}:{file_sha256}:{customer_id}").as_bytes())
}

/// Derive the initial (message-only) idempotency key used at graph entry,
/// before the file hash and customer are known.
#[must_use]
pub fn initial_idempotency_key(message_id: &str) -> String {
    sha256_hex(format!("{message_id}:").as_bytes())
}

/// Current time as an RFC 3339 timestamp with explicit offset.
#[must_use]
pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn idempotency_key_is_triple_sensitive() {
        let a = idempotency_key("m1", "f1", "c1");
        let b = idempotency_key("m1", "f1", "c2");
        let c = idempotency_key("m1", "f1", "c1");
        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn initial_key_differs_from_canonical() {
        assert_ne!(
            initial_idempotency_key("m1"),
            idempotency_key("m1", "", "")
        );
    }

    #[test]
    fn now_iso_carries_offset() {
        let ts = now_iso();
        assert!(ts.contains('T'));
        assert!(ts.ends_with("+00:00") || ts.ends_with('Z'), "{ts}");
    }
}
