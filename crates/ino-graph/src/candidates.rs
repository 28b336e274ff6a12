// SPDX-License-Identifier: MIT OR Apache-2.0
//! Manual-review candidate generation.
//!
//! Called by `finalize` when a run pauses. Post-condition: at most one
//! `suggested = true` entry per category.

use ino_core::{
    ManualReviewCandidateContact, ManualReviewCandidateCustomer, ManualReviewCandidatePdf,
    ManualReviewCandidates, RunState, normalize_filename,
};
use serde_json::json;

/// Score at or above which a customer match is offered as the suggestion.
pub const SUGGEST_SCORE_THRESHOLD: f64 = 75.0;

/// Generate the candidate sets for a paused run.
#[must_use]
pub fn generate(state: &RunState) -> ManualReviewCandidates {
    let mut candidates = ManualReviewCandidates::default();

    // PDFs: every PDF attachment. Suggested when exactly one exists, or
    // when a node pre-selected one.
    let pdfs = state.email_event.pdf_attachments();
    let suggested_pdf_id = if pdfs.len() == 1 {
        Some(pdfs[0].attachment_id.clone())
    } else {
        state
            .pdf_attachment
            .as_ref()
            .map(|a| a.attachment_id.clone())
    };
    for pdf in pdfs {
        candidates.pdfs.push(ManualReviewCandidatePdf {
            attachment_id: pdf.attachment_id.clone(),
            filename: pdf.filename.clone(),
            sha256: pdf.sha256.clone(),
            size_bytes: pdf.size_bytes,
            suggested: suggested_pdf_id.as_deref() == Some(pdf.attachment_id.as_str()),
        });
    }

    // Customers: top three scored candidates. Suggested only when the
    // match succeeded with a confident score.
    if let Some(mc) = &state.matched_customer {
        let suggested_customer_id = if mc.ok && mc.score >= SUGGEST_SCORE_THRESHOLD {
            mc.customer_id.clone()
        } else {
            None
        };
        let filename_normalized = state
            .pdf_attachment
            .as_ref()
            .map(|a| normalize_filename(&a.filename))
            .unwrap_or_default();
        for candidate in mc.top_candidates.iter().take(3) {
            candidates.customers.push(ManualReviewCandidateCustomer {
                customer_id: candidate.customer_id.clone(),
                customer_num: candidate.customer_num.clone(),
                customer_name: candidate.name.clone(),
                score: candidate.score,
                evidence: json!({
                    "matched_tokens": [filename_normalized.as_str()],
                    "filename_normalized": filename_normalized.as_str(),
                }),
                suggested: suggested_customer_id.as_deref()
                    == Some(candidate.customer_id.as_str()),
            });
        }
    }

    // Contacts: the matched contact alone, or every contact of the matched
    // customer with the sender marked.
    if let Some(snapshot) = &state.masterdata {
        let matched_ok = state
            .matched_contact
            .as_ref()
            .is_some_and(|m| m.ok && m.contact_id.is_some());
        if matched_ok {
            if let Some(contact) = snapshot.get_contact_by_email(&state.email_event.sender_id) {
                candidates.contacts.push(ManualReviewCandidateContact {
                    contact_id: contact.contact_id.clone(),
                    name: contact.name.clone(),
                    email: contact.email.clone(),
                    telephone: contact.telephone.clone(),
                    customer_id: contact.customer_id.clone(),
                    suggested: true,
                });
            }
        } else if let Some(customer_id) = state.customer_id() {
            let sender = state.email_event.sender_id.to_ascii_lowercase();
            for contact in snapshot.contacts_for_customer(customer_id) {
                candidates.contacts.push(ManualReviewCandidateContact {
                    contact_id: contact.contact_id.clone(),
                    name: contact.name.clone(),
                    email: contact.email.clone(),
                    telephone: contact.telephone.clone(),
                    customer_id: contact.customer_id.clone(),
                    suggested: contact.email.to_ascii_lowercase() == sender,
                });
            }
        }
    }

    candidates.enforce_single_suggested();
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use ino_core::{
        Attachment, Contact, ContactMatchResult, Customer, CustomerCandidate, CustomerMatchResult,
        InboundMessage, MasterDataSnapshot,
    };
    use std::sync::Arc;

    fn pdf(id: &str) -> Attachment {
        Attachment {
            attachment_id: id.into(),
            filename: format!("{id}.pdf"),
            content_type: "application/pdf".into(),
            size_bytes: 100,
            sha256: None,
            bytes_b64: None,
            blob_path: None,
        }
    }

    fn snapshot() -> Arc<MasterDataSnapshot> {
        Arc::new(MasterDataSnapshot::new(
            1,
            vec![Customer {
                customer_id: "C1".into(),
                customer_num: "1001".into(),
                name: "Acme".into(),
                company_id: None,
            }],
            vec![
                Contact {
                    contact_id: "P1".into(),
                    email: "buyer@example.com".into(),
                    name: "Buyer".into(),
                    customer_id: "C1".into(),
                    telephone: Some("13812345678".into()),
                },
                Contact {
                    contact_id: "P2".into(),
                    email: "other@example.com".into(),
                    name: "Other".into(),
                    customer_id: "C1".into(),
                    telephone: None,
                },
            ],
            vec![],
            vec![],
        ))
    }

    fn base_state(attachments: Vec<Attachment>) -> RunState {
        let mut state = RunState::new(
            "r1",
            InboundMessage {
                sender_id: "buyer@example.com".into(),
                attachments,
                ..Default::default()
            },
        );
        state.masterdata = Some(snapshot());
        state
    }

    #[test]
    fn single_pdf_is_suggested() {
        let state = base_state(vec![pdf("att1")]);
        let c = generate(&state);
        assert_eq!(c.pdfs.len(), 1);
        assert!(c.pdfs[0].suggested);
    }

    #[test]
    fn two_pdfs_none_suggested() {
        let state = base_state(vec![pdf("att1"), pdf("att2")]);
        let c = generate(&state);
        assert_eq!(c.pdfs.len(), 2);
        assert!(c.pdfs.iter().all(|p| !p.suggested));
    }

    #[test]
    fn preselected_pdf_stays_suggested_among_many() {
        let mut state = base_state(vec![pdf("att1"), pdf("att2")]);
        state.pdf_attachment = Some(pdf("att2"));
        let c = generate(&state);
        let suggested: Vec<_> = c.pdfs.iter().filter(|p| p.suggested).collect();
        assert_eq!(suggested.len(), 1);
        assert_eq!(suggested[0].attachment_id, "att2");
    }

    #[test]
    fn customer_candidates_capped_at_three_with_threshold() {
        let mut state = base_state(vec![pdf("att1")]);
        state.matched_customer = Some(CustomerMatchResult {
            ok: true,
            customer_id: Some("C1".into()),
            score: 80.0,
            top_candidates: (0..5)
                .map(|i| CustomerCandidate {
                    customer_id: if i == 0 { "C1".into() } else { format!("C{i}x") },
                    customer_num: format!("100{i}"),
                    name: format!("Cust {i}"),
                    score: 80.0 - i as f64,
                })
                .collect(),
            errors: vec![],
        });
        let c = generate(&state);
        assert_eq!(c.customers.len(), 3);
        let suggested: Vec<_> = c.customers.iter().filter(|x| x.suggested).collect();
        assert_eq!(suggested.len(), 1);
        assert_eq!(suggested[0].customer_id, "C1");
    }

    #[test]
    fn low_score_match_suggests_nobody() {
        let mut state = base_state(vec![pdf("att1")]);
        state.matched_customer = Some(CustomerMatchResult {
            ok: false,
            customer_id: None,
            score: 0.0,
            top_candidates: vec![CustomerCandidate {
                customer_id: "C1".into(),
                customer_num: "1001".into(),
                name: "Acme".into(),
                score: 40.0,
            }],
            errors: vec![],
        });
        let c = generate(&state);
        assert_eq!(c.customers.len(), 1);
        assert!(!c.customers[0].suggested);
    }

    #[test]
    fn matched_contact_is_the_single_suggested_contact() {
        let mut state = base_state(vec![pdf("att1")]);
        state.matched_contact = Some(ContactMatchResult {
            ok: true,
            contact_id: Some("P1".into()),
            customer_id: Some("C1".into()),
            errors: vec![],
        });
        let c = generate(&state);
        assert_eq!(c.contacts.len(), 1);
        assert!(c.contacts[0].suggested);
        assert_eq!(c.contacts[0].contact_id, "P1");
    }

    #[test]
    fn unmatched_contact_lists_customer_contacts_with_sender_suggested() {
        let mut state = base_state(vec![pdf("att1")]);
        state.matched_contact = Some(ContactMatchResult::default());
        state.matched_customer = Some(CustomerMatchResult {
            ok: true,
            customer_id: Some("C1".into()),
            score: 100.0,
            top_candidates: vec![],
            errors: vec![],
        });
        let c = generate(&state);
        assert_eq!(c.contacts.len(), 2);
        let suggested: Vec<_> = c.contacts.iter().filter(|x| x.suggested).collect();
        assert_eq!(suggested.len(), 1);
        assert_eq!(suggested[0].email, "buyer@example.com");
    }

    #[test]
    fn at_most_one_suggested_per_category() {
        let mut state = base_state(vec![pdf("att1"), pdf("att2"), pdf("att3")]);
        state.pdf_attachment = Some(pdf("att1"));
        state.matched_contact = Some(ContactMatchResult {
            ok: true,
            contact_id: Some("P1".into()),
            customer_id: Some("C1".into()),
            errors: vec![],
        });
        let c = generate(&state);
        assert!(c.pdfs.iter().filter(|p| p.suggested).count() <= 1);
        assert!(c.customers.iter().filter(|x| x.suggested).count() <= 1);
        assert!(c.contacts.iter().filter(|x| x.suggested).count() <= 1);
    }
}
