// SPDX-License-Identifier: MIT OR Apache-2.0
//! State patching and resume-node selection.

use ino_core::{
    ContactMatchResult, CustomerMatchResult, ManualReviewDecision, MasterDataSnapshot, RunState,
    now_iso,
};
use ino_graph::NodeId;
use serde_json::json;

/// Choose the node to resume at. First match wins: a re-selected
/// attachment re-enters at `upload_pdf`, a re-selected customer at
/// `match_customer`, otherwise the contract chat-flow re-runs.
#[must_use]
pub fn determine_resume_node(decision: &ManualReviewDecision) -> NodeId {
    if decision
        .selected_attachment_id
        .as_deref()
        .is_some_and(|s| !s.is_empty())
    {
        return NodeId::UploadPdf;
    }
    if decision
        .selected_customer_id
        .as_deref()
        .is_some_and(|s| !s.is_empty())
    {
        return NodeId::MatchCustomer;
    }
    NodeId::CallDifyContract
}

/// The optimistic walk from a resume node to the end of the graph.
#[must_use]
pub fn planned_path(from: NodeId) -> Vec<&'static str> {
    match from {
        NodeId::MatchCustomer => vec![
            "match_customer",
            "call_dify_contract",
            "call_dify_order_payload",
            "call_gateway",
            "upload_pdf",
            "notify_sales",
            "finalize",
        ],
        NodeId::UploadPdf => vec![
            "upload_pdf",
            "call_dify_contract",
            "call_dify_order_payload",
            "call_gateway",
            "notify_sales",
            "finalize",
        ],
        NodeId::CallDifyContract => vec![
            "call_dify_contract",
            "call_dify_order_payload",
            "call_gateway",
            "upload_pdf",
            "notify_sales",
            "finalize",
        ],
        NodeId::CallDifyOrderPayload => vec![
            "call_dify_order_payload",
            "call_gateway",
            "upload_pdf",
            "notify_sales",
            "finalize",
        ],
        NodeId::CallGateway => vec!["call_gateway", "upload_pdf", "notify_sales", "finalize"],
        other => vec![other.as_str()],
    }
}

/// Apply a RESUME decision to a checkpointed state.
///
/// The reviewer's picks overwrite the corresponding fields (manual
/// selection carries full confidence); the terminal markers are cleared so
/// the walk can continue.
pub fn apply_decision(
    state: &mut RunState,
    decision: &ManualReviewDecision,
    snapshot: &MasterDataSnapshot,
) {
    if let Some(customer_id) = decision
        .selected_customer_id
        .as_deref()
        .filter(|s| !s.is_empty())
        && let Some(customer) = snapshot.get_customer_by_id(customer_id)
    {
        state.matched_customer = Some(CustomerMatchResult {
            ok: true,
            customer_id: Some(customer.customer_id.clone()),
            score: 100.0,
            top_candidates: vec![],
            errors: vec![],
        });
    }

    if let Some(contact_id) = decision
        .selected_contact_id
        .as_deref()
        .filter(|s| !s.is_empty())
        && let Some(contact) = snapshot
            .contacts
            .iter()
            .find(|c| c.contact_id == contact_id)
    {
        state.matched_contact = Some(ContactMatchResult {
            ok: true,
            contact_id: Some(contact.contact_id.clone()),
            customer_id: Some(contact.customer_id.clone()),
            errors: vec![],
        });
    }

    if let Some(attachment_id) = decision
        .selected_attachment_id
        .as_deref()
        .filter(|s| !s.is_empty())
        && let Some(attachment) = state
            .email_event
            .attachments
            .iter()
            .find(|a| a.attachment_id == attachment_id)
    {
        state.pdf_attachment = Some(attachment.clone());
        // The previous selection's upload no longer applies.
        state.file_upload = None;
    }

    if let Some(review) = &mut state.manual_review {
        review.decision = Some(json!({
            "action": &decision.action,
            "selected_customer_id": &decision.selected_customer_id,
            "selected_contact_id": &decision.selected_contact_id,
            "selected_attachment_id": &decision.selected_attachment_id,
            "decided_at": now_iso(),
        }));
    }

    // Clear the pause markers so finalize recomputes them.
    state.final_status = None;
    state.finished_at = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ino_core::{Attachment, Customer, InboundMessage, Status};

    fn decision(
        customer: Option<&str>,
        attachment: Option<&str>,
    ) -> ManualReviewDecision {
        ManualReviewDecision {
            action: "RESUME".into(),
            selected_customer_id: customer.map(str::to_string),
            selected_contact_id: None,
            selected_attachment_id: attachment.map(str::to_string),
            comment: None,
        }
    }

    fn snapshot() -> MasterDataSnapshot {
        MasterDataSnapshot::new(
            1,
            vec![Customer {
                customer_id: "C1".into(),
                customer_num: "1001".into(),
                name: "Acme".into(),
                company_id: None,
            }],
            vec![],
            vec![],
            vec![],
        )
    }

    fn attachment(id: &str) -> Attachment {
        Attachment {
            attachment_id: id.into(),
            filename: format!("{id}.pdf"),
            content_type: "application/pdf".into(),
            size_bytes: 1,
            sha256: Some("a".repeat(64)),
            bytes_b64: None,
            blob_path: None,
        }
    }

    #[test]
    fn attachment_selection_wins_over_customer() {
        assert_eq!(
            determine_resume_node(&decision(Some("C1"), Some("att2"))),
            NodeId::UploadPdf
        );
        assert_eq!(
            determine_resume_node(&decision(Some("C1"), None)),
            NodeId::MatchCustomer
        );
        assert_eq!(
            determine_resume_node(&decision(None, None)),
            NodeId::CallDifyContract
        );
    }

    #[test]
    fn planned_path_starts_at_the_resume_node() {
        assert_eq!(planned_path(NodeId::UploadPdf)[0], "upload_pdf");
        assert_eq!(planned_path(NodeId::MatchCustomer).last(), Some(&"finalize"));
        assert_eq!(planned_path(NodeId::CallGateway).len(), 4);
    }

    #[test]
    fn patch_overrides_customer_and_attachment() {
        let mut state = RunState::new(
            "r1",
            InboundMessage {
                attachments: vec![attachment("att1"), attachment("att2")],
                ..Default::default()
            },
        );
        state.final_status = Some(Status::ManualReview);
        state.pdf_attachment = None;

        apply_decision(&mut state, &decision(Some("C1"), Some("att2")), &snapshot());

        let mc = state.matched_customer.unwrap();
        assert!(mc.ok);
        assert_eq!(mc.score, 100.0);
        assert_eq!(mc.customer_id.as_deref(), Some("C1"));
        assert_eq!(
            state.pdf_attachment.unwrap().attachment_id,
            "att2".to_string()
        );
        assert!(state.final_status.is_none());
        assert!(state.finished_at.is_none());
    }

    #[test]
    fn unknown_ids_leave_state_untouched() {
        let mut state = RunState::new("r1", InboundMessage::default());
        apply_decision(&mut state, &decision(Some("C9"), Some("attX")), &snapshot());
        assert!(state.matched_customer.is_none());
        assert!(state.pdf_attachment.is_none());
    }

    #[test]
    fn reselecting_attachment_drops_stale_upload() {
        let mut state = RunState::new(
            "r1",
            InboundMessage {
                attachments: vec![attachment("att1"), attachment("att2")],
                ..Default::default()
            },
        );
        state.file_upload = Some(ino_core::FileUploadResult {
            ok: true,
            file_url: Some("https://files/old".into()),
            file_id: None,
            sha256: None,
            errors: vec![],
        });
        apply_decision(&mut state, &decision(None, Some("att2")), &snapshot());
        assert!(state.file_upload.is_none());
    }
}
