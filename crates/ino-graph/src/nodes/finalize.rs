// SPDX-License-Identifier: MIT OR Apache-2.0
//! Terminal node: resolve the final status, generate manual-review
//! candidates, redact the state, and write the run record.

use crate::{GraphContext, candidates};
use ino_core::{ManualReviewInfo, RunState, StateDelta, Status, now_iso};
use ino_redact::redact_value;
use tracing::{info, warn};

// First matching rule wins.
fn resolve_status(state: &RunState) -> (Status, Option<String>) {
    if let Some(status) = state.final_status {
        let reason = state
            .manual_review
            .as_ref()
            .map(|m| m.reason_code.clone())
            .or_else(|| state.first_error_code().map(str::to_string));
        return (status, reason);
    }
    if state.erp_result.as_ref().is_some_and(|e| e.ok) {
        return (Status::Success, None);
    }
    if let Some(m) = &state.matched_contact
        && !m.ok
    {
        return (
            Status::UnknownContact,
            Some(ino_core::codes::CONTACT_NOT_FOUND.to_string()),
        );
    }
    if let Some(s) = &state.contract_signals
        && !s.is_contract_mail
    {
        return (Status::Ignored, None);
    }
    if let Some(c) = &state.contract_result
        && !c.ok
    {
        return (Status::ContractParseFailed, None);
    }
    if let Some(p) = &state.order_payload_result
        && !p.ok
    {
        return (Status::OrderPayloadBlocked, None);
    }
    if let Some(e) = &state.erp_result
        && !e.ok
    {
        return (Status::ErpOrderFailed, None);
    }
    let reason = state
        .first_error_code()
        .unwrap_or("MANUAL_REVIEW")
        .to_string();
    (Status::ManualReview, Some(reason))
}

pub(crate) async fn run(ctx: &GraphContext, state: &RunState) -> StateDelta {
    let (status, reason_code) = resolve_status(state);

    let mut delta = StateDelta {
        final_status: Some(status),
        finished_at: Some(state.finished_at.clone().unwrap_or_else(now_iso)),
        ..Default::default()
    };

    let manual_review = if status == Status::ManualReview && state.manual_review.is_none() {
        Some(ManualReviewInfo {
            reason_code: reason_code.clone().unwrap_or_else(|| "MANUAL_REVIEW".into()),
            created_at: now_iso(),
            candidates: candidates::generate(state),
            decision: None,
        })
    } else {
        None
    };
    delta.manual_review = manual_review.clone();

    // Persist the redacted terminal state on the run record.
    let mut final_state = state.clone();
    final_state.final_status = Some(status);
    final_state.finished_at = delta.finished_at.clone();
    if manual_review.is_some() {
        final_state.manual_review = manual_review;
    }
    let redacted = match serde_json::to_value(&final_state) {
        Ok(v) => Some(redact_value(&v)),
        Err(e) => {
            delta.warnings.push(format!("state serialization failed: {e}"));
            None
        }
    };

    if let Err(e) = ctx
        .runs
        .update_run(
            &state.run_id,
            status,
            delta.finished_at.clone(),
            redacted,
            Some(final_state.errors.clone()),
            Some(final_state.warnings.clone()),
        )
        .await
    {
        warn!(target: "ino.graph", run_id = %state.run_id, error = %e, "run record update failed");
        delta.warnings.push(format!("run record update failed: {e}"));
    }

    info!(
        target: "ino.graph",
        run_id = %state.run_id,
        status = %status,
        reason = reason_code.as_deref().unwrap_or("-"),
        "run finalized"
    );
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use ino_core::{
        ContactMatchResult, ContractRecognitionResult, ContractSignalResult, ErpCreateOrderResult,
        ErrorInfo, InboundMessage, OrderPayloadResult, codes,
    };

    fn state() -> RunState {
        RunState::new("r1", InboundMessage::default())
    }

    #[test]
    fn erp_success_wins() {
        let mut s = state();
        s.erp_result = Some(ErpCreateOrderResult {
            ok: true,
            sales_order_no: Some("SO001".into()),
            order_url: None,
            errors: vec![],
        });
        // Even with earlier soft failures on record.
        s.contract_result = Some(ContractRecognitionResult::default());
        assert_eq!(resolve_status(&s).0, Status::Success);
    }

    #[test]
    fn unknown_contact_before_signal() {
        let mut s = state();
        s.matched_contact = Some(ContactMatchResult::default());
        s.contract_signals = Some(ContractSignalResult {
            ok: false,
            is_contract_mail: false,
            pdf_attachment_id: None,
            errors: vec![],
        });
        let (status, reason) = resolve_status(&s);
        assert_eq!(status, Status::UnknownContact);
        assert_eq!(reason.as_deref(), Some(codes::CONTACT_NOT_FOUND));
    }

    #[test]
    fn non_contract_mail_is_ignored() {
        let mut s = state();
        s.contract_signals = Some(ContractSignalResult {
            ok: false,
            is_contract_mail: false,
            pdf_attachment_id: None,
            errors: vec![],
        });
        assert_eq!(resolve_status(&s).0, Status::Ignored);
    }

    #[test]
    fn failed_steps_resolve_in_order() {
        let mut s = state();
        s.contract_result = Some(ContractRecognitionResult::default());
        assert_eq!(resolve_status(&s).0, Status::ContractParseFailed);

        let mut s = state();
        s.order_payload_result = Some(OrderPayloadResult::default());
        assert_eq!(resolve_status(&s).0, Status::OrderPayloadBlocked);

        let mut s = state();
        s.erp_result = Some(ErpCreateOrderResult::default());
        assert_eq!(resolve_status(&s).0, Status::ErpOrderFailed);
    }

    #[test]
    fn fallthrough_is_manual_review_with_first_error_reason() {
        let mut s = state();
        s.errors.push(ErrorInfo::new(codes::MULTI_PDF_ATTACHMENTS, "two pdfs"));
        let (status, reason) = resolve_status(&s);
        assert_eq!(status, Status::ManualReview);
        assert_eq!(reason.as_deref(), Some(codes::MULTI_PDF_ATTACHMENTS));
    }

    #[test]
    fn preset_status_is_kept() {
        let mut s = state();
        s.final_status = Some(Status::Failed);
        assert_eq!(resolve_status(&s).0, Status::Failed);
    }
}
