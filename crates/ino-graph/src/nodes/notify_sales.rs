// SPDX-License-Identifier: MIT OR Apache-2.0
//! Salesperson notification. Failures become warnings, never errors;
//! notification must not block the run.

use crate::{GraphContext, candidates};
use ino_clients::{NotificationContext, render_notification};
use ino_core::{RunState, StateDelta, Status};
use tracing::debug;

fn effective_status(state: &RunState) -> Status {
    if let Some(status) = state.final_status {
        return status;
    }
    if state.erp_result.as_ref().is_some_and(|e| e.ok) {
        return Status::Success;
    }
    if let Some(c) = &state.contract_result
        && !c.ok
    {
        return Status::ContractParseFailed;
    }
    if let Some(p) = &state.order_payload_result
        && !p.ok
    {
        return Status::OrderPayloadBlocked;
    }
    if let Some(e) = &state.erp_result
        && !e.ok
    {
        return Status::ErpOrderFailed;
    }
    if let Some(m) = &state.matched_contact
        && !m.ok
    {
        return Status::UnknownContact;
    }
    Status::ManualReview
}

pub(crate) async fn run(ctx: &GraphContext, state: &RunState) -> StateDelta {
    let status = effective_status(state);

    let candidate_counts = if status == Status::ManualReview {
        let c = candidates::generate(state);
        (c.pdfs.len(), c.customers.len(), c.contacts.len())
    } else {
        (0, 0, 0)
    };

    let customer_name = state
        .customer_id()
        .and_then(|id| state.masterdata.as_ref().and_then(|s| s.get_customer_by_id(id)))
        .map(|c| c.name.clone());

    let notification = NotificationContext {
        message_id: state.email_event.message_id.clone(),
        sales_order_no: state
            .erp_result
            .as_ref()
            .and_then(|e| e.sales_order_no.clone()),
        order_url: state.erp_result.as_ref().and_then(|e| e.order_url.clone()),
        customer_name,
        reason_code: state.first_error_code().map(str::to_string),
        candidate_counts,
        errors: state
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.code, e.reason))
            .collect(),
    };
    let (subject, body) = render_notification(status, &notification);

    let mut delta = StateDelta::default();
    if let Err(e) = ctx
        .notifier
        .send(&state.email_event.sender_id, &subject, &body)
        .await
    {
        delta
            .warnings
            .push(format!("failed to send notification email: {e}"));
    } else {
        debug!(target: "ino.graph", run_id = %state.run_id, status = %status, "notification sent");
    }
    delta
}
