// SPDX-License-Identifier: MIT OR Apache-2.0
//! Match the sender address to a contact in master data.

use crate::GraphContext;
use ino_core::{ContactMatchResult, ErrorInfo, RunState, StateDelta, codes};
use tracing::debug;

pub(crate) async fn run(_ctx: &GraphContext, state: &RunState) -> StateDelta {
    let Some(snapshot) = &state.masterdata else {
        return StateDelta::error(codes::MASTERDATA_INVALID, "master data not loaded");
    };

    let sender = &state.email_event.sender_id;
    let result = match snapshot.get_contact_by_email(sender) {
        Some(contact) => {
            debug!(
                target: "ino.graph",
                run_id = %state.run_id,
                contact_id = %contact.contact_id,
                "contact matched"
            );
            ContactMatchResult {
                ok: true,
                contact_id: Some(contact.contact_id.clone()),
                customer_id: Some(contact.customer_id.clone()),
                errors: vec![],
            }
        }
        None => ContactMatchResult {
            ok: false,
            contact_id: None,
            customer_id: None,
            errors: vec![ErrorInfo::new(
                codes::CONTACT_NOT_FOUND,
                format!("contact not found for sender: {sender}"),
            )],
        },
    };

    let mut delta = StateDelta::default();
    if !result.ok {
        delta.errors.extend(result.errors.clone());
    }
    delta.matched_contact = Some(result);
    delta
}
