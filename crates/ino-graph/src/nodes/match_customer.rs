// SPDX-License-Identifier: MIT OR Apache-2.0
//! Resolve the customer for the run.
//!
//! The primary path derives the customer from the matched contact. When
//! that fails, a filename-similarity fallback scores every customer
//! against the selected PDF's name and surfaces the top candidates for
//! manual review.

use crate::GraphContext;
use ino_core::{
    CustomerCandidate, CustomerMatchResult, ErrorInfo, RunState, StateDelta, codes,
    normalize_filename, token_overlap_score,
};
use serde_json::json;
use tracing::debug;

const CANDIDATE_THRESHOLD: f64 = 40.0;

pub(crate) async fn run(_ctx: &GraphContext, state: &RunState) -> StateDelta {
    let Some(snapshot) = &state.masterdata else {
        return StateDelta::default();
    };
    let Some(contact) = state.matched_contact.as_ref().filter(|m| m.ok) else {
        return StateDelta::default();
    };
    let Some(customer_id) = contact.customer_id.as_deref() else {
        return StateDelta::default();
    };

    if let Some(customer) = snapshot.get_customer_by_id(customer_id) {
        debug!(
            target: "ino.graph",
            run_id = %state.run_id,
            customer_id = %customer.customer_id,
            "customer resolved from contact"
        );
        return StateDelta {
            matched_customer: Some(CustomerMatchResult {
                ok: true,
                customer_id: Some(customer.customer_id.clone()),
                score: 100.0,
                top_candidates: vec![],
                errors: vec![],
            }),
            ..Default::default()
        };
    }

    // Contact points at a customer that is gone from the snapshot. Score
    // customers against the document filename so the reviewer has options.
    let filename = state
        .pdf_attachment
        .as_ref()
        .map(|a| normalize_filename(&a.filename))
        .unwrap_or_default();
    let mut candidates: Vec<CustomerCandidate> = snapshot
        .customers
        .iter()
        .filter_map(|c| {
            let score = token_overlap_score(&filename, &c.name)
                .max(token_overlap_score(&filename, &c.customer_num));
            (score >= CANDIDATE_THRESHOLD).then(|| CustomerCandidate {
                customer_id: c.customer_id.clone(),
                customer_num: c.customer_num.clone(),
                name: c.name.clone(),
                score,
            })
        })
        .collect();
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(3);

    StateDelta {
        matched_customer: Some(CustomerMatchResult {
            ok: false,
            customer_id: None,
            score: 0.0,
            top_candidates: candidates,
            errors: vec![ErrorInfo::with_details(
                codes::CUSTOMER_MATCH_LOW_SCORE,
                "customer not found in master data",
                json!({"customer_id": customer_id}),
            )],
        }),
        ..Default::default()
    }
}
