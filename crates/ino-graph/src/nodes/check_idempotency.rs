// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph entry: derive the initial idempotency key and short-circuit when
//! a prior run already succeeded for this message.

use crate::GraphContext;
use ino_core::{
    ErpCreateOrderResult, RunState, StateDelta, Status, initial_idempotency_key, now_iso,
};
use tracing::info;

pub(crate) async fn run(ctx: &GraphContext, state: &RunState) -> StateDelta {
    let message_id = &state.email_event.message_id;
    let initial_key = initial_idempotency_key(message_id);

    let mut delta = StateDelta {
        idempotency_key: Some(initial_key.clone()),
        ..Default::default()
    };

    match ctx.idempotency.get(&initial_key).await {
        Ok(Some(record)) if record.status == Status::Success => {
            info!(
                target: "ino.graph",
                run_id = %state.run_id,
                message_id = %message_id,
                sales_order_no = ?record.sales_order_no,
                "prior success found, short-circuiting"
            );
            delta.erp_result = Some(ErpCreateOrderResult {
                ok: true,
                sales_order_no: record.sales_order_no,
                order_url: record.order_url,
                errors: vec![],
            });
            delta.final_status = Some(Status::Success);
            delta.finished_at = Some(now_iso());
        }
        Ok(_) => {}
        Err(e) => {
            // Lookup failures must not block ingestion; the canonical key
            // check in upload_pdf still guards the ledger.
            delta
                .warnings
                .push(format!("idempotency lookup failed: {e}"));
        }
    }

    delta
}
