// SPDX-License-Identifier: MIT OR Apache-2.0
//! ERP order submission.
//!
//! On success the idempotency ledger is updated to SUCCESS under the
//! run's current key, which makes replays of the same message
//! short-circuit at graph entry.

use crate::GraphContext;
use ino_clients::ErpError;
use ino_core::{ErpCreateOrderResult, ErrorInfo, RunState, StateDelta, Status, codes, now_iso};
use ino_ledger::IdempotencyRecord;
use tracing::{info, warn};

fn error_code(err: &ErpError) -> &'static str {
    match err {
        ErpError::AuthFailed => codes::ERP_AUTH_FAILED,
        ErpError::CreateFailed { .. } => codes::ERP_CREATE_FAILED,
        ErpError::InvalidResponse => codes::ERP_INVALID_RESPONSE,
        ErpError::Connection(_) => codes::ERP_CONNECTION_FAILED,
    }
}

pub(crate) async fn run(ctx: &GraphContext, state: &RunState) -> StateDelta {
    let Some(payload) = state
        .order_payload_result
        .as_ref()
        .filter(|p| p.ok)
        .map(|p| &p.order_payload)
    else {
        return StateDelta::default();
    };

    let mut delta = StateDelta::default();
    match ctx.erp.create_order(payload).await {
        Ok(order) => {
            info!(
                target: "ino.graph",
                run_id = %state.run_id,
                sales_order_no = %order.sales_order_no,
                "erp accepted order"
            );
            if let Some(key) = &state.idempotency_key {
                let record = IdempotencyRecord {
                    idempotency_key: key.clone(),
                    message_id: state.email_event.message_id.clone(),
                    file_sha256: state.pdf_attachment.as_ref().and_then(|a| a.sha256.clone()),
                    customer_id: state.customer_id().map(str::to_string),
                    status: Status::Success,
                    sales_order_no: Some(order.sales_order_no.clone()),
                    order_url: order.order_url.clone(),
                    created_at: now_iso(),
                };
                if let Err(e) = ctx.idempotency.upsert(record).await {
                    warn!(target: "ino.graph", run_id = %state.run_id, error = %e, "ledger upsert failed");
                    delta
                        .warnings
                        .push(format!("idempotency ledger update failed: {e}"));
                }
            }
            delta.erp_result = Some(ErpCreateOrderResult {
                ok: true,
                sales_order_no: Some(order.sales_order_no),
                order_url: order.order_url,
                errors: vec![],
            });
        }
        Err(err) => {
            let code = error_code(&err);
            let reason = format!("gateway order creation failed: {err}");
            delta.erp_result = Some(ErpCreateOrderResult {
                ok: false,
                sales_order_no: None,
                order_url: None,
                errors: vec![ErrorInfo::new(code, reason.clone())],
            });
            delta.errors.push(ErrorInfo::new(code, reason));
        }
    }
    delta
}
