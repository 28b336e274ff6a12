// SPDX-License-Identifier: MIT OR Apache-2.0
//! Artifact persistence and idempotency-key promotion.
//!
//! Runs after the ERP step so that a ledger SUCCESS under the canonical
//! key means the ERP accepted the order for that exact
//! `(message, file, customer)` triple. On resume this node runs first and
//! feeds the chat-flow with the uploaded file URL.

use crate::GraphContext;
use crate::nodes::{pdf_bytes, resolve_upload};
use ino_core::{
    ErpCreateOrderResult, RunState, StateDelta, Status, idempotency_key, now_iso,
};
use ino_ledger::IdempotencyRecord;
use tracing::{info, warn};

pub(crate) async fn run(ctx: &GraphContext, state: &RunState) -> StateDelta {
    let Some(pdf) = &state.pdf_attachment else {
        return StateDelta::default();
    };

    let mut delta = StateDelta::default();

    // Ensure the remote upload exists (the resume path reaches here before
    // the chat-flow nodes).
    let (upload, is_new) = resolve_upload(ctx, state, pdf).await;
    if is_new {
        delta.file_upload = Some(upload.clone());
    }
    if !upload.ok {
        delta.errors.extend(upload.errors.clone());
        return delta;
    }

    // Persist the artifact locally under {message_id}/{filename}. The
    // walk can pass through here twice on resume; an existing artifact
    // for this message and filename is left alone.
    let rel_path = format!("{}/{}", state.email_event.message_id, pdf.filename);
    if ctx.artifacts.read(&rel_path).await.is_err()
        && let Some(bytes) = pdf_bytes(ctx, pdf).await
    {
        match ctx
            .artifacts
            .save(&bytes, &state.email_event.message_id, &pdf.filename)
            .await
        {
            Ok(path) => {
                info!(target: "ino.graph", run_id = %state.run_id, path = %path, "artifact persisted");
            }
            Err(e) => {
                delta.warnings.push(format!("artifact persistence failed: {e}"));
            }
        }
    }

    // Promote the key to canonical form once the file hash is known.
    let Some(file_sha) = pdf.sha256.clone().or_else(|| upload.sha256.clone()) else {
        delta
            .warnings
            .push("file hash unavailable, idempotency key not promoted".to_string());
        return delta;
    };
    let customer_id = state.customer_id().unwrap_or_default();
    let canonical = idempotency_key(&state.email_event.message_id, &file_sha, customer_id);

    let erp_ok = state.erp_result.as_ref().is_some_and(|e| e.ok);
    if state.erp_result.is_none() {
        // A prior run may already have submitted this exact triple.
        match ctx.idempotency.get(&canonical).await {
            Ok(Some(record)) if record.status == Status::Success => {
                info!(
                    target: "ino.graph",
                    run_id = %state.run_id,
                    sales_order_no = ?record.sales_order_no,
                    "canonical key hit a prior success, short-circuiting"
                );
                delta.erp_result = Some(ErpCreateOrderResult {
                    ok: true,
                    sales_order_no: record.sales_order_no,
                    order_url: record.order_url,
                    errors: vec![],
                });
                delta.final_status = Some(Status::Success);
                delta.finished_at = Some(now_iso());
                delta.promoted_idempotency_key = Some(canonical);
                return delta;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(target: "ino.graph", run_id = %state.run_id, error = %e, "ledger lookup failed");
                delta
                    .warnings
                    .push(format!("idempotency lookup failed: {e}"));
            }
        }
    }

    let record = IdempotencyRecord {
        idempotency_key: canonical.clone(),
        message_id: state.email_event.message_id.clone(),
        file_sha256: Some(file_sha),
        customer_id: state.customer_id().map(str::to_string),
        status: if erp_ok { Status::Success } else { Status::Pending },
        sales_order_no: state
            .erp_result
            .as_ref()
            .and_then(|e| e.sales_order_no.clone()),
        order_url: state.erp_result.as_ref().and_then(|e| e.order_url.clone()),
        created_at: now_iso(),
    };
    if let Err(e) = ctx.idempotency.upsert(record).await {
        warn!(target: "ino.graph", run_id = %state.run_id, error = %e, "ledger upsert failed");
        delta
            .warnings
            .push(format!("idempotency ledger update failed: {e}"));
    }
    delta.promoted_idempotency_key = Some(canonical);
    delta
}
