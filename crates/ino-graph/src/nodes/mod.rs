// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node implementations.
//!
//! Every node is a pure-ish async function `(ctx, state) -> StateDelta`:
//! it may call external systems through the context but never mutates the
//! state it reads. Unmet preconditions yield an empty delta so the walk
//! can continue to `finalize`, which folds whatever happened into a
//! terminal status.

mod call_dify_contract;
mod call_dify_order_payload;
mod call_gateway;
mod check_idempotency;
mod detect_contract_signal;
mod finalize;
mod load_masterdata;
mod match_contact;
mod match_customer;
mod notify_sales;
mod upload_pdf;

use crate::{GraphContext, NodeId};
use ino_core::{Attachment, ErrorInfo, FileUploadResult, RunState, codes};
use serde_json::json;

/// Execute one node against the current state.
pub async fn execute(node: NodeId, ctx: &GraphContext, state: &RunState) -> ino_core::StateDelta {
    match node {
        NodeId::CheckIdempotency => check_idempotency::run(ctx, state).await,
        NodeId::LoadMasterdata => load_masterdata::run(ctx, state).await,
        NodeId::MatchContact => match_contact::run(ctx, state).await,
        NodeId::DetectContractSignal => detect_contract_signal::run(ctx, state).await,
        NodeId::MatchCustomer => match_customer::run(ctx, state).await,
        NodeId::CallDifyContract => call_dify_contract::run(ctx, state).await,
        NodeId::CallDifyOrderPayload => call_dify_order_payload::run(ctx, state).await,
        NodeId::CallGateway => call_gateway::run(ctx, state).await,
        NodeId::UploadPdf => upload_pdf::run(ctx, state).await,
        NodeId::NotifySales => notify_sales::run(ctx, state).await,
        NodeId::Finalize => finalize::run(ctx, state).await,
    }
}

/// Fetch the selected PDF's payload: inline bytes first, then the blob
/// path persisted at ingestion.
pub(crate) async fn pdf_bytes(ctx: &GraphContext, pdf: &Attachment) -> Option<Vec<u8>> {
    if let Some(bytes) = pdf.decode_bytes() {
        return Some(bytes);
    }
    if let Some(path) = &pdf.blob_path {
        return ctx.artifacts.read(path).await.ok();
    }
    None
}

/// The effective upload result for the selected PDF. Returns the existing
/// result when a previous node already uploaded; otherwise uploads now.
/// The `bool` is `true` when the result is new and belongs in the delta.
pub(crate) async fn resolve_upload(
    ctx: &GraphContext,
    state: &RunState,
    pdf: &Attachment,
) -> (FileUploadResult, bool) {
    if let Some(existing) = &state.file_upload {
        return (existing.clone(), false);
    }
    let Some(bytes) = pdf_bytes(ctx, pdf).await else {
        return (
            FileUploadResult {
                ok: false,
                file_url: None,
                file_id: None,
                sha256: None,
                errors: vec![ErrorInfo::with_details(
                    codes::FILE_UPLOAD_FAILED,
                    "pdf payload unavailable",
                    json!({"filename": &pdf.filename}),
                )],
            },
            true,
        );
    };
    (
        ctx.blob
            .upload(&bytes, &pdf.filename, &pdf.content_type, pdf.sha256.clone())
            .await,
        true,
    )
}
