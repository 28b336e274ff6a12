// SPDX-License-Identifier: MIT OR Apache-2.0
//! Contract-recognition chat-flow.
//!
//! Requires a resolved customer and a selected PDF. The PDF must be
//! reachable by URL for the vendor, so the node uploads it to the blob
//! store first when no earlier step has.

use crate::GraphContext;
use crate::nodes::resolve_upload;
use ino_core::{ContractRecognitionResult, ErrorInfo, RunState, StateDelta, codes};
use ino_clients::LlmFile;
use serde_json::{Value, json};
use tracing::warn;

pub(crate) async fn run(ctx: &GraphContext, state: &RunState) -> StateDelta {
    let Some(customer_id) = state.customer_id() else {
        return StateDelta::default();
    };
    let Some(snapshot) = &state.masterdata else {
        return StateDelta::default();
    };
    let Some(customer) = snapshot.get_customer_by_id(customer_id) else {
        return StateDelta::default();
    };
    let Some(pdf) = &state.pdf_attachment else {
        return StateDelta::default();
    };

    let mut delta = StateDelta::default();

    let (upload, is_new) = resolve_upload(ctx, state, pdf).await;
    if is_new {
        delta.file_upload = Some(upload.clone());
    }
    if !upload.ok {
        warn!(
            target: "ino.graph",
            run_id = %state.run_id,
            filename = %pdf.filename,
            "pdf upload failed, skipping recognition"
        );
        delta.errors.extend(upload.errors);
        return delta;
    }
    let Some(file_url) = upload.file_url.clone() else {
        delta.errors.push(ErrorInfo::new(
            codes::FILE_UPLOAD_FAILED,
            "upload succeeded but returned no file url",
        ));
        return delta;
    };

    let inputs = json!({
        "customer_id": &customer.customer_id,
        "customer_num": &customer.customer_num,
    });
    let answer = ctx
        .llm_contract
        .chat(
            "识别采购合同",
            &state.email_event.sender_id,
            inputs,
            Some(vec![LlmFile::remote(file_url)]),
        )
        .await;

    let reason = answer
        .get("reason")
        .and_then(Value::as_str)
        .map(str::to_string);
    let result: ContractRecognitionResult =
        serde_json::from_value(answer.clone()).unwrap_or_else(|_| ContractRecognitionResult {
            ok: false,
            raw_answer: Some(answer.to_string()),
            ..Default::default()
        });

    if !result.ok {
        let detail = result
            .errors
            .first()
            .map(|e| e.reason.clone())
            .or(reason)
            .unwrap_or_else(|| "contract recognition failed".to_string());
        delta
            .errors
            .push(ErrorInfo::new(codes::DIFY_CONTRACT_FAILED, detail));
    }
    delta.contract_result = Some(result);
    delta
}
