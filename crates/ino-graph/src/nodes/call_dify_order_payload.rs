// SPDX-License-Identifier: MIT OR Apache-2.0
//! Order-payload chat-flow: turn recognized contract items into an
//! ERP-ready order payload.

use crate::GraphContext;
use ino_core::{ErrorInfo, OrderPayloadResult, RunState, StateDelta, codes};
use serde_json::{Value, json};

pub(crate) async fn run(ctx: &GraphContext, state: &RunState) -> StateDelta {
    let Some(contract) = state.contract_result.as_ref().filter(|c| c.ok) else {
        return StateDelta::default();
    };
    let Some(snapshot) = &state.masterdata else {
        return StateDelta::default();
    };
    let Some(customer) = state
        .customer_id()
        .and_then(|id| snapshot.get_customer_by_id(id))
    else {
        return StateDelta::default();
    };
    let Some(contact) = snapshot.get_contact_by_email(&state.email_event.sender_id) else {
        return StateDelta::default();
    };

    let inputs = json!({
        "customer": customer,
        "contact": contact,
        "contract_meta": &contract.contract_meta,
        "contract_items": &contract.items,
        "file_url": state.file_upload.as_ref().and_then(|f| f.file_url.clone()),
        "message_id": &state.email_event.message_id,
    });
    let answer = ctx
        .llm_order
        .chat("生成销售订单", &state.email_event.sender_id, inputs, None)
        .await;

    let reason = answer
        .get("reason")
        .and_then(Value::as_str)
        .map(str::to_string);
    let result: OrderPayloadResult =
        serde_json::from_value(answer.clone()).unwrap_or_else(|_| OrderPayloadResult {
            ok: false,
            raw_answer: Some(answer.to_string()),
            ..Default::default()
        });

    let mut delta = StateDelta::default();
    if !result.ok {
        let detail = result
            .errors
            .first()
            .map(|e| e.reason.clone())
            .or(reason)
            .unwrap_or_else(|| "order payload generation blocked".to_string());
        delta
            .errors
            .push(ErrorInfo::new(codes::DIFY_ORDER_PAYLOAD_BLOCKED, detail));
    }
    delta.order_payload_result = Some(result);
    delta
}
