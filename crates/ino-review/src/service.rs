// SPDX-License-Identifier: MIT OR Apache-2.0
//! Submission handling: validation, audit, block/resume execution.

use crate::{apply_decision, determine_resume_node, planned_path};
use ino_core::{
    ErpCreateOrderResult, MANUAL_REVIEW_SCOPE, ManualReviewRequest, ManualReviewResponse,
    RunState, Status, codes, idempotency_key, now_iso,
};
use ino_graph::{
    CancellationToken, GraphContext, NodeId, OrchestrationService, RESUME_WHITELIST,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

/// Validates manual-review submissions and drives block/resume.
#[derive(Clone)]
pub struct ReviewService {
    ctx: Arc<GraphContext>,
    orchestration: OrchestrationService,
}

fn reject(run_id: &str, code: &str, reason: impl Into<String>) -> ManualReviewResponse {
    ManualReviewResponse {
        ok: false,
        run_id: run_id.to_string(),
        error_code: Some(code.to_string()),
        reason: Some(reason.into()),
        ..Default::default()
    }
}

impl ReviewService {
    /// Create a review service sharing the orchestration's context.
    #[must_use]
    pub fn new(orchestration: OrchestrationService) -> Self {
        Self {
            ctx: orchestration.context().clone(),
            orchestration,
        }
    }

    /// Handle one submission. Rejections come back as structured
    /// `{ok: false, error_code, reason}` responses, never as errors.
    pub async fn submit(&self, request: ManualReviewRequest) -> ManualReviewResponse {
        let run_id = request.run_id.clone();

        // 1. Run exists and is paused.
        let run = match self.ctx.runs.get_run(&run_id).await {
            Ok(Some(run)) => run,
            Ok(None) => return reject(&run_id, codes::RUN_NOT_FOUND, "run not found"),
            Err(e) => return reject(&run_id, codes::DATABASE_ERROR, e.to_string()),
        };
        if run.status != Status::ManualReview {
            return reject(
                &run_id,
                codes::RUN_NOT_IN_MANUAL_REVIEW,
                format!("run is in status {}, expected MANUAL_REVIEW", run.status),
            );
        }

        // 2. Message-id consistency.
        if let Some(message_id) = &request.message_id
            && message_id != &run.message_id
        {
            return reject(
                &run_id,
                codes::INVALID_DECISION,
                format!(
                    "message id mismatch: expected {}, got {message_id}",
                    run.message_id
                ),
            );
        }

        // 3. Tenant must match when the run recorded one.
        let run_tenant = run
            .state_json
            .as_ref()
            .and_then(|s| s.get("tenant_id"))
            .and_then(Value::as_str);
        if let Some(tenant) = run_tenant
            && request.auth.tenant_id.as_deref() != Some(tenant)
        {
            return reject(&run_id, codes::PERMISSION_DENIED, "tenant mismatch");
        }

        // 4. Scope.
        if !request
            .auth
            .scopes
            .iter()
            .any(|s| s == MANUAL_REVIEW_SCOPE)
        {
            return reject(
                &run_id,
                codes::PERMISSION_DENIED,
                format!("missing required scope: {MANUAL_REVIEW_SCOPE}"),
            );
        }

        // 5. Decision shape.
        let decision = &request.decision;
        match decision.action.as_str() {
            "RESUME" => {
                if decision
                    .selected_customer_id
                    .as_deref()
                    .is_none_or(str::is_empty)
                {
                    return reject(
                        &run_id,
                        codes::INVALID_DECISION,
                        "selected_customer_id is required for RESUME",
                    );
                }
                let pdf_candidates = run
                    .state_json
                    .as_ref()
                    .and_then(|s| s.pointer("/manual_review/candidates/pdfs"))
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                if pdf_candidates > 1
                    && decision
                        .selected_attachment_id
                        .as_deref()
                        .is_none_or(str::is_empty)
                {
                    return reject(
                        &run_id,
                        codes::INVALID_DECISION,
                        "selected_attachment_id is required when multiple PDFs exist",
                    );
                }
            }
            "BLOCK" => {
                if decision.comment.as_deref().is_none_or(str::is_empty) {
                    return reject(
                        &run_id,
                        codes::INVALID_DECISION,
                        "comment is required for BLOCK",
                    );
                }
            }
            other => {
                return reject(
                    &run_id,
                    codes::INVALID_DECISION,
                    format!("invalid action: {other}"),
                );
            }
        }

        // Audit the decision (redacted at the persistence boundary).
        let audit_payload = json!({
            "run_id": &run_id,
            "message_id": &run.message_id,
            "reason_code": run
                .state_json
                .as_ref()
                .and_then(|s| s.pointer("/manual_review/reason_code"))
                .cloned()
                .unwrap_or(Value::Null),
            "decision": {
                "action": &decision.action,
                "selected_customer_id": &decision.selected_customer_id,
                "selected_contact_id": &decision.selected_contact_id,
                "selected_attachment_id": &decision.selected_attachment_id,
                "comment": &decision.comment,
            },
            "operator": {
                "user_id": &request.operator.user_id,
                "user_name": &request.operator.user_name,
            },
            "auth": {
                "tenant_id": &request.auth.tenant_id,
                "request_id": &request.auth.request_id,
            },
        });
        let audit_id = match self
            .ctx
            .audit
            .append(&run_id, "manual_review_submit", audit_payload)
            .await
        {
            Ok(event) => event.id,
            Err(e) => return reject(&run_id, codes::DATABASE_ERROR, e.to_string()),
        };

        if decision.action == "BLOCK" {
            return self.block(&run_id, run.state_json, &request, audit_id).await;
        }
        self.resume(&run_id, &request, audit_id).await
    }

    async fn block(
        &self,
        run_id: &str,
        state_json: Option<Value>,
        request: &ManualReviewRequest,
        audit_id: String,
    ) -> ManualReviewResponse {
        // Record the decision on the persisted snapshot; the run stays
        // paused.
        let mut snapshot = state_json.unwrap_or_else(|| json!({}));
        if let Some(review) = snapshot
            .get_mut("manual_review")
            .and_then(Value::as_object_mut)
        {
            review.insert(
                "decision".into(),
                json!({
                    "action": "BLOCK",
                    "comment": &request.decision.comment,
                    "decided_at": now_iso(),
                    "operator_user_id": &request.operator.user_id,
                    "request_id": &request.auth.request_id,
                }),
            );
        }
        if let Err(e) = self
            .ctx
            .runs
            .update_run(run_id, Status::ManualReview, None, Some(snapshot), None, None)
            .await
        {
            return reject(run_id, codes::DATABASE_ERROR, e.to_string());
        }

        info!(target: "ino.review", run_id = %run_id, "run blocked by reviewer");
        ManualReviewResponse {
            ok: true,
            run_id: run_id.to_string(),
            status: Some("BLOCKED".into()),
            final_status: Some(Status::ManualReview),
            audit_id: Some(audit_id),
            ..Default::default()
        }
    }

    async fn resume(
        &self,
        run_id: &str,
        request: &ManualReviewRequest,
        audit_id: String,
    ) -> ManualReviewResponse {
        let mut state: RunState = match self.ctx.checkpoint.load(run_id).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                return reject(
                    run_id,
                    codes::STATE_NOT_FOUND,
                    "could not retrieve state from checkpoint",
                );
            }
            Err(e) => return reject(run_id, codes::STATE_NOT_FOUND, e.to_string()),
        };

        // Re-attach the snapshot handle lost at the persistence boundary.
        let snapshot = match self.ctx.masterdata.get().await {
            Ok(s) => s,
            Err(e) => return reject(run_id, codes::RESUME_FAILED, e.to_string()),
        };
        state.masterdata_version = Some(snapshot.version);
        state.masterdata = Some(snapshot.clone());

        let decision = &request.decision;
        apply_decision(&mut state, decision, &snapshot);

        let resume_node = determine_resume_node(decision);
        if !RESUME_WHITELIST.contains(&resume_node) {
            return reject(
                run_id,
                codes::INVALID_RESUME_NODE,
                format!("resume node {resume_node} is not allowed"),
            );
        }

        // The reviewer may have changed the key inputs; recompute and
        // honour a prior success before touching any external system.
        let inputs_changed = decision.selected_customer_id.is_some()
            || decision.selected_attachment_id.is_some();
        let mut entry = resume_node;
        if inputs_changed {
            let file_sha = state
                .pdf_attachment
                .as_ref()
                .and_then(|a| a.sha256.clone())
                .unwrap_or_default();
            let customer_id = state.customer_id().unwrap_or_default().to_string();
            let canonical = idempotency_key(
                &state.email_event.message_id,
                &file_sha,
                &customer_id,
            );
            match self.ctx.idempotency.get(&canonical).await {
                Ok(Some(record)) if record.status == Status::Success => {
                    info!(
                        target: "ino.review",
                        run_id = %run_id,
                        "recomputed key hit a prior success, finalizing without external calls"
                    );
                    state.erp_result = Some(ErpCreateOrderResult {
                        ok: true,
                        sales_order_no: record.sales_order_no,
                        order_url: record.order_url,
                        errors: vec![],
                    });
                    entry = NodeId::Finalize;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(target: "ino.review", run_id = %run_id, error = %e, "ledger lookup failed");
                }
            }
            state.idempotency_key = Some(canonical);
        }

        if let Err(e) = self
            .ctx
            .runs
            .update_run(run_id, Status::Running, None, None, None, None)
            .await
        {
            return reject(run_id, codes::DATABASE_ERROR, e.to_string());
        }
        if let Err(e) = self.ctx.checkpoint.update(run_id, &state).await {
            return reject(run_id, codes::RESUME_FAILED, e.to_string());
        }

        match self
            .orchestration
            .resume(state, entry, &CancellationToken::new())
            .await
        {
            Ok(_result) => ManualReviewResponse {
                ok: true,
                run_id: run_id.to_string(),
                status: Some("RESUMING".into()),
                resume: Some(json!({
                    "from_node": entry.as_str(),
                    "planned_path": planned_path(entry),
                })),
                audit_id: Some(audit_id),
                ..Default::default()
            },
            Err(e) => reject(run_id, codes::RESUME_FAILED, e.to_string()),
        }
    }
}
