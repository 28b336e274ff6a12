// SPDX-License-Identifier: MIT OR Apache-2.0
//! Admin HTTP surface: thin controllers over the orchestration graph, the
//! manual-review protocol, and the listener scheduler.
#![deny(unsafe_code)]

pub mod middleware;
mod wiring;

pub use wiring::{build_context, build_scheduler};

use axum::{
    Json, Router,
    extract::{Extension, State},
    http::StatusCode,
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use ino_core::{InboundMessage, ManualReviewRequest, ManualReviewResponse, RunResult, now_iso};
use ino_graph::OrchestrationService;
use ino_listener::{ListenerScheduler, WebhookAdapter};
use ino_review::ReviewService;
use middleware::RequestId;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::error;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Orchestration entry point.
    pub orchestration: OrchestrationService,
    /// Manual-review protocol.
    pub review: ReviewService,
    /// Polling scheduler (admin-triggered sweeps).
    pub scheduler: Arc<ListenerScheduler>,
    /// Webhook ingress queue.
    pub webhook: Arc<WebhookAdapter>,
}

/// API failure carrying the request id for operator lookup.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    request_id: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>, request_id: Option<String>) -> Self {
        Self {
            status,
            message: message.into(),
            request_id,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "request_id": self.request_id,
        }));
        (self.status, body).into_response()
    }
}

/// Build the Axum router with all admin routes.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(cmd_health))
        .route("/v1/status", get(cmd_status))
        .route("/v1/orchestrations/sales-email/run", post(cmd_run))
        .route("/v1/orchestrations/sales-email/replay", post(cmd_replay))
        .route(
            "/v1/orchestrations/sales-email/manual-review/submit",
            post(cmd_submit_review),
        )
        .route("/v1/listener/trigger/poll", post(cmd_trigger_poll))
        .route("/v1/listener/webhook/inbound", post(cmd_webhook_inbound))
        .layer(from_fn(middleware::request_id_middleware))
        .with_state(state)
}

async fn cmd_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ctx = state.orchestration.context();
    let config = &ctx.config;

    let checkpoint_writable = ctx.checkpoint.healthy().await;
    let masterdata_reachable = ctx.masterdata.get().await.is_ok();
    let status = if checkpoint_writable && masterdata_reachable {
        "ok"
    } else {
        "degraded"
    };

    Json(json!({
        "status": status,
        "app_env": &config.app_env,
        "checkpoint_backend": config.checkpoint_backend,
        "listeners": &config.enabled_listeners,
        "components": {
            "checkpoint_writable": checkpoint_writable,
            "masterdata_reachable": masterdata_reachable,
        },
        "time": now_iso(),
    }))
}

async fn cmd_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ctx = state.orchestration.context();
    Json(json!({
        "status": "ok",
        "steps": ctx.metrics.summary(),
        "webhook_pending": state.webhook.pending_len(),
    }))
}

async fn cmd_run(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(event): Json<InboundMessage>,
) -> Result<Json<RunResult>, ApiError> {
    state
        .orchestration
        .run_message(event)
        .await
        .map(Json)
        .map_err(|e| {
            error!(target: "ino.daemon", request_id = %request_id, error = %e, "run failed");
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("orchestration failed: {e}"),
                Some(request_id),
            )
        })
}

#[derive(Debug, Deserialize)]
struct ReplayRequest {
    message_id: String,
}

async fn cmd_replay(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(req): Json<ReplayRequest>,
) -> Result<Json<RunResult>, ApiError> {
    let run = state
        .orchestration
        .context()
        .runs
        .find_run_by_message_id(&req.message_id)
        .await
        .map_err(|e| {
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                Some(request_id.clone()),
            )
        })?
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_FOUND,
                format!("no run found for message_id: {}", req.message_id),
                Some(request_id),
            )
        })?;

    let state_json = run.state_json.unwrap_or(Value::Null);
    Ok(Json(RunResult {
        run_id: run.run_id,
        message_id: run.message_id,
        status: run.status,
        started_at: Some(run.started_at),
        finished_at: run.finished_at,
        idempotency_key: state_json
            .get("idempotency_key")
            .and_then(Value::as_str)
            .map(str::to_string),
        customer_id: state_json
            .pointer("/matched_customer/customer_id")
            .and_then(Value::as_str)
            .map(str::to_string),
        contact_id: state_json
            .pointer("/matched_contact/contact_id")
            .and_then(Value::as_str)
            .map(str::to_string),
        file_url: None,
        sales_order_no: state_json
            .pointer("/erp_result/sales_order_no")
            .and_then(Value::as_str)
            .map(str::to_string),
        order_url: state_json
            .pointer("/erp_result/order_url")
            .and_then(Value::as_str)
            .map(str::to_string),
        warnings: run.warnings,
        errors: run.errors,
        manual_review: None,
    }))
}

async fn cmd_submit_review(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ManualReviewRequest>,
) -> Json<ManualReviewResponse> {
    Json(state.review.submit(request).await)
}

async fn cmd_trigger_poll(State(state): State<Arc<AppState>>) -> Json<Value> {
    let report = state.scheduler.sweep_all().await;
    Json(json!({
        "status": "ok",
        "dispatched": report.dispatched,
        "skipped": report.skipped,
        "failed": report.failed,
    }))
}

async fn cmd_webhook_inbound(
    State(state): State<Arc<AppState>>,
    Json(event): Json<InboundMessage>,
) -> Json<Value> {
    state.webhook.push(event);
    Json(json!({"status": "queued", "pending": state.webhook.pending_len()}))
}
