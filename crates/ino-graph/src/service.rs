// SPDX-License-Identifier: MIT OR Apache-2.0
//! Orchestration entry points used by the admin surface and the listener.

use crate::{CancellationToken, Engine, EngineError, GraphContext, NodeId};
use ino_core::{InboundMessage, RunResult, RunState, Status, now_iso};
use ino_ledger::{LedgerError, RunRecord};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Failures surfaced to callers of the orchestration service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The inbound message failed validation.
    #[error("invalid inbound message: {0}")]
    InvalidMessage(String),
    /// A ledger operation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// The engine aborted.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Runs the sales-email graph for inbound messages.
#[derive(Clone)]
pub struct OrchestrationService {
    ctx: Arc<GraphContext>,
    engine: Engine,
}

impl OrchestrationService {
    /// Create a service over the given context.
    #[must_use]
    pub fn new(ctx: Arc<GraphContext>) -> Self {
        let engine = Engine::new(ctx.clone());
        Self { ctx, engine }
    }

    /// The shared graph context.
    #[must_use]
    pub fn context(&self) -> &Arc<GraphContext> {
        &self.ctx
    }

    /// Process one inbound message end to end.
    ///
    /// Creates the run record, walks the graph from `check_idempotency`,
    /// and returns the caller-facing result. On an engine abort the run
    /// record is marked FAILED before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on validation failures, ledger failures,
    /// and engine aborts.
    pub async fn run_message(&self, event: InboundMessage) -> Result<RunResult, ServiceError> {
        let event = event.normalized();
        event
            .validate()
            .map_err(|e| ServiceError::InvalidMessage(e.to_string()))?;

        let run_id = Uuid::new_v4().to_string();
        info!(
            target: "ino.graph",
            run_id = %run_id,
            message_id = %event.message_id,
            sender = %event.sender_id,
            "starting sales-email orchestration"
        );

        let mut state = RunState::new(&run_id, event);
        state.tenant_id = self.ctx.tenant_id();

        self.ctx
            .runs
            .create_run(RunRecord {
                run_id: run_id.clone(),
                message_id: state.email_event.message_id.clone(),
                status: Status::Pending,
                started_at: state.started_at.clone().unwrap_or_else(now_iso),
                finished_at: None,
                state_json: None,
                errors: vec![],
                warnings: vec![],
            })
            .await?;

        self.drive(state, NodeId::CheckIdempotency, &CancellationToken::new())
            .await
    }

    /// Re-enter the graph for a patched state at a resume node.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on engine aborts.
    pub async fn resume(
        &self,
        state: RunState,
        entry: NodeId,
        cancel: &CancellationToken,
    ) -> Result<RunResult, ServiceError> {
        info!(
            target: "ino.graph",
            run_id = %state.run_id,
            node = %entry,
            "resuming sales-email orchestration"
        );
        self.drive(state, entry, cancel).await
    }

    async fn drive(
        &self,
        state: RunState,
        entry: NodeId,
        cancel: &CancellationToken,
    ) -> Result<RunResult, ServiceError> {
        let run_id = state.run_id.clone();
        match self.engine.run(state, entry, cancel).await {
            Ok(final_state) => Ok(RunResult::from_state(&final_state)),
            Err(e) => {
                error!(target: "ino.graph", run_id = %run_id, error = %e, "orchestration aborted");
                // Best effort: finalize never ran, leave a FAILED marker.
                let _ = self
                    .ctx
                    .runs
                    .update_run(&run_id, Status::Failed, Some(now_iso()), None, None, None)
                    .await;
                Err(e.into())
            }
        }
    }
}
