// SPDX-License-Identifier: MIT OR Apache-2.0
//! The graph walk: execute nodes sequentially, merge deltas, audit, and
//! checkpoint at every step boundary.
//!
//! Concurrency model: runs execute in parallel, nodes within a run are
//! strictly sequential. Cancellation is observed between steps and races
//! in-flight node execution; a cancelled step's delta is discarded, so the
//! checkpoint holds either the pre-call or the post-call state, never a
//! mix.

use crate::{CancellationToken, GraphContext, NodeId, next_node, nodes};
use ino_core::{RunState, StateDelta};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Fatal engine failures (node-level problems are folded into the state).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A checkpoint write failed; the walk cannot guarantee resumability.
    #[error(transparent)]
    Checkpoint(#[from] ino_checkpoint::CheckpointError),
    /// The caller cancelled the run.
    #[error("run cancelled at node {node}")]
    Cancelled {
        /// Node that was about to run (or running) when cancelled.
        node: String,
    },
}

/// Executes graph walks against a shared context.
#[derive(Clone)]
pub struct Engine {
    ctx: Arc<GraphContext>,
}

impl Engine {
    /// Create an engine over the given context.
    #[must_use]
    pub fn new(ctx: Arc<GraphContext>) -> Self {
        Self { ctx }
    }

    /// Walk the graph from `entry` until a terminal node, returning the
    /// final state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] on cancellation or when checkpointing
    /// fails; the last successfully checkpointed state remains loadable.
    pub async fn run(
        &self,
        mut state: RunState,
        entry: NodeId,
        cancel: &CancellationToken,
    ) -> Result<RunState, EngineError> {
        let mut node = Some(entry);

        while let Some(current) = node {
            if cancel.is_cancelled() {
                self.ctx
                    .checkpoint
                    .save(&state.run_id, current.as_str(), &state)
                    .await?;
                return Err(EngineError::Cancelled {
                    node: current.as_str().to_string(),
                });
            }

            debug!(
                target: "ino.graph",
                run_id = %state.run_id,
                node = %current,
                "executing node"
            );
            let started = Instant::now();

            let delta = tokio::select! {
                () = cancel.cancelled() => {
                    // Discard the in-flight delta; persist the pre-call state.
                    self.ctx
                        .checkpoint
                        .save(&state.run_id, current.as_str(), &state)
                        .await?;
                    return Err(EngineError::Cancelled {
                        node: current.as_str().to_string(),
                    });
                }
                result = tokio::time::timeout(
                    self.ctx.step_timeout(),
                    nodes::execute(current, &self.ctx, &state),
                ) => match result {
                    Ok(delta) => delta,
                    Err(_) => {
                        warn!(
                            target: "ino.graph",
                            run_id = %state.run_id,
                            node = %current,
                            "step timed out"
                        );
                        StateDelta::error(
                            "STEP_TIMEOUT",
                            format!("node {current} exceeded the step timeout"),
                        )
                    }
                },
            };

            let step_ok = delta.errors.is_empty();
            state.apply(delta);

            self.ctx.metrics.record(
                current.as_str(),
                started.elapsed().as_millis() as u64,
                step_ok,
            );
            if let Err(e) = self
                .ctx
                .audit
                .append(
                    &state.run_id,
                    current.as_str(),
                    json!({
                        "node": current.as_str(),
                        "ok": step_ok,
                        "error_count": state.errors.len(),
                    }),
                )
                .await
            {
                warn!(target: "ino.graph", run_id = %state.run_id, error = %e, "audit append failed");
                state.warnings.push(format!("audit append failed: {e}"));
            }

            self.ctx
                .checkpoint
                .save(&state.run_id, current.as_str(), &state)
                .await?;

            node = next_node(current, &state);
        }

        Ok(state)
    }
}
