// SPDX-License-Identifier: MIT OR Apache-2.0
//! Load the master-data snapshot through the read-through cache.
//!
//! Fatal when the provider stays unreachable across retries: the run is
//! marked FAILED and the walk jumps to finalize.

use crate::GraphContext;
use ino_core::{RunState, StateDelta, Status, codes, now_iso};
use ino_retry::retry_async;
use tracing::error;

pub(crate) async fn run(ctx: &GraphContext, state: &RunState) -> StateDelta {
    let outcome = retry_async(&ctx.retry, || ctx.masterdata.get(), |_| true).await;

    match outcome {
        Ok(outcome) => {
            let snapshot = outcome.value;
            StateDelta {
                masterdata_version: Some(snapshot.version),
                masterdata: Some(snapshot),
                ..Default::default()
            }
        }
        Err(e) => {
            error!(
                target: "ino.graph",
                run_id = %state.run_id,
                error = %e,
                "masterdata unavailable after retries"
            );
            let mut delta =
                StateDelta::error(codes::MASTERDATA_INVALID, format!("failed to load master data: {e}"));
            delta.final_status = Some(Status::Failed);
            delta.finished_at = Some(now_iso());
            delta
        }
    }
}
