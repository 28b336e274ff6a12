// SPDX-License-Identifier: MIT OR Apache-2.0
//! The durable, resumable orchestration graph over sales-email runs.
//!
//! A run is a typed state machine walk: each node reads the
//! [`RunState`](ino_core::RunState), returns a sparse delta, and the engine
//! merges, audits, and checkpoints at every step boundary. Branching is a
//! pure function of the state, which makes resume deterministic: a paused
//! run re-enters at a whitelisted node with a patched state and walks the
//! same edges.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod candidates;
mod cancel;
mod context;
mod engine;
mod node;
pub mod nodes;
mod service;

pub use cancel::CancellationToken;
pub use context::GraphContext;
pub use engine::{Engine, EngineError};
pub use node::{NodeId, RESUME_WHITELIST, next_node};
pub use service::{OrchestrationService, ServiceError};
