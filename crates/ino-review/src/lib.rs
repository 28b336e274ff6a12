// SPDX-License-Identifier: MIT OR Apache-2.0
//! The manual-review protocol.
//!
//! A paused run is a terminal status plus a checkpointed state; resuming is
//! a fresh graph invocation with a surgically patched state, entered at a
//! whitelisted node. This module validates submissions, applies the patch,
//! picks the resume node, and re-enters the graph. No long-lived in-memory
//! continuation exists anywhere.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod patch;
mod service;

pub use patch::{apply_decision, determine_resume_node, planned_path};
pub use service::ReviewService;
