// SPDX-License-Identifier: MIT OR Apache-2.0
//! Multi-channel ingestion: channel adapters normalize provider messages
//! into [`InboundMessage`](ino_core::InboundMessage)s, and the scheduler
//! polls, de-duplicates against the message ledger, persists attachments,
//! and hands runs to the orchestration graph.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod oauth;
mod restmail;
mod scheduler;
mod webhook;

pub use adapter::{AdapterError, ChannelAdapter};
pub use oauth::OAuthTokenManager;
pub use restmail::RestMailboxAdapter;
pub use scheduler::{InboundHandler, ListenerScheduler, SweepReport};
pub use webhook::WebhookAdapter;
