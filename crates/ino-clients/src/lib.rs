// SPDX-License-Identifier: MIT OR Apache-2.0
//! Clients for the external collaborators: the LLM chat-flow vendor, the
//! ERP gateway, the blob store, and the notification mailer.
//!
//! Only the interfaces of these systems matter to the orchestration; each
//! client maps transport failures into data (`ok = false` results or typed
//! errors) and applies retry/backoff where the failure is transient.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod blob;
mod erp;
mod llm;
mod mailer;

pub use blob::{BlobClient, BlobError, LocalBlobStore};
pub use erp::{ErpClient, ErpError, ErpOrder};
pub use llm::{LlmClient, LlmFile, parse_json_answer};
pub use mailer::{
    HttpMailer, NotificationContext, Notifier, NotifyError, NullNotifier, render_notification,
};
