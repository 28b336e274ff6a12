// SPDX-License-Identifier: MIT OR Apache-2.0
//! Outbound notification mail.
//!
//! The notifier renders a status-specific template and sends it through a
//! mail API. Sending never blocks orchestration; failures surface as
//! warnings on the run state, not errors.

use async_trait::async_trait;
use ino_core::Status;
use serde_json::json;
use tracing::warn;

/// Errors from the notifier (always downgraded to warnings by callers).
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The mail API was unreachable or answered non-2xx.
    #[error("mail send failed: {0}")]
    Send(String),
    /// The notifier is not configured.
    #[error("mailer not configured")]
    NotConfigured,
}

/// Outbound mail seam.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one message.
    async fn send(&self, to: &str, subject: &str, body_html: &str) -> Result<(), NotifyError>;
}

// ---------------------------------------------------------------------------
// HTTP mailer
// ---------------------------------------------------------------------------

/// Notifier backed by an HTTP mail API.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    sender: String,
}

impl HttpMailer {
    /// Create a mailer for the configured API.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    async fn send(&self, to: &str, subject: &str, body_html: &str) -> Result<(), NotifyError> {
        if self.base_url.is_empty() {
            return Err(NotifyError::NotConfigured);
        }
        let body = json!({
            "from": self.sender,
            "to": to,
            "subject": subject,
            "body_html": body_html,
        });
        let mut req = self
            .client
            .post(format!("{}/v1/mail/send", self.base_url))
            .json(&body);
        if !self.api_key.is_empty() {
            req = req.header("X-API-Key", &self.api_key);
        }
        let resp = req.send().await.map_err(|e| NotifyError::Send(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(NotifyError::Send(format!("http {}", resp.status())));
        }
        Ok(())
    }
}

/// Notifier that drops messages (tests, unconfigured deployments).
#[derive(Debug, Default, Clone)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, to: &str, _subject: &str, _body_html: &str) -> Result<(), NotifyError> {
        warn!(target: "ino.mailer", to = %to, "notifier unconfigured, dropping message");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Context for rendering a notification.
#[derive(Debug, Default, Clone)]
pub struct NotificationContext {
    /// Message the run processed.
    pub message_id: String,
    /// Sales-order number on success.
    pub sales_order_no: Option<String>,
    /// Order URL on success.
    pub order_url: Option<String>,
    /// Matched customer name on success.
    pub customer_name: Option<String>,
    /// Pause reason code for manual review.
    pub reason_code: Option<String>,
    /// Candidate counts `(pdfs, customers, contacts)` for manual review.
    pub candidate_counts: (usize, usize, usize),
    /// Error summaries.
    pub errors: Vec<String>,
}

/// Render the status-specific subject and HTML body.
#[must_use]
pub fn render_notification(status: Status, ctx: &NotificationContext) -> (String, String) {
    let subject = format!("订单处理结果 - {status}");
    let body = match status {
        Status::Success => {
            let order_no = ctx.sales_order_no.as_deref().unwrap_or("-");
            let order_url = ctx.order_url.as_deref().unwrap_or("-");
            let customer = ctx.customer_name.as_deref().unwrap_or("Unknown");
            format!(
                "<p>Order created for <b>{customer}</b>.</p>\
                 <p>Sales order: <b>{order_no}</b><br>\
                 Order link: <a href=\"{order_url}\">{order_url}</a><br>\
                 Message: {}</p>",
                ctx.message_id
            )
        }
        Status::ManualReview | Status::UnknownContact => {
            let reason = ctx.reason_code.as_deref().unwrap_or("MANUAL_REVIEW");
            let (pdfs, customers, contacts) = ctx.candidate_counts;
            format!(
                "<p>The run for message {} is waiting for review.</p>\
                 <p>Reason: <b>{reason}</b><br>\
                 Candidates: {pdfs} PDF(s), {customers} customer(s), {contacts} contact(s)</p>",
                ctx.message_id
            )
        }
        _ => {
            let errors = if ctx.errors.is_empty() {
                "-".to_string()
            } else {
                ctx.errors.join("; ")
            };
            format!(
                "<p>Processing message {} finished with status <b>{status}</b>.</p>\
                 <p>Errors: {errors}</p>",
                ctx.message_id
            )
        }
    };
    (subject, body)
}
