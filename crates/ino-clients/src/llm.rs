// SPDX-License-Identifier: MIT OR Apache-2.0
//! Client for the LLM chat-flow vendor.
//!
//! Requests are blocking chat calls; the response's `answer` field carries
//! a JSON document, possibly wrapped in a fenced code block. Failures map
//! to `{ok: false, reason, raw_answer}` values rather than errors so nodes
//! can fold them into the run state.

use ino_retry::{RetryConfig, retry_async};
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

/// A remote file reference passed to a chat-flow.
#[derive(Clone, Debug, Serialize)]
pub struct LlmFile {
    /// Always `"file"`.
    pub r#type: String,
    /// Always `"remote_url"`.
    pub transfer_method: String,
    /// URL the vendor downloads the file from.
    pub url: String,
}

impl LlmFile {
    /// Reference a remote file by URL.
    #[must_use]
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            r#type: "file".into(),
            transfer_method: "remote_url".into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CallError {
    #[error("llm transport error: {0}")]
    Transport(String),
    #[error("llm http {status}")]
    Http { status: u16, body: String },
}

impl CallError {
    // 429 is treated as transient alongside 5xx and timeouts.
    fn is_transient(&self) -> bool {
        match self {
            CallError::Transport(_) => true,
            CallError::Http { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// Chat-flow client bound to one vendor app (base URL + app key).
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    app_key: String,
    api_path: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl LlmClient {
    /// Create a client for one chat-flow app.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        app_key: impl Into<String>,
        api_path: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_key: app_key.into(),
            api_path: api_path.into(),
            timeout,
            retry: RetryConfig::default(),
        }
    }

    /// Override the retry policy (tests use fast backoff).
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Invoke the chat-flow and return the parsed answer document.
    ///
    /// Transport errors, non-2xx responses after retries, and unparseable
    /// answers all come back as `{ok: false, reason, raw_answer}`.
    pub async fn chat(
        &self,
        query: &str,
        user: &str,
        inputs: Value,
        files: Option<Vec<LlmFile>>,
    ) -> Value {
        let url = format!("{}{}", self.base_url, self.api_path);
        let mut payload = json!({
            "inputs": inputs,
            "query": query,
            "user": user,
            "response_mode": "blocking",
        });
        if let Some(files) = files {
            payload["files"] = json!(files);
        }

        let client = &self.client;
        let app_key = &self.app_key;
        let timeout = self.timeout;
        let url = &url;
        let payload = &payload;
        let outcome = retry_async(
            &self.retry,
            move || async move {
                let resp = client
                    .post(url.as_str())
                    .bearer_auth(app_key)
                    .timeout(timeout)
                    .json(payload)
                    .send()
                    .await
                    .map_err(|e| CallError::Transport(e.to_string()))?;
                let status = resp.status();
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(CallError::Http {
                        status: status.as_u16(),
                        body,
                    });
                }
                resp.json::<Value>()
                    .await
                    .map_err(|e| CallError::Transport(e.to_string()))
            },
            CallError::is_transient,
        )
        .await;

        let body = match outcome {
            Ok(outcome) => {
                debug!(
                    target: "ino.llm",
                    attempts = outcome.metadata.total_attempts,
                    "chat-flow call succeeded"
                );
                outcome.value
            }
            Err(err) => {
                warn!(target: "ino.llm", error = %err, "chat-flow call failed");
                return json!({
                    "ok": false,
                    "reason": format!("chat-flow call failed: {err}"),
                    "raw_answer": Value::Null,
                });
            }
        };

        let answer = body.get("answer").and_then(Value::as_str).unwrap_or("");
        parse_json_answer(answer)
    }
}

/// Parse a chat-flow answer into JSON, tolerating fenced code blocks and
/// surrounding prose.
#[must_use]
pub fn parse_json_answer(answer: &str) -> Value {
    if let Ok(v) = serde_json::from_str::<Value>(answer) {
        return v;
    }

    // ```json ... ``` fences.
    if let Some(start) = answer.find("```json") {
        let rest = &answer[start + 7..];
        if let Some(end) = rest.find("```")
            && let Ok(v) = serde_json::from_str::<Value>(rest[..end].trim())
        {
            return v;
        }
    }

    // First '{' to last '}'.
    if let (Some(start), Some(end)) = (answer.find('{'), answer.rfind('}'))
        && end > start
        && let Ok(v) = serde_json::from_str::<Value>(&answer[start..=end])
    {
        return v;
    }

    json!({
        "ok": false,
        "reason": "failed to parse JSON from chat-flow answer",
        "raw_answer": answer,
    })
}
