// SPDX-License-Identifier: MIT OR Apache-2.0
//! ERP gateway client.
//!
//! `POST /api/orders` with the order payload. 401 and other 4xx are
//! permanent; network errors and 5xx are transient and get three attempts
//! in total with exponential backoff.

use ino_retry::{RetryConfig, retry_async};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

/// A created order as reported by the ERP.
#[derive(Clone, Debug, PartialEq)]
pub struct ErpOrder {
    /// Assigned sales-order number.
    pub sales_order_no: String,
    /// URL of the created order.
    pub order_url: Option<String>,
}

/// Typed ERP failures.
#[derive(Debug, thiserror::Error)]
pub enum ErpError {
    /// HTTP 401; credentials rejected. Never retried.
    #[error("erp rejected credentials")]
    AuthFailed,
    /// Other 4xx; the order was refused. Never retried.
    #[error("erp refused the order (http {status})")]
    CreateFailed {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// 2xx with a body missing `sales_order_no`.
    #[error("erp response missing sales_order_no")]
    InvalidResponse,
    /// Network error or 5xx after retries.
    #[error("erp unreachable: {0}")]
    Connection(String),
}

impl ErpError {
    fn is_transient(&self) -> bool {
        matches!(self, ErpError::Connection(_))
    }
}

/// ERP gateway client.
#[derive(Clone)]
pub struct ErpClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    tenant_id: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl ErpClient {
    /// Create a client for the configured ERP.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        tenant_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            tenant_id: tenant_id.into(),
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

    /// Submit an order payload.
    ///
    /// # Errors
    ///
    /// Returns a typed [`ErpError`]; only connection-class failures were
    /// retried before surfacing.
    pub async fn create_order(&self, payload: &Value) -> Result<ErpOrder, ErpError> {
        let url = format!("{}/api/orders", self.base_url);
        let client = &self.client;
        let api_key = &self.api_key;
        let tenant_id = &self.tenant_id;
        let timeout = self.timeout;
        let url = &url;
        let outcome = retry_async(
            &self.retry,
            move || async move {
                let mut req = client.post(url.as_str()).timeout(timeout).json(payload);
                if !api_key.is_empty() {
                    req = req.header("X-API-Key", api_key);
                }
                if !tenant_id.is_empty() {
                    req = req.header("X-Tenant-ID", tenant_id);
                }
                let resp = req
                    .send()
                    .await
                    .map_err(|e| ErpError::Connection(e.to_string()))?;
                let status = resp.status();
                if status.as_u16() == 401 {
                    return Err(ErpError::AuthFailed);
                }
                if status.is_server_error() {
                    return Err(ErpError::Connection(format!("http {status}")));
                }
                if status.is_client_error() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(ErpError::CreateFailed {
                        status: status.as_u16(),
                        body,
                    });
                }
                let body: Value = resp
                    .json()
                    .await
                    .map_err(|_| ErpError::InvalidResponse)?;
                let sales_order_no = body
                    .get("sales_order_no")
                    .and_then(Value::as_str)
                    .ok_or(ErpError::InvalidResponse)?
                    .to_string();
                let order_url = body
                    .get("order_url")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Ok(ErpOrder {
                    sales_order_no,
                    order_url,
                })
            },
            ErpError::is_transient,
        )
        .await?;

        info!(
            target: "ino.erp",
            sales_order_no = %outcome.value.sales_order_no,
            attempts = outcome.metadata.total_attempts,
            "order created"
        );
        Ok(outcome.value)
    }
}
