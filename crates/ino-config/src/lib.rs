// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the inorder platform.
//!
//! This crate provides [`AppConfig`], the top-level runtime settings,
//! together with helpers for loading from TOML files, applying environment
//! overrides, and producing advisory [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A channel has no sender whitelist; every sender is accepted.
    OpenWhitelist {
        /// Channel name.
        channel: String,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::OpenWhitelist { channel } => {
                write!(f, "channel '{channel}' has no whitelist; all senders accepted")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Checkpoint-store backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointBackend {
    /// In-process map; tests and single-process dev.
    Memory,
    /// Durable JSON-file KV under `durable_dir`.
    Durable,
}

/// Contract-signal detection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalPolicy {
    /// Accept every message as a contract mail.
    Passthrough,
    /// Require the contract keyword plus a PDF attachment.
    Strict,
}

/// LLM chat-flow routing and credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL for the contract-recognition app.
    pub contract_url: String,
    /// API key for the contract-recognition app.
    pub contract_key: String,
    /// Base URL for the order-payload app.
    pub order_url: String,
    /// API key for the order-payload app.
    pub order_key: String,
    /// Chat endpoint path.
    pub api_path: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            contract_url: String::new(),
            contract_key: String::new(),
            order_url: String::new(),
            order_key: String::new(),
            api_path: "/v1/chat-messages".into(),
            timeout_secs: 120,
        }
    }
}

/// ERP gateway credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct ErpConfig {
    /// ERP base URL.
    pub base_url: String,
    /// API key sent as `X-API-Key`.
    pub api_key: String,
    /// Tenant id sent as `X-Tenant-ID`.
    pub tenant_id: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ErpConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            tenant_id: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Blob-store settings (remote upload endpoint plus local artifact root).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct BlobConfig {
    /// Remote blob-store base URL.
    pub base_url: String,
    /// Remote blob-store API key.
    pub api_key: String,
    /// Local artifact root directory.
    pub base_dir: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            base_dir: "public/files".into(),
        }
    }
}

/// Outbound notification-mail settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct MailConfig {
    /// Mail API base URL.
    pub base_url: String,
    /// Mail API key.
    pub api_key: String,
    /// Sender address for notifications.
    pub sender: String,
}

/// Master-data service settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct MasterdataConfig {
    /// Master-data service base URL.
    pub base_url: String,
    /// Master-data service API key.
    pub api_key: String,
    /// Snapshot cache TTL in seconds.
    pub cache_ttl_seconds: u64,
}

impl Default for MasterdataConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            cache_ttl_seconds: 300,
        }
    }
}

/// REST-mailbox adapter settings (OAuth2 client credentials).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct MailboxConfig {
    /// Provider API base URL.
    pub base_url: String,
    /// OAuth2 client id.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
    /// Mailbox account to poll.
    pub account: String,
    /// Folder identifier to poll.
    pub folder_id: String,
    /// Maximum messages fetched per poll.
    pub poll_size: u32,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            account: String::new(),
            folder_id: "2".into(),
            poll_size: 100,
        }
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment environment: `dev`, `staging`, or `prod`.
    pub app_env: String,
    /// Log level override (`error`..`trace`).
    pub log_level: String,
    /// Daemon bind address.
    pub bind: String,
    /// Channel names to start listeners for.
    pub enabled_listeners: Vec<String>,
    /// Scheduler period per channel, in seconds.
    pub poll_interval_seconds: u64,
    /// Checkpoint backend selector.
    pub checkpoint_backend: CheckpointBackend,
    /// Root directory for durable stores (checkpoints, ledgers, audit).
    pub durable_dir: String,
    /// Contract-signal policy.
    pub signal_policy: SignalPolicy,
    /// Keyword that marks a contract mail under the strict policy.
    pub contract_keyword: String,
    /// Per-step timeout in seconds.
    pub step_timeout_seconds: u64,
    /// Per-channel sender whitelists; empty list means allow all.
    pub channel_allow_from: BTreeMap<String, Vec<String>>,
    /// LLM settings.
    pub llm: LlmConfig,
    /// ERP settings.
    pub erp: ErpConfig,
    /// Blob-store settings.
    pub blob: BlobConfig,
    /// Notification-mail settings.
    pub mail: MailConfig,
    /// Master-data settings.
    pub masterdata: MasterdataConfig,
    /// REST-mailbox adapter settings.
    pub mailbox: MailboxConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_env: "dev".into(),
            log_level: "info".into(),
            bind: "127.0.0.1:8090".into(),
            enabled_listeners: vec!["email".into()],
            poll_interval_seconds: 60,
            checkpoint_backend: CheckpointBackend::Memory,
            durable_dir: ".inorder".into(),
            signal_policy: SignalPolicy::Strict,
            contract_keyword: "采购合同".into(),
            step_timeout_seconds: 180,
            channel_allow_from: BTreeMap::new(),
            llm: LlmConfig::default(),
            erp: ErpConfig::default(),
            blob: BlobConfig::default(),
            mail: MailConfig::default(),
            masterdata: MasterdataConfig::default(),
            mailbox: MailboxConfig::default(),
        }
    }
}

impl AppConfig {
    /// Whitelist for a channel; `None` when the channel allows all senders.
    #[must_use]
    pub fn allow_list(&self, channel: &str) -> Option<&[String]> {
        self.channel_allow_from
            .get(channel)
            .filter(|list| !list.is_empty())
            .map(Vec::as_slice)
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Recognised deployment environments.
const VALID_ENVS: &[&str] = &["dev", "staging", "prod"];

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load an [`AppConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`AppConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file is missing or unparseable.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => AppConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into an [`AppConfig`].
///
/// # Errors
///
/// Returns [`ConfigError::ParseError`] on malformed TOML.
pub fn parse_toml(content: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str::<AppConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables: `APP_ENV`, `LOG_LEVEL`, `ENABLED_LISTENERS`
/// (comma list), `POLL_INTERVAL_SECONDS`, `CHECKPOINT_BACKEND`
/// (`memory`/`durable`), `CHANNEL_ALLOW_FROM` (JSON map),
/// `LLM_CONTRACT_URL`, `LLM_CONTRACT_KEY`, `LLM_ORDER_URL`,
/// `LLM_ORDER_KEY`, `ERP_BASE_URL`, `ERP_API_KEY`, `ERP_TENANT_ID`,
/// `BLOB_BASE_DIR`, `CACHE_TTL_SECONDS`.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(val) = std::env::var("APP_ENV") {
        config.app_env = val;
    }
    if let Ok(val) = std::env::var("LOG_LEVEL") {
        config.log_level = val.to_lowercase();
    }
    if let Ok(val) = std::env::var("ENABLED_LISTENERS") {
        config.enabled_listeners = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Ok(val) = std::env::var("POLL_INTERVAL_SECONDS")
        && let Ok(secs) = val.parse()
    {
        config.poll_interval_seconds = secs;
    }
    if let Ok(val) = std::env::var("CHECKPOINT_BACKEND") {
        match val.as_str() {
            "memory" => config.checkpoint_backend = CheckpointBackend::Memory,
            "durable" => config.checkpoint_backend = CheckpointBackend::Durable,
            _ => {}
        }
    }
    if let Ok(val) = std::env::var("CHANNEL_ALLOW_FROM")
        && let Ok(map) = serde_json::from_str::<BTreeMap<String, Vec<String>>>(&val)
    {
        config.channel_allow_from = map;
    }
    if let Ok(val) = std::env::var("LLM_CONTRACT_URL") {
        config.llm.contract_url = val;
    }
    if let Ok(val) = std::env::var("LLM_CONTRACT_KEY") {
        config.llm.contract_key = val;
    }
    if let Ok(val) = std::env::var("LLM_ORDER_URL") {
        config.llm.order_url = val;
    }
    if let Ok(val) = std::env::var("LLM_ORDER_KEY") {
        config.llm.order_key = val;
    }
    if let Ok(val) = std::env::var("ERP_BASE_URL") {
        config.erp.base_url = val;
    }
    if let Ok(val) = std::env::var("ERP_API_KEY") {
        config.erp.api_key = val;
    }
    if let Ok(val) = std::env::var("ERP_TENANT_ID") {
        config.erp.tenant_id = val;
    }
    if let Ok(val) = std::env::var("BLOB_BASE_DIR") {
        config.blob.base_dir = val;
    }
    if let Ok(val) = std::env::var("CACHE_TTL_SECONDS")
        && let Ok(secs) = val.parse()
    {
        config.masterdata.cache_ttl_seconds = secs;
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (unknown environment, zero poll interval) are returned as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] listing every hard failure.
pub fn validate_config(config: &AppConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if !VALID_ENVS.contains(&config.app_env.as_str()) {
        errors.push(format!("invalid app_env '{}'", config.app_env));
    }
    if !VALID_LOG_LEVELS.contains(&config.log_level.as_str()) {
        errors.push(format!("invalid log_level '{}'", config.log_level));
    }
    if config.poll_interval_seconds == 0 {
        errors.push("poll_interval_seconds must be positive".into());
    }
    if config.step_timeout_seconds == 0 {
        errors.push("step_timeout_seconds must be positive".into());
    }
    if config.durable_dir.trim().is_empty() {
        errors.push("durable_dir must not be empty".into());
    }

    for channel in &config.enabled_listeners {
        if config.allow_list(channel).is_none() {
            warnings.push(ConfigWarning::OpenWhitelist {
                channel: channel.clone(),
            });
        }
    }
    if config.erp.base_url.is_empty() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "erp.base_url".into(),
            hint: "order submission will fail until the ERP is configured".into(),
        });
    }
    if config.mail.base_url.is_empty() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "mail.base_url".into(),
            hint: "sales notifications will be skipped".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
