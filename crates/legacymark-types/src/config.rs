//! Configuration types for LegacyMark.
//!
//! `AutomationConfig` represents the top-level `config.toml` that controls the
//! HTTP server, the executor's WAIT handling, outbound email and HTTP clients.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the automation engine.
///
/// Loaded from `~/.legacymark/config.toml`. All fields have sensible defaults.
/// The two secret fields are moved out into `SecretString`s by the infra
/// loader, so a loaded config never carries them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Shared secret expected in `x-api-key` on protected routes.
    #[serde(default, skip_serializing)]
    pub automation_api_key: Option<String>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub http: HttpClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Executor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// WAIT delays strictly below this many seconds sleep in process; longer
    /// ones park the execution until the resume poller picks it up.
    #[serde(default = "default_inline_wait_limit_secs")]
    pub inline_wait_limit_secs: u64,

    /// How often the resume poller looks for due WAITING executions.
    #[serde(default = "default_resume_poll_interval_secs")]
    pub resume_poll_interval_secs: u64,

    /// Maximum executions resumed per poll.
    #[serde(default = "default_resume_batch_size")]
    pub resume_batch_size: u32,
}

fn default_inline_wait_limit_secs() -> u64 {
    10
}

fn default_resume_poll_interval_secs() -> u64 {
    15
}

fn default_resume_batch_size() -> u32 {
    50
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            inline_wait_limit_secs: default_inline_wait_limit_secs(),
            resume_poll_interval_secs: default_resume_poll_interval_secs(),
            resume_batch_size: default_resume_batch_size(),
        }
    }
}

/// Outbound email (Resend) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_from_address")]
    pub from: String,

    /// Without a key, sends are logged and acknowledged with a mock id.
    #[serde(default, skip_serializing)]
    pub resend_api_key: Option<String>,

    #[serde(default = "default_email_api_base")]
    pub api_base: String,
}

fn default_from_address() -> String {
    "LegacyMark <onboarding@resend.dev>".to_string()
}

fn default_email_api_base() -> String {
    "https://api.resend.com".to_string()
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from: default_from_address(),
            resend_api_key: None,
            api_base: default_email_api_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}
