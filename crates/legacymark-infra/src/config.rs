//! Configuration loader for LegacyMark.
//!
//! Reads `config.toml` from the data directory (`~/.legacymark/` in
//! production) into [`AutomationConfig`], falling back to defaults when the
//! file is missing or malformed. Secrets are then moved out of the plain
//! config into [`SecretString`]s, with environment variables taking priority
//! over the file.

use std::path::{Path, PathBuf};

use legacymark_types::config::AutomationConfig;
use secrecy::SecretString;

pub const DATA_DIR_ENV: &str = "LEGACYMARK_DATA_DIR";
pub const API_KEY_ENV: &str = "AUTOMATION_API_KEY";
pub const RESEND_API_KEY_ENV: &str = "RESEND_API_KEY";

/// Loaded configuration with secrets split out.
#[derive(Debug, Default)]
pub struct Settings {
    /// Everything except the secrets, which are always `None` here.
    pub automation: AutomationConfig,
    /// Expected `x-api-key` value. `None` means every protected call is rejected.
    pub api_key: Option<SecretString>,
    pub resend_api_key: Option<SecretString>,
}

/// Resolve the data directory: `LEGACYMARK_DATA_DIR`, else `~/.legacymark`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".legacymark");
    }

    PathBuf::from(".legacymark")
}

/// Load `{data_dir}/config.toml`, or the defaults when it is missing or invalid.
pub async fn load_automation_config(data_dir: &Path) -> AutomationConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AutomationConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AutomationConfig::default();
        }
    };

    match toml::from_str::<AutomationConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            AutomationConfig::default()
        }
    }
}

/// Load the config file and apply secret overrides from the process environment.
pub async fn load_settings(data_dir: &Path) -> Settings {
    let config = load_automation_config(data_dir).await;
    split_secrets(config, |key| std::env::var(key).ok())
}

fn split_secrets(mut config: AutomationConfig, env: impl Fn(&str) -> Option<String>) -> Settings {
    let api_key = pick_secret(env(API_KEY_ENV), config.automation_api_key.take());
    let resend_api_key = pick_secret(env(RESEND_API_KEY_ENV), config.email.resend_api_key.take());

    if api_key.is_none() {
        tracing::warn!("no automation API key configured; protected routes will reject all calls");
    }

    Settings {
        automation: config,
        api_key,
        resend_api_key,
    }
}

fn pick_secret(from_env: Option<String>, from_file: Option<String>) -> Option<SecretString> {
    from_env
        .filter(|v| !v.trim().is_empty())
        .or(from_file.filter(|v| !v.trim().is_empty()))
        .map(SecretString::from)
}
