//! Server Configuration

use anyhow::Context;
use serde::{Deserialize, Serialize};
use survey_core::PhoneNumber;
use tracing::warn;

pub const CONFIG_PATH_ENV: &str = "SURVEY_CONFIG";
pub const JWT_SECRET_ENV: &str = "SURVEY_JWT_SECRET";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/survey/server.json";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,
    /// HMAC secret for access and refresh tokens
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    /// Lifetime of a one-time password
    pub otp_ttl_seconds: i64,
    /// Deepest allowed panel nesting in a form definition
    pub max_question_depth: usize,
    /// Buffered updates per live feed topic
    pub live_channel_capacity: usize,
    /// Accounts created as superusers at startup
    pub bootstrap_admins: Vec<PhoneNumber>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
            jwt_secret: "survey-dev-secret-change-in-production".into(),
            access_token_minutes: 60,
            refresh_token_days: 7,
            otp_ttl_seconds: 120,
            max_question_depth: survey_core::domain::services::DEFAULT_MAX_DEPTH,
            live_channel_capacity: survey_core::infrastructure::live::DEFAULT_CHANNEL_CAPACITY,
            bootstrap_admins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load from file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path))
    }

    /// Config from `$SURVEY_CONFIG` (defaults when unreadable), with the
    /// secret overridable through `$SURVEY_JWT_SECRET`.
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = Self::from_file(&path).unwrap_or_else(|error| {
            warn!(%path, error = %error, "Falling back to default server config");
            Self::default()
        });

        if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
            config.jwt_secret = secret;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults() {
        let config: ServerConfig = serde_json::from_str(
            r#"{ "bind_addr": "127.0.0.1:9000", "bootstrap_admins": ["09120000000"] }"#,
        )
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.otp_ttl_seconds, 120);
        assert_eq!(config.bootstrap_admins.len(), 1);
    }

    #[test]
    fn invalid_admin_phone_rejects_the_file() {
        let parsed = serde_json::from_str::<ServerConfig>(r#"{ "bootstrap_admins": ["12345"] }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(ServerConfig::from_file("/nonexistent/survey.json").is_err());
    }
}
