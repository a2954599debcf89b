// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Cloud Run injects secrets as environment variables via secret bindings,
//! so everything is read once at startup and kept in memory.

use std::env;

/// Cloud Tasks queue that carries campaign batch tasks.
pub const CAMPAIGN_QUEUE_NAME: &str = "campaign-delivery";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP region (Cloud Tasks location)
    pub gcp_region: String,
    /// Public URL of this service, used as the Cloud Tasks target
    pub api_url: String,
    /// Dashboard URL allowed by CORS
    pub frontend_url: String,
    /// Domain under which tenants get subdomains (e.g. `smartkindy.com`)
    pub base_domain: String,
    /// Server port
    pub port: u16,
    /// Fallback campaign webhook when neither campaign nor tenant sets one
    pub default_webhook_url: Option<String>,
    /// Soft wall-clock budget for one campaign batch, in seconds
    pub batch_time_budget_secs: u64,
    /// Longest message part sent in one call, in characters
    pub max_message_chars: usize,
    /// How long tenant settings stay cached, in seconds
    pub tenant_cache_ttl_secs: u64,

    // --- Secrets ---
    /// JWT signing key for dashboard sessions (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Shared token that Cloud Tasks requests must carry
    pub tasks_auth_token: String,
    /// Secret sent with the fallback campaign webhook
    pub default_webhook_secret: Option<String>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            gcp_region: "me-central1".to_string(),
            api_url: "http://localhost:8080".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            base_domain: "smartkindy.com".to_string(),
            port: 8080,
            default_webhook_url: None,
            batch_time_budget_secs: 100,
            max_message_chars: 1000,
            tenant_cache_ttl_secs: 300,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            tasks_auth_token: "test_tasks_token".to_string(),
            default_webhook_secret: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let project_id = env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string());
        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        Ok(Self {
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "me-central1".to_string()),
            api_url: env::var("API_URL").unwrap_or_else(|_| format!("http://localhost:{}", port)),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            base_domain: env::var("BASE_DOMAIN").unwrap_or_else(|_| "smartkindy.com".to_string()),
            port,
            gcp_project_id: project_id,
            default_webhook_url: optional_var("MARKETING_WEBHOOK_URL"),
            batch_time_budget_secs: parse_var("BATCH_TIME_BUDGET_SECS", 100)?,
            max_message_chars: parse_var("MAX_MESSAGE_CHARS", 1000)?,
            tenant_cache_ttl_secs: parse_var("TENANT_CACHE_TTL_SECS", 300)?,

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            tasks_auth_token: env::var("TASKS_AUTH_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("TASKS_AUTH_TOKEN"))?,
            default_webhook_secret: optional_var("MARKETING_WEBHOOK_SECRET"),
        })
    }
}

/// Read an optional variable, treating blank values as unset.
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("TASKS_AUTH_TOKEN", " tasks-token ");
        env::set_var("MARKETING_WEBHOOK_URL", "   ");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.tasks_auth_token, "tasks-token");
        assert_eq!(config.default_webhook_url, None);
        assert_eq!(config.batch_time_budget_secs, 100);
        assert_eq!(config.max_message_chars, 1000);
        assert_eq!(config.tenant_cache_ttl_secs, 300);
    }

    #[test]
    fn test_default_config_is_usable_for_tests() {
        let config = Config::default();
        assert!(config.jwt_signing_key.len() >= 16);
        assert_eq!(config.base_domain, "smartkindy.com");
    }
}
