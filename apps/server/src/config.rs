use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, bail, Context};
use leadrelay_core::outbound::{EmailSettings, DEFAULT_EMAIL_API_URL};

pub struct Config {
    pub listen_addr: SocketAddr,
    pub app_base_url: String,
    pub webhook_url: Option<String>,
    pub email: Option<EmailSettings>,
    /// Shared secret expected in `x-webhook-secret` on webhook and health calls.
    pub secret_key: Option<String>,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub rate_limit_window: Duration,
    pub webhook_log_capacity: usize,
    pub max_listeners: usize,
    pub step_aliases_file: Option<PathBuf>,
    pub static_dir: Option<String>,
}

impl Config {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            var(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let listen_addr: SocketAddr = get("LR_LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .context("Invalid LR_LISTEN_ADDR")?;

        let app_base_url = get("LR_APP_BASE_URL")
            .ok_or_else(|| anyhow!("LR_APP_BASE_URL must be set to the public URL of the site"))?
            .trim_end_matches('/')
            .to_string();

        let webhook_url = get("LR_WEBHOOK_URL");

        let email = match (
            get("LR_EMAIL_API_KEY"),
            get("LR_EMAIL_FROM"),
            get("LR_EMAIL_TO"),
        ) {
            (None, None, None) => None,
            (Some(api_key), Some(from), Some(to)) => Some(EmailSettings {
                api_url: get("LR_EMAIL_API_URL")
                    .unwrap_or_else(|| DEFAULT_EMAIL_API_URL.to_string()),
                api_key,
                from,
                to,
            }),
            (api_key, from, to) => {
                let missing: Vec<&str> = [
                    ("LR_EMAIL_API_KEY", api_key.is_none()),
                    ("LR_EMAIL_FROM", from.is_none()),
                    ("LR_EMAIL_TO", to.is_none()),
                ]
                .iter()
                .filter(|(_, absent)| *absent)
                .map(|(key, _)| *key)
                .collect();
                bail!(
                    "Incomplete e-mail configuration, missing: {}",
                    missing.join(", ")
                );
            }
        };

        let cors_allow = get("LR_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| app_base_url.clone())
            .split(',')
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let timeout_ms: u64 = parse_or(&get, "LR_REQUEST_TIMEOUT_MS", 30_000)?;
        let window_secs: u64 = parse_or(&get, "LR_RATE_LIMIT_WINDOW_SECS", 60)?;
        let webhook_log_capacity: usize = parse_or(&get, "LR_WEBHOOK_LOG_CAPACITY", 100)?;
        let max_listeners: usize = parse_or(&get, "LR_MAX_LISTENERS", 100)?;

        Ok(Self {
            listen_addr,
            app_base_url,
            webhook_url,
            email,
            secret_key: get("LR_SECRET_KEY"),
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            rate_limit_window: Duration::from_secs(window_secs),
            webhook_log_capacity,
            max_listeners,
            step_aliases_file: get("LR_STEP_ALIASES_FILE").map(PathBuf::from),
            static_dir: get("LR_STATIC_DIR"),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow!("Invalid {} '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_only_base_url() {
        let config = config(&[("LR_APP_BASE_URL", "https://example.com/")]).unwrap();
        assert_eq!(config.app_base_url, "https://example.com");
        assert_eq!(config.cors_allow, vec!["https://example.com"]);
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert_eq!(config.webhook_log_capacity, 100);
        assert!(config.email.is_none());
        assert!(config.webhook_url.is_none());
        assert!(config.secret_key.is_none());
    }

    #[test]
    fn test_missing_base_url_fails() {
        let err = config(&[]).err().unwrap();
        assert!(err.to_string().contains("LR_APP_BASE_URL"));
    }

    #[test]
    fn test_partial_email_configuration_fails() {
        let err = config(&[
            ("LR_APP_BASE_URL", "https://example.com"),
            ("LR_EMAIL_API_KEY", "re_123"),
        ])
        .err()
        .unwrap();
        let message = err.to_string();
        assert!(message.contains("LR_EMAIL_FROM"));
        assert!(message.contains("LR_EMAIL_TO"));
    }

    #[test]
    fn test_full_email_configuration() {
        let config = config(&[
            ("LR_APP_BASE_URL", "https://example.com"),
            ("LR_EMAIL_API_KEY", "re_123"),
            ("LR_EMAIL_FROM", "site@example.com"),
            ("LR_EMAIL_TO", "sales@example.com"),
        ])
        .unwrap();
        let email = config.email.unwrap();
        assert_eq!(email.api_url, DEFAULT_EMAIL_API_URL);
        assert_eq!(email.to, "sales@example.com");
    }

    #[test]
    fn test_invalid_number_fails() {
        let err = config(&[
            ("LR_APP_BASE_URL", "https://example.com"),
            ("LR_RATE_LIMIT_WINDOW_SECS", "soon"),
        ])
        .err()
        .unwrap();
        assert!(err.to_string().contains("LR_RATE_LIMIT_WINDOW_SECS"));
    }
}
