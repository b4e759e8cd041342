use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::auth::CredentialGate;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Where messages live. Postgres wins when `DATABASE_URL` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    File { path: PathBuf },
    Postgres { url: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub admin_user: Option<String>,
    pub admin_pass: String,
    pub storage: StorageConfig,
    pub list_limit: usize,
    pub access_log_retention: Duration,
    pub access_log_purge_every: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup (env in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let admin_user = get("ADMIN_USER").or_else(|| get("BASIC_AUTH_USER"));
        let admin_pass = get("ADMIN_PASS")
            .or_else(|| get("BASIC_AUTH_PASS"))
            .unwrap_or_default();

        let storage = match get("DATABASE_URL") {
            Some(url) => StorageConfig::Postgres { url },
            None => StorageConfig::File {
                path: PathBuf::from(get("DB_FILE").unwrap_or_else(|| "messages.ndjson".into())),
            },
        };

        let list_limit: usize = parse_or("LIST_LIMIT", get("LIST_LIMIT"), 50)?;
        let retention_days: u64 = parse_or(
            "ACCESS_LOG_RETENTION_DAYS",
            get("ACCESS_LOG_RETENTION_DAYS"),
            30,
        )?;
        let retention_secs = retention_days.checked_mul(24 * 60 * 60).ok_or_else(|| {
            ConfigError::Invalid {
                key: "ACCESS_LOG_RETENTION_DAYS",
                value: retention_days.to_string(),
            }
        })?;
        let purge_secs: u64 = parse_or(
            "ACCESS_LOG_PURGE_INTERVAL_SECS",
            get("ACCESS_LOG_PURGE_INTERVAL_SECS"),
            3600,
        )?;

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or("PORT", get("PORT"), 3000)?,
            admin_user,
            admin_pass,
            storage,
            list_limit: list_limit.max(1),
            access_log_retention: Duration::from_secs(retention_secs),
            access_log_purge_every: Duration::from_secs(purge_secs.max(1)),
        })
    }

    pub fn credential_gate(&self) -> CredentialGate {
        CredentialGate::from_settings(self.admin_user.as_deref(), &self.admin_pass)
    }

    /// Log the non-sensitive parts of the configuration.
    pub fn log_summary(&self) {
        match &self.storage {
            StorageConfig::File { path } => info!("Storage: NDJSON file at {}", path.display()),
            StorageConfig::Postgres { .. } => info!("Storage: Postgres"),
        }
        info!("Listing cap: {}", self.list_limit);
        info!("Admin username configured: {}", self.admin_user.is_some());
        if self.admin_pass.is_empty() {
            warn!("ADMIN_PASS is not set; protected routes will reject every request");
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(move |k| map.get(k).cloned())
    }

    #[test]
    fn defaults_to_file_storage() {
        let c = cfg(&[]).unwrap();
        assert_eq!(c.port, 3000);
        assert_eq!(c.list_limit, 50);
        assert_eq!(
            c.storage,
            StorageConfig::File { path: PathBuf::from("messages.ndjson") }
        );
        assert!(c.admin_user.is_none());
        assert_eq!(c.admin_pass, "");
        assert_eq!(c.access_log_retention, Duration::from_secs(30 * 86_400));
    }

    #[test]
    fn database_url_selects_postgres() {
        let c = cfg(&[("DATABASE_URL", "postgres://x/y"), ("DB_FILE", "ignored")]).unwrap();
        assert_eq!(c.storage, StorageConfig::Postgres { url: "postgres://x/y".into() });
    }

    #[test]
    fn credentials_are_trimmed_and_fall_back() {
        let c = cfg(&[("BASIC_AUTH_USER", " admin "), ("ADMIN_PASS", " pw\n")]).unwrap();
        assert_eq!(c.admin_user.as_deref(), Some("admin"));
        assert_eq!(c.admin_pass, "pw");
    }

    #[test]
    fn blank_username_means_none() {
        let c = cfg(&[("ADMIN_USER", "   "), ("ADMIN_PASS", "pw")]).unwrap();
        assert!(c.admin_user.is_none());
    }

    #[test]
    fn oversized_retention_is_rejected() {
        let err = cfg(&[("ACCESS_LOG_RETENTION_DAYS", &u64::MAX.to_string())]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "ACCESS_LOG_RETENTION_DAYS", .. }));
        let c = cfg(&[("ACCESS_LOG_RETENTION_DAYS", "7")]).unwrap();
        assert_eq!(c.access_log_retention, Duration::from_secs(7 * 86_400));
    }

    #[test]
    fn invalid_number_is_an_error() {
        let err = cfg(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }
}
