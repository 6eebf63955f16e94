use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::links::DEFAULT_SIGNED_URL_TTL_SECS;
use crate::rate_limit::{PolicyError, RatePolicy};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be set")]
    Missing { name: &'static str },

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("Invalid share rate limit: {0}")]
    Policy(#[from] PolicyError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub share: ShareConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStoreKind {
    Postgres,
    Memory,
}

impl FromStr for LinkStoreKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(LinkStoreKind::Postgres),
            "memory" => Ok(LinkStoreKind::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub link_store: LinkStoreKind,
    pub url: Option<String>,
    /// JSON file of share entries loaded into the memory store at startup.
    pub seed_file: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    S3,
    /// Unsigned URLs under a fixed base; local development only.
    Local,
}

impl FromStr for StorageProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(StorageProvider::S3),
            "local" => Ok(StorageProvider::Local),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub s3_endpoint: Option<String>,
    pub local_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareConfig {
    pub signed_url_ttl_secs: u32,
    pub rate_limit: u32,
    pub rate_window_ms: u64,
}

impl ShareConfig {
    pub fn rate_policy(&self) -> Result<RatePolicy, PolicyError> {
        RatePolicy::new(self.rate_limit, self.rate_window_ms)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let config = Self {
            server: ServerConfig {
                port: vars.parse_or("PORT", 3000)?,
                host: vars.string_or("HOST", "0.0.0.0"),
                cors_allowed_origins: vars
                    .string_or("ALLOWED_ORIGINS", "http://localhost:3000,http://localhost:5173")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            database: DatabaseConfig {
                link_store: vars.parse_or("LINK_STORE", LinkStoreKind::Postgres)?,
                url: vars.get("DATABASE_URL"),
                seed_file: vars.get("LINK_SEED_FILE"),
                max_connections: vars.parse_or("DB_MAX_CONNECTIONS", 10)?,
                min_connections: vars.parse_or("DB_MIN_CONNECTIONS", 1)?,
            },
            storage: StorageConfig {
                provider: vars.parse_or("STORAGE_PROVIDER", StorageProvider::S3)?,
                s3_bucket: vars.string_or("S3_BUCKET", ""),
                s3_region: vars.string_or("S3_REGION", "us-east-1"),
                s3_access_key_id: vars.get("AWS_ACCESS_KEY_ID"),
                s3_secret_access_key: vars.get("AWS_SECRET_ACCESS_KEY"),
                s3_endpoint: vars.get("S3_ENDPOINT"),
                local_base_url: vars.string_or("LOCAL_STORAGE_BASE_URL", "http://localhost:9000"),
            },
            share: ShareConfig {
                signed_url_ttl_secs: vars.parse_or("SIGNED_URL_TTL_SECS", DEFAULT_SIGNED_URL_TTL_SECS)?,
                rate_limit: vars.parse_or("SHARE_RATE_LIMIT", 30)?,
                rate_window_ms: vars.parse_or("SHARE_RATE_WINDOW_MS", 60_000)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.link_store == LinkStoreKind::Postgres && self.database.url.is_none() {
            return Err(ConfigError::Missing { name: "DATABASE_URL" });
        }
        if self.storage.provider == StorageProvider::S3 && self.storage.s3_bucket.is_empty() {
            return Err(ConfigError::Missing { name: "S3_BUCKET" });
        }
        if self.share.signed_url_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "SIGNED_URL_TTL_SECS",
                value: "0".to_string(),
            });
        }
        self.share.rate_policy()?;
        Ok(())
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn string_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(name) {
            Some(value) => match value.trim().parse() {
                Ok(parsed) => Ok(parsed),
                Err(_) => Err(ConfigError::Invalid { name, value }),
            },
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_for_local_setup() {
        let config = config_from(&[("LINK_STORE", "memory"), ("STORAGE_PROVIDER", "local")]).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.cors_allowed_origins.len(), 2);
        assert_eq!(config.share.signed_url_ttl_secs, 60);
        assert_eq!(config.share.rate_limit, 30);
        assert_eq!(config.share.rate_window_ms, 60_000);
        assert_eq!(config.database.link_store, LinkStoreKind::Memory);
        assert!(config.database.seed_file.is_none());
    }

    #[test]
    fn test_seed_file_is_read() {
        let config = config_from(&[
            ("LINK_STORE", "memory"),
            ("STORAGE_PROVIDER", "local"),
            ("LINK_SEED_FILE", "./links.json"),
        ])
        .unwrap();
        assert_eq!(config.database.seed_file.as_deref(), Some("./links.json"));
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let err = config_from(&[("STORAGE_PROVIDER", "local")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { name: "DATABASE_URL" }));
    }

    #[test]
    fn test_s3_requires_bucket() {
        let err = config_from(&[("LINK_STORE", "memory")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { name: "S3_BUCKET" }));
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = config_from(&[
            ("LINK_STORE", "memory"),
            ("STORAGE_PROVIDER", "local"),
            ("PORT", "eighty"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn test_zero_rate_limit_is_rejected() {
        let err = config_from(&[
            ("LINK_STORE", "memory"),
            ("STORAGE_PROVIDER", "local"),
            ("SHARE_RATE_LIMIT", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Policy(PolicyError::ZeroLimit)));
    }

    #[test]
    fn test_oversized_rate_window_is_rejected() {
        let err = config_from(&[
            ("LINK_STORE", "memory"),
            ("STORAGE_PROVIDER", "local"),
            ("SHARE_RATE_WINDOW_MS", "18446744073709551615"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Policy(PolicyError::WindowTooLong(u64::MAX))
        ));
    }
}
