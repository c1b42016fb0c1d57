//! Configuration loading: TOML file + environment overrides.
//!
//! The file carries endpoints and tunables; every secret comes from the
//! environment and is applied by name onto the known fields:
//!
//! - `DATABASE_URL`
//! - `CHAIN_EXECUTOR_PRIVATE_KEY`
//! - `KALSHI_AUTH_KEY` / `KALSHI_AUTH_SECRET` / `KALSHI_PROXY`
//! - `POLYMARKET_AUTH_KEY` / `POLYMARKET_AUTH_SECRET` /
//!   `POLYMARKET_AUTH_PRIVATE_KEY` / `POLYMARKET_PROXY`
//! - `FIAT_API_KEY`

mod file;

pub use file::{FileConfig, OperatorConfig, ServerConfig};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use oddsmesh_core::config::SharedConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Errors during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot hash operator secret: {0}")]
    Hash(String),
    #[error("DATABASE_URL environment variable is not set")]
    MissingDatabaseUrl,
}

/// The fully loaded configuration, secrets applied.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    /// Argon2 hash of the operator secret.
    pub operator_secret_hash: String,
    pub file: FileConfig,
    /// Fiat-converter API key; the bundled provider treats USD stables at
    /// par, the key is handed to whichever rate source gets wired in.
    pub fiat_api_key: Option<String>,
}

impl LoadedConfig {
    /// Split into the shared runtime sections used across crates.
    pub fn into_shared(self) -> SharedConfig {
        SharedConfig::new(self.file.venues, self.file.chain, self.file.sync)
    }
}

/// Loads (and on SIGHUP-style reload, re-loads) the configuration.
pub struct ConfigLoader {
    path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(path: &Path, listen_override: Option<SocketAddr>) -> Self {
        Self {
            path: path.to_path_buf(),
            listen_override,
        }
    }

    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        let mut config: FileConfig = toml::from_str(&raw)?;

        apply_env_overrides(&mut config);

        let operator_secret_hash = if config.is_operator_secret_hashed() {
            config.operator.secret.clone()
        } else {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(config.operator.secret.as_bytes(), &salt)
                .map_err(|e| ConfigError::Hash(e.to_string()))?
                .to_string()
        };

        Ok(LoadedConfig {
            listen: self.listen_override.unwrap_or(config.server.listen),
            operator_secret_hash,
            fiat_api_key: std::env::var("FIAT_API_KEY").ok(),
            file: config,
        })
    }
}

/// Secrets come from the environment, never from the file.
fn apply_env_overrides(config: &mut FileConfig) {
    if let Ok(key) = std::env::var("CHAIN_EXECUTOR_PRIVATE_KEY") {
        config.chain.executor_private_key = Some(key);
    }
    if let Some(kalshi) = config.venues.get_mut("kalshi") {
        if let Ok(v) = std::env::var("KALSHI_AUTH_KEY") {
            kalshi.auth_key = Some(v);
        }
        if let Ok(v) = std::env::var("KALSHI_AUTH_SECRET") {
            kalshi.auth_secret = Some(v);
        }
        if let Ok(v) = std::env::var("KALSHI_PROXY") {
            kalshi.proxy = Some(v);
        }
    }
    if let Some(polymarket) = config.venues.get_mut("polymarket") {
        if let Ok(v) = std::env::var("POLYMARKET_AUTH_KEY") {
            polymarket.auth_key = Some(v);
        }
        if let Ok(v) = std::env::var("POLYMARKET_AUTH_SECRET") {
            polymarket.auth_secret = Some(v);
        }
        if let Ok(v) = std::env::var("POLYMARKET_AUTH_PRIVATE_KEY") {
            polymarket.auth_private_key = Some(v);
        }
        if let Ok(v) = std::env::var("POLYMARKET_PROXY") {
            polymarket.proxy = Some(v);
        }
    }
}

/// The database DSN, environment-only.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
