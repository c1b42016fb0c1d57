//! TOML file configuration structures.
//!
//! These structs map directly onto the `oddsmesh-config.toml` file.
//! Secrets are never read from the file; they come from the environment
//! (see [`super::ConfigLoader`]).

use oddsmesh_core::config::{ChainConfig, DatabaseConfig, SyncConfig, VenueConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub operator: OperatorConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub venues: HashMap<String, VenueConfig>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Operator configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// The operator secret guarding the sync trigger. A plaintext value
    /// (anything not starting with `$argon2`) is hashed at load time.
    pub secret: String,
}

impl FileConfig {
    /// Check if the operator secret is already hashed (argon2 format).
    pub fn is_operator_secret_hashed(&self) -> bool {
        self.operator.secret.starts_with("$argon2")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[operator]
secret = "test-secret"

[venues.polymarket]
base_url = "https://gamma-api.polymarket.com"

[venues.kalshi]
base_url = "https://api.elections.kalshi.com/trade-api/v2"
series_tickers = ["KXNBA"]
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert!(!config.is_operator_secret_hashed());
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.sync.odds_sync_interval_secs, 60);
        assert_eq!(config.venues.len(), 2);
        assert_eq!(
            config.venues["kalshi"].series_tickers,
            vec!["KXNBA".to_string()]
        );
        assert!(config.chain.ws_url.is_none());
        assert!(!config.chain.can_execute());
    }

    #[test]
    fn hashed_operator_secret_is_detected() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[operator]
secret = "$argon2id$v=19$m=19456,t=2,p=1$abc$def"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.is_operator_secret_hashed());
    }
}
