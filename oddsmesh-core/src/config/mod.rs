//! Validated runtime configuration shared across crates.
//!
//! The server crate owns file loading and env overrides; these types are the
//! already-validated result, shared behind per-section locks so a section
//! can be reloaded without blocking readers of the others.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-venue connection and auth settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Catalog API base URL (Gamma for Polymarket, trade API for Kalshi).
    pub base_url: String,
    /// CLOB base URL (Polymarket order placement).
    #[serde(default)]
    pub clob_base_url: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Optional HTTP proxy.
    #[serde(default)]
    pub proxy: Option<String>,
    /// Pinned series tickers (Kalshi); empty means discover via the API.
    #[serde(default)]
    pub series_tickers: Vec<String>,
    /// API key id (Kalshi access key, Polymarket CLOB key).
    #[serde(default, skip_serializing)]
    pub auth_key: Option<String>,
    /// API secret (Kalshi RSA private key PEM).
    #[serde(default, skip_serializing)]
    pub auth_secret: Option<String>,
    /// EVM private key used for EIP-712 order signing (Polymarket).
    #[serde(default, skip_serializing)]
    pub auth_private_key: Option<String>,
}

fn default_timeout_secs() -> u64 {
    15
}

/// Chain RPC endpoints and contract addresses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// WebSocket endpoint for log subscriptions. Unset disables the
    /// listener (it idles until shutdown).
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub escrow_address: Option<String>,
    #[serde(default)]
    pub bet_router_address: Option<String>,
    #[serde(default)]
    pub settlement_address: Option<String>,
    /// From `CHAIN_EXECUTOR_PRIVATE_KEY`, never from the file.
    #[serde(default, skip_serializing)]
    pub executor_private_key: Option<String>,
}

impl ChainConfig {
    /// True when the executor can sign and send transactions.
    pub fn can_execute(&self) -> bool {
        self.rpc_url.is_some()
            && self.escrow_address.is_some()
            && self.executor_private_key.is_some()
    }

    /// True when the listener has something to subscribe to.
    pub fn can_listen(&self) -> bool {
        self.ws_url.is_some() && self.escrow_address.is_some()
    }
}

/// Sync scheduling knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Live-odds refresh interval in seconds; 0 disables the ticker.
    #[serde(default = "default_odds_interval")]
    pub odds_sync_interval_secs: u64,
    /// Max open events refreshed per ticker run.
    #[serde(default = "default_odds_limit")]
    pub odds_sync_limit: i64,
}

fn default_odds_interval() -> u64 {
    60
}

fn default_odds_limit() -> i64 {
    500
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            odds_sync_interval_secs: default_odds_interval(),
            odds_sync_limit: default_odds_limit(),
        }
    }
}

/// Database pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection max lifetime in seconds.
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_max_lifetime_secs() -> u64 {
    30 * 60
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            max_lifetime_secs: default_max_lifetime_secs(),
        }
    }
}

/// Shared configuration state with separate locks for each section.
#[derive(Clone)]
pub struct SharedConfig {
    /// Venue configurations keyed by registry name.
    pub venues: Arc<RwLock<HashMap<String, VenueConfig>>>,
    /// Chain endpoints and contract addresses.
    pub chain: Arc<RwLock<ChainConfig>>,
    /// Sync scheduling.
    pub sync: Arc<RwLock<SyncConfig>>,
}

impl SharedConfig {
    pub fn new(
        venues: HashMap<String, VenueConfig>,
        chain: ChainConfig,
        sync: SyncConfig,
    ) -> Self {
        Self {
            venues: Arc::new(RwLock::new(venues)),
            chain: Arc::new(RwLock::new(chain)),
            sync: Arc::new(RwLock::new(sync)),
        }
    }
}
