//! Application state shared across all request handlers.

use oddsmesh_core::config::SharedConfig;
use oddsmesh_core::processors::market_query::MarketQueryService;
use oddsmesh_core::processors::order_service::OrderService;
use oddsmesh_core::processors::sync::SyncPipeline;
use sqlx::PgPool;
use std::sync::Arc;

/// Shared across all request handlers; cheap to clone (everything is
/// behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Shared configuration with separate locks for each section.
    pub config: SharedConfig,
    /// The order state machine.
    pub orders: Arc<OrderService>,
    /// Market read paths.
    pub markets: Arc<MarketQueryService>,
    /// Operator-triggered catalog sync.
    pub sync: Arc<SyncPipeline>,
    /// Argon2 hash of the operator secret.
    pub operator_secret_hash: Arc<String>,
}
