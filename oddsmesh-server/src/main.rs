//! Oddsmesh Server
//!
//! Aggregates binary prediction-market catalogs across venues, keeps live
//! pricing, and brokers price-locked user orders against the on-chain
//! escrow.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use oddsmesh_core::DatabaseProcessor;
use oddsmesh_core::adapters::AdapterRegistry;
use oddsmesh_core::chain::listener::ChainListener;
use oddsmesh_core::events::{ShutdownReceiver, shutdown_channel};
use oddsmesh_core::fiat::NoopFiatConversion;
use oddsmesh_core::processors::market_query::MarketQueryService;
use oddsmesh_core::processors::odds_sync::OddsSyncService;
use oddsmesh_core::processors::order_service::OrderService;
use oddsmesh_core::processors::sync::SyncPipeline;
use server::{build_router, serve};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Oddsmesh - cross-venue prediction market order routing
#[derive(Parser, Debug)]
#[command(name = "oddsmesh-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./oddsmesh-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();
    tracing::info!("Starting oddsmesh-server v{}", env!("CARGO_PKG_VERSION"));

    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let listen_addr = loaded.listen;
    let operator_secret_hash = Arc::new(loaded.operator_secret_hash.clone());
    if loaded.fiat_api_key.is_some() {
        tracing::info!("fiat converter key present; USD stables convert at par");
    }

    let database_url = get_database_url().inspect_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set: {e}");
    })?;

    tracing::info!("Connecting to database...");
    let db_config = loaded.file.database.clone();
    let db_pool = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .max_lifetime(Duration::from_secs(db_config.max_lifetime_secs))
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&db_pool).await.map_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
            e
        })?;
        tracing::info!("Migrations complete");
    }

    let shared_config = loaded.into_shared();

    let adapters = {
        let venues = shared_config.venues.read().await;
        Arc::new(AdapterRegistry::from_config(&venues))
    };

    let order_service = Arc::new(OrderService::new(
        DatabaseProcessor::new(db_pool.clone()),
        adapters.clone(),
        Arc::new(NoopFiatConversion),
        shared_config.chain.clone(),
    ));
    let market_query = Arc::new(MarketQueryService::new(DatabaseProcessor::new(
        db_pool.clone(),
    )));
    let sync_pipeline = Arc::new(SyncPipeline::new(db_pool.clone(), adapters.clone()));

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let mut join_handles: Vec<JoinHandle<()>> = Vec::new();

    join_handles.push(shutdown::spawn_config_reload_handler(
        shared_config.clone(),
        config_loader.clone(),
        shutdown_rx.clone(),
    ));

    join_handles.push(spawn_chain_listener(
        shared_config.clone(),
        order_service.clone(),
        shutdown_rx.clone(),
    ));
    join_handles.push(spawn_odds_ticker(
        shared_config.clone(),
        db_pool.clone(),
        adapters.clone(),
        shutdown_rx.clone(),
    ));

    let app_state = AppState {
        db: db_pool,
        config: shared_config,
        orders: order_service,
        markets: market_query,
        sync: sync_pipeline,
        operator_secret_hash,
    };

    let router = build_router(app_state);
    let result = serve(router, listen_addr).await;

    tracing::info!("Server stopped, shutting down background tasks");
    let _ = shutdown_tx.send(true);
    for handle in join_handles {
        let _ = handle.await;
    }
    tracing::info!("Shutdown complete");

    result?;
    Ok(())
}

/// The listener owns one subscription; when it breaks, rebuild and
/// resubscribe (logs replay by block, downstream writes are idempotent).
fn spawn_chain_listener(
    config: oddsmesh_core::config::SharedConfig,
    order_service: Arc<OrderService>,
    shutdown_rx: ShutdownReceiver,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let chain_config = config.chain.read().await.clone();
            let listener = ChainListener::new(chain_config, order_service.clone());
            match listener.run(shutdown_rx.clone()).await {
                Ok(()) => break,
                Err(e) => {
                    tracing::error!(error = %e, "chain listener failed, restarting");
                }
            }
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        tracing::info!("chain listener stopped");
    })
}

fn spawn_odds_ticker(
    config: oddsmesh_core::config::SharedConfig,
    db_pool: sqlx::PgPool,
    adapters: Arc<AdapterRegistry>,
    shutdown_rx: ShutdownReceiver,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (interval_secs, limit) = {
            let sync = config.sync.read().await;
            (sync.odds_sync_interval_secs, sync.odds_sync_limit)
        };
        let ticker = OddsSyncService::new(DatabaseProcessor::new(db_pool), adapters);
        ticker.run(interval_secs, limit, shutdown_rx).await;
    })
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
