//! Sync pipeline: drive one venue's catalog into the store, then trigger
//! aggregation and result sync.
//!
//! Streaming venues run a producer/consumer pair over a capacity-1
//! channel: the producer fetches and pushes batches, the consumer
//! normalizes and persists each one inside a transaction. A save failure
//! drops the receiver, which stops the producer; the producer's own
//! failure is surfaced only after the channel has drained.

use kanau::processor::Processor;
use std::sync::Arc;

use crate::DatabaseProcessor;
use crate::adapters::{AdapterRegistry, VenueCatalog, VenueError};
use crate::entities::event::SaveEventBatch;
use crate::entities::odds::dedup_odds_rows;
use crate::entities::venue::GetVenueByName;
use crate::events::sync_batch_channel;
use crate::processors::aggregation::AggregationEngine;
use crate::processors::result_sync::ResultSyncService;

/// Errors of one sync run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("venue {0} is not registered")]
    VenueNotFound(String),
    #[error("venue {0} is disabled")]
    VenueDisabled(String),
    #[error("no adapter for venue {0}")]
    NoAdapter(String),
    #[error(transparent)]
    Venue(#[from] VenueError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("sync consumer task failed: {0}")]
    Consumer(String),
}

pub struct SyncPipeline {
    processor: DatabaseProcessor,
    adapters: Arc<AdapterRegistry>,
    aggregation: AggregationEngine,
    result_sync: ResultSyncService,
}

impl SyncPipeline {
    pub fn new(pool: sqlx::PgPool, adapters: Arc<AdapterRegistry>) -> Self {
        Self {
            processor: DatabaseProcessor::new(pool.clone()),
            adapters: adapters.clone(),
            aggregation: AggregationEngine::new(DatabaseProcessor::new(pool.clone())),
            result_sync: ResultSyncService::new(DatabaseProcessor::new(pool), adapters),
        }
    }

    /// Full sync pass for one venue. Returns the number of events saved.
    #[tracing::instrument(skip(self), name = "sync_platform")]
    pub async fn sync_platform(
        &self,
        venue_name: &str,
        event_type: &str,
    ) -> Result<usize, SyncError> {
        let venue = self
            .processor
            .process(GetVenueByName {
                name: venue_name.to_string(),
            })
            .await?
            .ok_or_else(|| SyncError::VenueNotFound(venue_name.to_string()))?;
        if !venue.is_enabled {
            return Err(SyncError::VenueDisabled(venue_name.to_string()));
        }

        let adapter = self
            .adapters
            .catalog(venue_name)
            .ok_or_else(|| SyncError::NoAdapter(venue_name.to_string()))?;

        let total = if adapter.supports_streaming() {
            self.sync_streaming(venue.id, event_type, adapter).await?
        } else {
            let raw = adapter.fetch_events(event_type).await?;
            if raw.is_empty() {
                tracing::warn!(venue = venue_name, event_type, "no events fetched");
                0
            } else {
                let batch = adapter.normalize(&raw, venue.id);
                let odds = dedup_odds_rows(batch.odds);
                self.processor
                    .process(SaveEventBatch {
                        platform_id: venue.id,
                        events: batch.events,
                        odds,
                    })
                    .await?
            }
        };

        if let Err(e) = self.aggregation.run(event_type).await {
            tracing::warn!(error = %e, "aggregation pass failed after sync");
        }
        if let Err(e) = self.result_sync.run().await {
            tracing::warn!(error = %e, "result sync failed after sync");
        }

        tracing::info!(venue = venue_name, total, "sync complete");
        Ok(total)
    }

    /// Producer/consumer streaming sync across the bounded channel.
    async fn sync_streaming(
        &self,
        venue_id: i64,
        event_type: &str,
        adapter: Arc<dyn VenueCatalog>,
    ) -> Result<usize, SyncError> {
        let (batch_tx, mut batch_rx) = sync_batch_channel();

        let consumer_adapter = adapter.clone();
        let consumer_db = DatabaseProcessor::new(self.processor.pool.clone());
        let consumer = tokio::spawn(async move {
            let mut saved = 0usize;
            while let Some(raw) = batch_rx.recv().await {
                let batch = consumer_adapter.normalize(&raw, venue_id);
                let odds = dedup_odds_rows(batch.odds);
                saved += consumer_db
                    .process(SaveEventBatch {
                        platform_id: venue_id,
                        events: batch.events,
                        odds,
                    })
                    .await?;
            }
            Ok::<usize, sqlx::Error>(saved)
        });

        // Drive the producer in the current task; closing the sender lets
        // the consumer drain and finish.
        let produced = adapter.fetch_events_streaming(event_type, batch_tx).await;

        let consumed = match consumer.await {
            Ok(result) => result,
            Err(join_err) => return Err(SyncError::Consumer(join_err.to_string())),
        };

        // A failed save wins over the producer's resulting channel error;
        // a clean consumer surfaces whatever the producer hit.
        match (consumed, produced) {
            (Err(save_err), _) => Err(save_err.into()),
            (Ok(_), Err(fetch_err)) => Err(fetch_err.into()),
            (Ok(saved), Ok(_)) => Ok(saved),
        }
    }
}
