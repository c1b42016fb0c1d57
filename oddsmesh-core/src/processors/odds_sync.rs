//! Live odds ticker.
//!
//! On a fixed interval, refresh prices for open events from each venue's
//! live-odds source and upsert them. A single event failing never aborts
//! the run. The on-demand variant of this concern lives on the order
//! prepare/place path.

use kanau::processor::Processor;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::DatabaseProcessor;
use crate::adapters::AdapterRegistry;
use crate::entities::event::ListEventsActiveOpen;
use crate::entities::odds::{LiveOddsUpsert, UpsertLiveOdds};
use crate::events::ShutdownReceiver;

pub struct OddsSyncService {
    processor: DatabaseProcessor,
    adapters: Arc<AdapterRegistry>,
}

impl OddsSyncService {
    pub fn new(processor: DatabaseProcessor, adapters: Arc<AdapterRegistry>) -> Self {
        Self {
            processor,
            adapters,
        }
    }

    /// Run the ticker until shutdown. `interval_secs == 0` disables it.
    pub async fn run(self, interval_secs: u64, limit: i64, mut shutdown_rx: ShutdownReceiver) {
        if interval_secs == 0 {
            info!("live odds ticker disabled");
            let _ = shutdown_rx.changed().await;
            return;
        }
        info!(interval_secs, limit, "live odds ticker started");
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("live odds ticker received shutdown signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    match self.run_once(limit).await {
                        Ok(rows) => debug!(rows, "live odds refresh complete"),
                        Err(e) => warn!(error = %e, "live odds refresh failed"),
                    }
                }
            }
        }
    }

    /// One refresh pass over the open events. Returns the number of odds
    /// rows written.
    pub async fn run_once(&self, limit: i64) -> Result<usize, sqlx::Error> {
        let events = self
            .processor
            .process(ListEventsActiveOpen { limit })
            .await?;
        if events.is_empty() {
            debug!("no open events to refresh");
            return Ok(0);
        }

        let mut rows: Vec<LiveOddsUpsert> = Vec::new();
        for event in &events {
            let Some(source) = self.adapters.live_odds(event.platform_id) else {
                continue;
            };
            match source.fetch_live_odds(&event.platform_event_id).await {
                Ok(fetched) => {
                    for row in fetched {
                        rows.push(LiveOddsUpsert {
                            event_id: event.id,
                            platform_id: event.platform_id,
                            platform_event_id: event.platform_event_id.clone(),
                            option_name: row.option_name,
                            price: row.price,
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        event_id = event.id,
                        platform_id = event.platform_id,
                        venue_event_id = %event.platform_event_id,
                        error = %e,
                        "live odds fetch failed, skipping event"
                    );
                }
            }
        }

        if rows.is_empty() {
            return Ok(0);
        }
        self.processor.process(UpsertLiveOdds { rows }).await
    }
}
