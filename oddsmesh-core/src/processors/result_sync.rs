//! Result sync: pull outcomes for ended events and sweep their orders.
//!
//! Winners move to `settlable` and wait for the on-chain settlement;
//! losers move straight to `settled` with no payout. Per-event failures
//! skip and continue.

use kanau::processor::Processor;
use std::sync::Arc;

use crate::DatabaseProcessor;
use crate::adapters::AdapterRegistry;
use crate::entities::OrderStatus;
use crate::entities::event::{ListEventsEndedButActive, UpdateEventResult};
use crate::entities::order::{ListOrdersByEventId, UpdateOrderStatus};

/// Ended events examined per run.
const RESULT_SYNC_LIMIT: i64 = 500;

pub struct ResultSyncService {
    processor: DatabaseProcessor,
    adapters: Arc<AdapterRegistry>,
}

impl ResultSyncService {
    pub fn new(processor: DatabaseProcessor, adapters: Arc<AdapterRegistry>) -> Self {
        Self {
            processor,
            adapters,
        }
    }

    pub async fn run(&self) -> Result<(), sqlx::Error> {
        let events = self
            .processor
            .process(ListEventsEndedButActive {
                limit: RESULT_SYNC_LIMIT,
            })
            .await?;
        if events.is_empty() {
            return Ok(());
        }

        let mut updated = 0usize;
        for event in events {
            let Some(source) = self.adapters.result_source(event.platform_id) else {
                continue;
            };
            let outcome = match source.fetch_result(&event.platform_event_id).await {
                Ok(Some(outcome)) => outcome,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(
                        event_id = event.id,
                        venue_event_id = %event.platform_event_id,
                        error = %e,
                        "result fetch failed, skipping event"
                    );
                    continue;
                }
            };

            if let Err(e) = self
                .processor
                .process(UpdateEventResult {
                    event_id: event.id,
                    result: Some(outcome.result.clone()),
                    status: Some(outcome.status),
                })
                .await
            {
                tracing::warn!(event_id = event.id, error = %e, "result update failed");
                continue;
            }
            updated += 1;

            self.sweep_orders(event.id, &outcome.result).await;
        }

        if updated > 0 {
            tracing::info!(updated, "result sync updated events and swept orders");
        }
        Ok(())
    }

    /// Move each placed order on the event: matching side wins and becomes
    /// settlable; anything else settles as a loss.
    async fn sweep_orders(&self, event_id: i64, result: &str) {
        let orders = match self.processor.process(ListOrdersByEventId { event_id }).await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::warn!(event_id, error = %e, "order sweep query failed");
                return;
            }
        };
        for order in orders {
            if order.status != OrderStatus::Placed {
                continue;
            }
            let next = if order.bet_option.eq_ignore_ascii_case(result) {
                OrderStatus::Settlable
            } else {
                OrderStatus::Settled
            };
            if let Err(e) = self
                .processor
                .process(UpdateOrderStatus {
                    order_uuid: order.order_uuid.clone(),
                    status: next,
                })
                .await
            {
                tracing::warn!(
                    order_uuid = %order.order_uuid,
                    error = %e,
                    "order sweep update failed"
                );
            }
        }
    }
}
