//! Read paths for the market endpoints. Queries only; never mutates.

use kanau::processor::Processor;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

use oddsmesh_sdk::objects::{
    MarketAnalytics, MarketDetail, MarketDetailEvent, MarketListResult, MarketSummary,
    PlatformOption,
};

use crate::DatabaseProcessor;
use crate::entities::EventStatus;
use crate::entities::canonical::{
    GetCanonicalById, GetCanonicalIdByEventId, ListCanonicalEvents, ListLinksByCanonicalId,
};
use crate::entities::event::{GetEventById, GetEventByUuid};
use crate::entities::odds::{GetOddsByEventIds, OddsRecord};
use crate::entities::venue::ListVenues;
use crate::entities::OptionKind;
use crate::processors::order_service::OrderError;
use crate::processors::unix_millis;

pub struct MarketQueryService {
    processor: DatabaseProcessor,
}

impl MarketQueryService {
    pub fn new(processor: DatabaseProcessor) -> Self {
        Self { processor }
    }

    /// Paged canonical list with summary odds and the cross-venue
    /// save-percent.
    pub async fn list_markets(
        &self,
        event_type: &str,
        status: Option<EventStatus>,
        page: i64,
        page_size: i64,
    ) -> Result<MarketListResult, OrderError> {
        let (canonicals, total) = self
            .processor
            .process(ListCanonicalEvents {
                sport_type: Some(event_type.to_string()),
                status,
                page,
                page_size,
            })
            .await?;
        let venue_names = self.venue_names().await?;

        let mut items = Vec::with_capacity(canonicals.len());
        for canonical in canonicals {
            let links = self
                .processor
                .process(ListLinksByCanonicalId {
                    canonical_id: canonical.id,
                })
                .await?;
            if links.is_empty() {
                continue;
            }
            let event_ids: Vec<i64> = links.iter().map(|l| l.event_id).collect();
            let first_event_uuid = self
                .processor
                .process(GetEventById {
                    event_id: event_ids[0],
                })
                .await?
                .map(|e| e.event_uuid);
            let odds = self
                .processor
                .process(GetOddsByEventIds { event_ids })
                .await?;

            let stats = OddsStats::collect(&odds);
            let match_time = unix_millis(canonical.match_time);
            items.push(MarketSummary {
                canonical_id: canonical.id,
                title: canonical.title,
                home_team: canonical.home_team,
                away_team: canonical.away_team,
                event_type: canonical.sport_type,
                status: canonical.status.into(),
                match_time,
                platform_count: stats.platforms.len(),
                best_price: stats.best_price,
                best_price_platform: stats
                    .best_platform_id
                    .and_then(|id| venue_names.get(&id).cloned())
                    .unwrap_or_default(),
                best_price_option: stats.best_option.clone(),
                save_percent: stats.save_percent(),
                win_odds: stats.win_odds,
                draw_odds: stats.draw_odds,
                lose_odds: stats.lose_odds,
                event_uuid: first_event_uuid,
            });
        }

        Ok(MarketListResult {
            page: page.max(1),
            page_size: page_size.clamp(1, 100),
            total,
            items,
        })
    }

    /// Detail by numeric canonical id or event_uuid: per-venue options
    /// plus price analytics.
    pub async fn market_detail(&self, id_or_event_uuid: &str) -> Result<MarketDetail, OrderError> {
        if id_or_event_uuid.is_empty() {
            return Err(OrderError::Validation(
                "market id or event_uuid is required".to_string(),
            ));
        }
        let canonical_id = match id_or_event_uuid.parse::<i64>() {
            Ok(id) => id,
            Err(_) => {
                let event = self
                    .processor
                    .process(GetEventByUuid {
                        event_uuid: id_or_event_uuid.to_string(),
                    })
                    .await?
                    .ok_or_else(|| {
                        OrderError::NotFound(format!("event {id_or_event_uuid}"))
                    })?;
                self.processor
                    .process(GetCanonicalIdByEventId { event_id: event.id })
                    .await?
                    .ok_or_else(|| {
                        OrderError::NotFound(format!(
                            "event {id_or_event_uuid} is not grouped yet"
                        ))
                    })?
            }
        };

        let canonical = self
            .processor
            .process(GetCanonicalById { canonical_id })
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("market {canonical_id}")))?;
        let links = self
            .processor
            .process(ListLinksByCanonicalId { canonical_id })
            .await?;
        let event_ids: Vec<i64> = links.iter().map(|l| l.event_id).collect();
        let odds = self
            .processor
            .process(GetOddsByEventIds { event_ids })
            .await?;
        let venue_names = self.venue_names().await?;

        let stats = OddsStats::collect(&odds);
        let platform_options: Vec<PlatformOption> = odds
            .iter()
            .map(|o| PlatformOption {
                platform_id: o.platform_id,
                platform_name: venue_names.get(&o.platform_id).cloned().unwrap_or_default(),
                option_name: o.option_name.clone(),
                price: o.price,
            })
            .collect();

        let match_time = unix_millis(canonical.match_time);
        Ok(MarketDetail {
            event: MarketDetailEvent {
                canonical_id: canonical.id,
                title: canonical.title,
                event_type: canonical.sport_type,
                status: canonical.status.into(),
                start_time: match_time,
                end_time: match_time,
            },
            analytics: MarketAnalytics {
                best_price: stats.best_price,
                best_price_platform: stats
                    .best_platform_id
                    .and_then(|id| venue_names.get(&id).cloned())
                    .unwrap_or_default(),
                best_price_option: stats.best_option.clone(),
                platform_count: stats.platforms.len(),
                option_count: platform_options.len(),
                price_min: stats.min_price,
                price_max: stats.max_price,
                price_spread_pct: stats.save_percent(),
            },
            platform_options,
        })
    }

    async fn venue_names(&self) -> Result<HashMap<i64, String>, OrderError> {
        let venues = self.processor.process(ListVenues).await?;
        Ok(venues.into_iter().map(|v| (v.id, v.name)).collect())
    }
}

/// Summary statistics over a set of odds rows.
#[derive(Debug, Default)]
struct OddsStats {
    platforms: HashSet<i64>,
    best_price: Decimal,
    best_platform_id: Option<i64>,
    best_option: String,
    min_price: Decimal,
    max_price: Decimal,
    win_odds: Option<Decimal>,
    draw_odds: Option<Decimal>,
    lose_odds: Option<Decimal>,
}

impl OddsStats {
    fn collect(odds: &[OddsRecord]) -> Self {
        let mut stats = Self::default();
        for (i, row) in odds.iter().enumerate() {
            stats.platforms.insert(row.platform_id);
            if i == 0 {
                stats.min_price = row.price;
                stats.max_price = row.price;
            } else {
                stats.min_price = stats.min_price.min(row.price);
                stats.max_price = stats.max_price.max(row.price);
            }
            if row.price > stats.best_price {
                stats.best_price = row.price;
                stats.best_platform_id = Some(row.platform_id);
                stats.best_option = row.option_name.clone();
            }
            let slot = match row.option_type {
                Some(OptionKind::Win) => &mut stats.win_odds,
                Some(OptionKind::Draw) => &mut stats.draw_odds,
                Some(OptionKind::Lose) => &mut stats.lose_odds,
                None => continue,
            };
            *slot = Some(slot.map_or(row.price, |current| current.max(row.price)));
        }
        stats
    }

    /// `(max - min) / max * 100`, the headline saving across venues.
    fn save_percent(&self) -> Decimal {
        if self.max_price.is_zero() {
            return Decimal::ZERO;
        }
        (self.max_price - self.min_price) / self.max_price * Decimal::from(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn odds_row(platform_id: i64, name: &str, kind: Option<OptionKind>, price: Decimal) -> OddsRecord {
        let now = time::PrimitiveDateTime::new(
            time::Date::from_calendar_date(2026, time::Month::April, 1).unwrap(),
            time::Time::MIDNIGHT,
        );
        OddsRecord {
            id: 0,
            event_id: 1,
            unique_event_platform: format!("{platform_id}_ev_{name}"),
            platform_id,
            option_name: name.to_string(),
            option_type: kind,
            price,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn stats_track_best_min_max_and_save_percent() {
        let odds = vec![
            odds_row(1, "YES", Some(OptionKind::Win), dec!(0.60)),
            odds_row(2, "YES", Some(OptionKind::Win), dec!(0.65)),
            odds_row(2, "NO", Some(OptionKind::Lose), dec!(0.40)),
        ];
        let stats = OddsStats::collect(&odds);
        assert_eq!(stats.platforms.len(), 2);
        assert_eq!(stats.best_price, dec!(0.65));
        assert_eq!(stats.best_platform_id, Some(2));
        assert_eq!(stats.best_option, "YES");
        assert_eq!(stats.min_price, dec!(0.40));
        assert_eq!(stats.max_price, dec!(0.65));
        assert_eq!(stats.win_odds, Some(dec!(0.65)));
        assert_eq!(stats.lose_odds, Some(dec!(0.40)));
        assert_eq!(stats.draw_odds, None);
        // (0.65 - 0.40) / 0.65 * 100
        let expected = (dec!(0.25) / dec!(0.65)) * dec!(100);
        assert_eq!(stats.save_percent(), expected);
    }

    #[test]
    fn empty_odds_have_zero_save_percent() {
        let stats = OddsStats::collect(&[]);
        assert_eq!(stats.save_percent(), Decimal::ZERO);
    }
}
