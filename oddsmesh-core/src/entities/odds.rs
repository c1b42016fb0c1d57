use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use sqlx::QueryBuilder;
use std::collections::HashMap;

use super::OptionKind;

/// One persisted price quote for one option of one event.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OddsRecord {
    pub id: i64,
    pub event_id: i64,
    pub unique_event_platform: String,
    pub platform_id: i64,
    pub option_name: String,
    pub option_type: Option<OptionKind>,
    pub price: Decimal,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

/// A normalized odds row from an adapter. `event_id` is resolved inside the
/// batch save by matching the venue event id embedded in the key.
#[derive(Debug, Clone)]
pub struct NewOddsRow {
    pub event_id: Option<i64>,
    /// `"{platform_id}_{platform_event_id}_{option_name}"`
    pub unique_event_platform: String,
    pub platform_id: i64,
    pub option_name: String,
    pub option_type: Option<OptionKind>,
    pub price: Decimal,
}

impl NewOddsRow {
    pub fn key(platform_id: i64, platform_event_id: &str, option_name: &str) -> String {
        format!("{platform_id}_{platform_event_id}_{option_name}")
    }
}

/// Collapse duplicate keys within one batch, keeping the most recently
/// fetched row (later rows overwrite earlier ones).
pub fn dedup_odds_rows(rows: Vec<NewOddsRow>) -> Vec<NewOddsRow> {
    let mut by_key: HashMap<String, NewOddsRow> = HashMap::with_capacity(rows.len());
    for row in rows {
        by_key.insert(row.unique_event_platform.clone(), row);
    }
    by_key.into_values().collect()
}

#[derive(Debug, Clone)]
/// All odds rows for a set of events.
pub struct GetOddsByEventIds {
    pub event_ids: Vec<i64>,
}

impl Processor<GetOddsByEventIds> for DatabaseProcessor {
    type Output = Vec<OddsRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOddsByEventIds")]
    async fn process(&self, query: GetOddsByEventIds) -> Result<Vec<OddsRecord>, sqlx::Error> {
        if query.event_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, OddsRecord>(
            "SELECT * FROM event_odds WHERE event_id = ANY($1) ORDER BY id",
        )
        .bind(&query.event_ids)
        .fetch_all(&self.pool)
        .await
    }
}

/// A live quote bound to a known event, produced by the live-odds service
/// or the order prepare/place path.
#[derive(Debug, Clone)]
pub struct LiveOddsUpsert {
    pub event_id: i64,
    pub platform_id: i64,
    pub platform_event_id: String,
    pub option_name: String,
    pub price: Decimal,
}

#[derive(Debug, Clone)]
/// Upsert freshly fetched live odds. Conflicts on the odds key update only
/// price, option_name and updated_at.
pub struct UpsertLiveOdds {
    pub rows: Vec<LiveOddsUpsert>,
}

impl Processor<UpsertLiveOdds> for DatabaseProcessor {
    type Output = usize;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertLiveOdds", fields(rows = cmd.rows.len()))]
    async fn process(&self, cmd: UpsertLiveOdds) -> Result<usize, sqlx::Error> {
        if cmd.rows.is_empty() {
            return Ok(0);
        }
        for chunk in cmd.rows.chunks(100) {
            let mut qb = QueryBuilder::new(
                "INSERT INTO event_odds (event_id, unique_event_platform, platform_id, \
                 option_name, option_type, price) ",
            );
            qb.push_values(chunk, |mut b, o| {
                b.push_bind(o.event_id)
                    .push_bind(NewOddsRow::key(
                        o.platform_id,
                        &o.platform_event_id,
                        &o.option_name,
                    ))
                    .push_bind(o.platform_id)
                    .push_bind(&o.option_name)
                    .push_bind(OptionKind::classify(&o.option_name))
                    .push_bind(o.price);
            });
            qb.push(
                " ON CONFLICT (unique_event_platform) DO UPDATE SET \
                 price = EXCLUDED.price, \
                 option_name = EXCLUDED.option_name, \
                 updated_at = NOW()",
            );
            qb.build().execute(&self.pool).await?;
        }
        Ok(cmd.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(key: &str, price: Decimal) -> NewOddsRow {
        NewOddsRow {
            event_id: None,
            unique_event_platform: key.to_string(),
            platform_id: 1,
            option_name: "YES".to_string(),
            option_type: Some(OptionKind::Win),
            price,
        }
    }

    #[test]
    fn dedup_keeps_latest_row_per_key() {
        let rows = vec![
            row("1_e1_YES", dec!(0.50)),
            row("1_e1_YES", dec!(0.55)),
            row("1_e2_YES", dec!(0.40)),
        ];
        let mut deduped = dedup_odds_rows(rows);
        deduped.sort_by(|a, b| a.unique_event_platform.cmp(&b.unique_event_platform));
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].price, dec!(0.55));
        assert_eq!(deduped[1].price, dec!(0.40));
    }

    #[test]
    fn odds_key_embeds_venue_event_id() {
        let key = NewOddsRow::key(2, "NFL-24SEP01", "NO");
        assert_eq!(key, "2_NFL-24SEP01_NO");
        assert!(key.contains("NFL-24SEP01"));
    }
}
