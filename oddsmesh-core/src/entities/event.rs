use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use sqlx::QueryBuilder;

use super::EventStatus;
use super::odds::NewOddsRow;

/// Rows per INSERT statement in batch upserts.
const UPSERT_CHUNK: usize = 100;

/// A single market at a specific venue.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct EventRecord {
    pub id: i64,
    pub event_uuid: String,
    pub title: String,
    pub event_type: String,
    pub platform_id: i64,
    pub platform_event_id: String,
    pub start_time: time::PrimitiveDateTime,
    pub end_time: time::PrimitiveDateTime,
    pub options: serde_json::Value,
    pub result: Option<String>,
    pub result_source: Option<String>,
    pub result_verified: bool,
    pub status: EventStatus,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

/// A normalized event produced by a venue adapter, ready for upsert.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub event_type: String,
    pub platform_id: i64,
    pub platform_event_id: String,
    pub start_time: time::PrimitiveDateTime,
    pub end_time: time::PrimitiveDateTime,
    pub options: serde_json::Value,
    pub result: Option<String>,
    pub result_source: Option<String>,
    pub status: EventStatus,
}

impl NewEvent {
    /// Deterministic external id: `"{platform_id}_{platform_event_id}"`.
    pub fn event_uuid(&self) -> String {
        format!("{}_{}", self.platform_id, self.platform_event_id)
    }
}

#[derive(Debug, Clone)]
/// Persist one sync batch: upsert events, re-read the ids of conflicting
/// rows, attach odds rows to their events, upsert odds. All inside a single
/// transaction; any failure rolls back the whole batch.
pub struct SaveEventBatch {
    pub platform_id: i64,
    pub events: Vec<NewEvent>,
    pub odds: Vec<NewOddsRow>,
}

impl Processor<SaveEventBatch> for DatabaseProcessor {
    type Output = usize;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SaveEventBatch", fields(platform_id = cmd.platform_id, events = cmd.events.len(), odds = cmd.odds.len()))]
    async fn process(&self, cmd: SaveEventBatch) -> Result<usize, sqlx::Error> {
        if cmd.events.is_empty() {
            return Ok(0);
        }
        let mut txp = self.begin().await?;
        let tx = &mut txp.tx;

        for chunk in cmd.events.chunks(UPSERT_CHUNK) {
            let mut qb = QueryBuilder::new(
                "INSERT INTO events (event_uuid, title, event_type, platform_id, \
                 platform_event_id, start_time, end_time, options, result, \
                 result_source, result_verified, status) ",
            );
            qb.push_values(chunk, |mut b, e| {
                b.push_bind(e.event_uuid())
                    .push_bind(&e.title)
                    .push_bind(&e.event_type)
                    .push_bind(e.platform_id)
                    .push_bind(&e.platform_event_id)
                    .push_bind(e.start_time)
                    .push_bind(e.end_time)
                    .push_bind(&e.options)
                    .push_bind(&e.result)
                    .push_bind(&e.result_source)
                    .push_bind(e.result.is_some())
                    .push_bind(e.status);
            });
            qb.push(
                " ON CONFLICT (platform_id, platform_event_id) DO UPDATE SET \
                 title = EXCLUDED.title, \
                 start_time = EXCLUDED.start_time, \
                 end_time = EXCLUDED.end_time, \
                 status = EXCLUDED.status, \
                 options = EXCLUDED.options, \
                 result = EXCLUDED.result, \
                 result_source = EXCLUDED.result_source, \
                 result_verified = EXCLUDED.result_verified, \
                 event_uuid = EXCLUDED.event_uuid, \
                 updated_at = NOW()",
            );
            qb.build().execute(&mut **tx).await?;
        }

        // Conflicting rows keep their generated ids, so read them back
        // before wiring odds rows to events.
        let venue_event_ids: Vec<String> = cmd
            .events
            .iter()
            .map(|e| e.platform_event_id.clone())
            .collect();
        let id_rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT id, platform_event_id FROM events \
             WHERE platform_id = $1 AND platform_event_id = ANY($2)",
        )
        .bind(cmd.platform_id)
        .bind(&venue_event_ids)
        .fetch_all(&mut **tx)
        .await?;

        let mut odds = cmd.odds;
        for row in &mut odds {
            if row.event_id.is_some() {
                continue;
            }
            // The odds key embeds the venue event id:
            // "{platform_id}_{platform_event_id}_{option_name}".
            row.event_id = id_rows
                .iter()
                .find(|(_, pid)| row.unique_event_platform.contains(pid.as_str()))
                .map(|(id, _)| *id);
        }

        let resolvable: Vec<&NewOddsRow> = odds.iter().filter(|o| o.event_id.is_some()).collect();
        if resolvable.len() < odds.len() {
            tracing::warn!(
                platform_id = cmd.platform_id,
                dropped = odds.len() - resolvable.len(),
                "odds rows without a matching event were dropped from the batch"
            );
        }

        for chunk in resolvable.chunks(UPSERT_CHUNK) {
            let mut qb = QueryBuilder::new(
                "INSERT INTO event_odds (event_id, unique_event_platform, platform_id, \
                 option_name, option_type, price) ",
            );
            qb.push_values(chunk, |mut b, o| {
                b.push_bind(o.event_id)
                    .push_bind(&o.unique_event_platform)
                    .push_bind(o.platform_id)
                    .push_bind(&o.option_name)
                    .push_bind(o.option_type)
                    .push_bind(o.price);
            });
            qb.push(
                " ON CONFLICT (unique_event_platform) DO UPDATE SET \
                 price = EXCLUDED.price, \
                 option_name = EXCLUDED.option_name, \
                 option_type = EXCLUDED.option_type, \
                 updated_at = NOW()",
            );
            qb.build().execute(&mut **tx).await?;
        }

        txp.commit().await?;
        Ok(cmd.events.len())
    }
}

#[derive(Debug, Clone)]
/// Get an event by its deterministic external uuid.
pub struct GetEventByUuid {
    pub event_uuid: String,
}

impl Processor<GetEventByUuid> for DatabaseProcessor {
    type Output = Option<EventRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetEventByUuid")]
    async fn process(&self, query: GetEventByUuid) -> Result<Option<EventRecord>, sqlx::Error> {
        sqlx::query_as::<_, EventRecord>("SELECT * FROM events WHERE event_uuid = $1")
            .bind(&query.event_uuid)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone, Copy)]
/// Get an event by primary key.
pub struct GetEventById {
    pub event_id: i64,
}

impl Processor<GetEventById> for DatabaseProcessor {
    type Output = Option<EventRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetEventById")]
    async fn process(&self, query: GetEventById) -> Result<Option<EventRecord>, sqlx::Error> {
        sqlx::query_as::<_, EventRecord>("SELECT * FROM events WHERE id = $1")
            .bind(query.event_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Events of one type, bounded, for the aggregation engine.
pub struct ListEventsForAggregation {
    pub event_type: String,
    pub limit: i64,
}

impl Processor<ListEventsForAggregation> for DatabaseProcessor {
    type Output = Vec<EventRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListEventsForAggregation")]
    async fn process(
        &self,
        query: ListEventsForAggregation,
    ) -> Result<Vec<EventRecord>, sqlx::Error> {
        sqlx::query_as::<_, EventRecord>(
            "SELECT * FROM events WHERE event_type = $1 ORDER BY start_time ASC LIMIT $2",
        )
        .bind(&query.event_type)
        .bind(query.limit.max(1))
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone, Copy)]
/// Events past their end time but still marked active (result sync input).
pub struct ListEventsEndedButActive {
    pub limit: i64,
}

impl Processor<ListEventsEndedButActive> for DatabaseProcessor {
    type Output = Vec<EventRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListEventsEndedButActive")]
    async fn process(
        &self,
        query: ListEventsEndedButActive,
    ) -> Result<Vec<EventRecord>, sqlx::Error> {
        sqlx::query_as::<_, EventRecord>(
            "SELECT * FROM events WHERE status = 'active' AND end_time < NOW() LIMIT $1",
        )
        .bind(query.limit.max(1))
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone, Copy)]
/// Open events still trading (live-odds ticker input).
pub struct ListEventsActiveOpen {
    pub limit: i64,
}

impl Processor<ListEventsActiveOpen> for DatabaseProcessor {
    type Output = Vec<EventRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListEventsActiveOpen")]
    async fn process(&self, query: ListEventsActiveOpen) -> Result<Vec<EventRecord>, sqlx::Error> {
        sqlx::query_as::<_, EventRecord>(
            "SELECT * FROM events WHERE status = 'active' AND end_time > NOW() \
             ORDER BY end_time ASC LIMIT $1",
        )
        .bind(query.limit.max(1))
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Write a synced result back onto an event (result sync).
pub struct UpdateEventResult {
    pub event_id: i64,
    pub result: Option<String>,
    pub status: Option<EventStatus>,
}

impl Processor<UpdateEventResult> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateEventResult")]
    async fn process(&self, cmd: UpdateEventResult) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE events SET \
             result = COALESCE($2, result), \
             status = COALESCE($3, status), \
             result_verified = ($2 IS NOT NULL OR result_verified) \
             WHERE id = $1",
        )
        .bind(cmd.event_id)
        .bind(&cmd.result)
        .bind(cmd.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
