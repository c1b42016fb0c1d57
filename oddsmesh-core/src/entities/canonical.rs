use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use sqlx::QueryBuilder;

use super::EventStatus;

/// The cross-venue grouping of one underlying match. `id` is the public
/// `canonical_id`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CanonicalEventRecord {
    pub id: i64,
    pub sport_type: String,
    pub title: String,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub match_time: time::PrimitiveDateTime,
    pub canonical_key: String,
    pub status: EventStatus,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

/// Link from a canonical event to one venue event.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EventPlatformLink {
    pub id: i64,
    pub canonical_event_id: i64,
    pub event_id: i64,
    pub platform_id: i64,
}

#[derive(Debug, Clone)]
/// Upsert a canonical event; conflicts on the canonical key update title,
/// teams, time and status. Returns the canonical id.
pub struct UpsertCanonicalEvent {
    pub sport_type: String,
    pub title: String,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub match_time: time::PrimitiveDateTime,
    pub canonical_key: String,
    pub status: EventStatus,
}

impl Processor<UpsertCanonicalEvent> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertCanonicalEvent")]
    async fn process(&self, cmd: UpsertCanonicalEvent) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO canonical_events
                (sport_type, title, home_team, away_team, match_time, canonical_key, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (canonical_key) DO UPDATE SET
                title = EXCLUDED.title,
                home_team = EXCLUDED.home_team,
                away_team = EXCLUDED.away_team,
                match_time = EXCLUDED.match_time,
                status = EXCLUDED.status,
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(&cmd.sport_type)
        .bind(&cmd.title)
        .bind(&cmd.home_team)
        .bind(&cmd.away_team)
        .bind(cmd.match_time)
        .bind(&cmd.canonical_key)
        .bind(cmd.status)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone, Copy)]
/// Upsert one canonical-event ↔ venue-event link. Conflicts on
/// `(canonical_event_id, platform_id)` update only the event id, so links
/// follow re-created events.
pub struct EnsureLink {
    pub canonical_event_id: i64,
    pub event_id: i64,
    pub platform_id: i64,
}

impl Processor<EnsureLink> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:EnsureLink")]
    async fn process(&self, cmd: EnsureLink) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO event_platform_links (canonical_event_id, event_id, platform_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (canonical_event_id, platform_id) DO UPDATE SET
                event_id = EXCLUDED.event_id
            "#,
        )
        .bind(cmd.canonical_event_id)
        .bind(cmd.event_id)
        .bind(cmd.platform_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
/// All venue links of one canonical event.
pub struct ListLinksByCanonicalId {
    pub canonical_id: i64,
}

impl Processor<ListLinksByCanonicalId> for DatabaseProcessor {
    type Output = Vec<EventPlatformLink>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListLinksByCanonicalId")]
    async fn process(
        &self,
        query: ListLinksByCanonicalId,
    ) -> Result<Vec<EventPlatformLink>, sqlx::Error> {
        sqlx::query_as::<_, EventPlatformLink>(
            "SELECT * FROM event_platform_links WHERE canonical_event_id = $1 ORDER BY platform_id",
        )
        .bind(query.canonical_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Paged canonical event list with optional sport-type/status filters.
pub struct ListCanonicalEvents {
    pub sport_type: Option<String>,
    pub status: Option<EventStatus>,
    pub page: i64,
    pub page_size: i64,
}

impl Processor<ListCanonicalEvents> for DatabaseProcessor {
    type Output = (Vec<CanonicalEventRecord>, i64);
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListCanonicalEvents")]
    async fn process(
        &self,
        query: ListCanonicalEvents,
    ) -> Result<(Vec<CanonicalEventRecord>, i64), sqlx::Error> {
        let page = query.page.max(1);
        let page_size = query.page_size.clamp(1, 100);

        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM canonical_events WHERE true");
        if let Some(sport_type) = &query.sport_type {
            count_qb.push(" AND sport_type = ");
            count_qb.push_bind(sport_type.clone());
        }
        if let Some(status) = query.status {
            count_qb.push(" AND status = ");
            count_qb.push_bind(status);
        }
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::new("SELECT * FROM canonical_events WHERE true");
        if let Some(sport_type) = &query.sport_type {
            qb.push(" AND sport_type = ");
            qb.push_bind(sport_type.clone());
        }
        if let Some(status) = query.status {
            qb.push(" AND status = ");
            qb.push_bind(status);
        }
        qb.push(" ORDER BY match_time ASC LIMIT ");
        qb.push_bind(page_size);
        qb.push(" OFFSET ");
        qb.push_bind((page - 1) * page_size);

        let items = qb
            .build_query_as::<CanonicalEventRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok((items, total))
    }
}

#[derive(Debug, Clone, Copy)]
/// Get a canonical event by its public id.
pub struct GetCanonicalById {
    pub canonical_id: i64,
}

impl Processor<GetCanonicalById> for DatabaseProcessor {
    type Output = Option<CanonicalEventRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetCanonicalById")]
    async fn process(
        &self,
        query: GetCanonicalById,
    ) -> Result<Option<CanonicalEventRecord>, sqlx::Error> {
        sqlx::query_as::<_, CanonicalEventRecord>("SELECT * FROM canonical_events WHERE id = $1")
            .bind(query.canonical_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone, Copy)]
/// Resolve the canonical id a venue event belongs to, if any.
pub struct GetCanonicalIdByEventId {
    pub event_id: i64,
}

impl Processor<GetCanonicalIdByEventId> for DatabaseProcessor {
    type Output = Option<i64>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetCanonicalIdByEventId")]
    async fn process(&self, query: GetCanonicalIdByEventId) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT canonical_event_id FROM event_platform_links WHERE event_id = $1 LIMIT 1",
        )
        .bind(query.event_id)
        .fetch_optional(&self.pool)
        .await
    }
}
