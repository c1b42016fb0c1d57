use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

/// A registered external marketplace. Created by the operator via
/// migrations; only `is_enabled` and `api_limit` change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct VenueRecord {
    pub id: i64,
    pub name: String,
    pub venue_type: String,
    pub api_limit: i32,
    pub is_enabled: bool,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone)]
/// Look up a venue by its registry name (e.g. "polymarket").
pub struct GetVenueByName {
    pub name: String,
}

impl Processor<GetVenueByName> for DatabaseProcessor {
    type Output = Option<VenueRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetVenueByName")]
    async fn process(&self, query: GetVenueByName) -> Result<Option<VenueRecord>, sqlx::Error> {
        sqlx::query_as::<_, VenueRecord>(
            r#"
            SELECT id, name, venue_type, api_limit, is_enabled, created_at, updated_at
            FROM venues
            WHERE name = $1
            "#,
        )
        .bind(&query.name)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone, Copy)]
/// List all registered venues (the table is tiny).
pub struct ListVenues;

impl Processor<ListVenues> for DatabaseProcessor {
    type Output = Vec<VenueRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListVenues")]
    async fn process(&self, _query: ListVenues) -> Result<Vec<VenueRecord>, sqlx::Error> {
        sqlx::query_as::<_, VenueRecord>(
            r#"
            SELECT id, name, venue_type, api_limit, is_enabled, created_at, updated_at
            FROM venues
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}
