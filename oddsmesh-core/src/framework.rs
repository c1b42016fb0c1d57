use sqlx::PgPool;

/// Carrier for the typed query messages. Every database operation in
/// `entities` is a message processed by this type via
/// `kanau::processor::Processor`.
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open an explicit transaction for multi-table writes (sync batches,
    /// order creation). Callers commit or roll back the returned wrapper.
    pub async fn begin(&self) -> Result<TransactionProcessor<'static>, sqlx::Error> {
        Ok(TransactionProcessor {
            tx: self.pool.begin().await?,
        })
    }
}

/// A `DatabaseProcessor` counterpart scoped to one transaction.
pub struct TransactionProcessor<'b> {
    pub tx: sqlx::Transaction<'b, sqlx::Postgres>,
}

impl TransactionProcessor<'_> {
    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        self.tx.rollback().await
    }
}
