use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;

/// An observed on-chain log record. `processed` and `refunded_at` are
/// mutually exclusive: a deposit is either consumed by a placed order or
/// released back to the user, never both.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ContractEventRecord {
    pub id: i64,
    pub event_kind: String,
    pub contract_order_id: Option<String>,
    pub order_uuid: Option<String>,
    pub user_wallet: String,
    pub deposit_amount: Option<Decimal>,
    pub fund_currency: Option<String>,
    pub tx_hash: String,
    pub block_number: Option<i64>,
    pub event_data: serde_json::Value,
    pub processed: bool,
    pub processed_at: Option<time::PrimitiveDateTime>,
    pub refunded_at: Option<time::PrimitiveDateTime>,
    pub created_at: time::PrimitiveDateTime,
}

/// Log kind strings stored in `event_kind`.
pub const KIND_DEPOSIT_SUCCESS: &str = "DepositSuccess";
pub const KIND_SETTLED: &str = "Settled";

#[derive(Debug, Clone)]
/// Record a FundsLocked deposit. Returns `false` when the log was already
/// recorded (re-delivery is a no-op thanks to the tx_hash unique key).
pub struct InsertDepositEvent {
    pub contract_order_id: String,
    pub user_wallet: String,
    pub amount: Decimal,
    pub currency: String,
    pub tx_hash: String,
    pub block_number: Option<i64>,
    pub event_data: serde_json::Value,
}

impl Processor<InsertDepositEvent> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertDepositEvent", fields(contract_order_id = %cmd.contract_order_id, tx_hash = %cmd.tx_hash))]
    async fn process(&self, cmd: InsertDepositEvent) -> Result<bool, sqlx::Error> {
        // Bare DO NOTHING also absorbs a duplicate contract_order_id: the
        // escrow emits exactly one FundsLocked per betId, so a second row
        // with the same betId is the same log replayed.
        let result = sqlx::query(
            r#"
            INSERT INTO contract_events
                (event_kind, contract_order_id, user_wallet, deposit_amount,
                 fund_currency, tx_hash, block_number, event_data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(KIND_DEPOSIT_SUCCESS)
        .bind(&cmd.contract_order_id)
        .bind(&cmd.user_wallet)
        .bind(cmd.amount)
        .bind(&cmd.currency)
        .bind(&cmd.tx_hash)
        .bind(cmd.block_number)
        .bind(&cmd.event_data)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
/// Get the contract event for a betId regardless of its processing state.
pub struct GetContractEventByOrderId {
    pub contract_order_id: String,
}

impl Processor<GetContractEventByOrderId> for DatabaseProcessor {
    type Output = Option<ContractEventRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetContractEventByOrderId")]
    async fn process(
        &self,
        query: GetContractEventByOrderId,
    ) -> Result<Option<ContractEventRecord>, sqlx::Error> {
        sqlx::query_as::<_, ContractEventRecord>(
            "SELECT * FROM contract_events WHERE contract_order_id = $1",
        )
        .bind(&query.contract_order_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Get a deposit that is still in the DEPOSITED state: recorded, not yet
/// consumed by an order, not refunded.
pub struct GetDepositedEvent {
    pub contract_order_id: String,
}

impl Processor<GetDepositedEvent> for DatabaseProcessor {
    type Output = Option<ContractEventRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetDepositedEvent")]
    async fn process(
        &self,
        query: GetDepositedEvent,
    ) -> Result<Option<ContractEventRecord>, sqlx::Error> {
        sqlx::query_as::<_, ContractEventRecord>(
            r#"
            SELECT * FROM contract_events
            WHERE contract_order_id = $1
              AND event_kind = $2
              AND processed = FALSE
              AND refunded_at IS NULL
            "#,
        )
        .bind(&query.contract_order_id)
        .bind(KIND_DEPOSIT_SUCCESS)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Consume a deposit: mark it processed and link the created order. The
/// WHERE guards serialize competing place/unfreeze calls at the DB layer;
/// zero rows affected means the deposit was no longer in DEPOSITED state.
pub struct MarkDepositProcessed {
    pub contract_order_id: String,
    pub order_uuid: String,
}

impl Processor<MarkDepositProcessed> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkDepositProcessed", fields(contract_order_id = %cmd.contract_order_id))]
    async fn process(&self, cmd: MarkDepositProcessed) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE contract_events
            SET processed = TRUE, processed_at = NOW(), order_uuid = $2
            WHERE contract_order_id = $1
              AND processed = FALSE
              AND refunded_at IS NULL
            "#,
        )
        .bind(&cmd.contract_order_id)
        .bind(&cmd.order_uuid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
/// Release a deposit: stamp refunded_at. Same DB-layer guard as
/// [`MarkDepositProcessed`]; zero rows affected means conflict.
pub struct MarkDepositRefunded {
    pub contract_order_id: String,
}

impl Processor<MarkDepositRefunded> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkDepositRefunded", fields(contract_order_id = %cmd.contract_order_id))]
    async fn process(&self, cmd: MarkDepositRefunded) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE contract_events
            SET refunded_at = NOW()
            WHERE contract_order_id = $1
              AND processed = FALSE
              AND refunded_at IS NULL
            "#,
        )
        .bind(&cmd.contract_order_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
