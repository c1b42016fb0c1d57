use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use sqlx::QueryBuilder;

use super::OrderStatus;

/// The aggregated, system-level order. `order_uuid` equals the on-chain
/// betId (64 hex chars), one-to-one with the escrow deposit.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OrderRecord {
    pub id: i64,
    pub order_uuid: String,
    pub user_wallet: String,
    pub event_id: i64,
    pub platform_id: i64,
    pub platform_order_id: Option<String>,
    pub bet_option: String,
    pub bet_amount: Decimal,
    pub fund_currency: String,
    pub locked_odds: Decimal,
    pub expected_profit: Decimal,
    pub actual_profit: Decimal,
    pub platform_fee: Decimal,
    pub manage_fee: Decimal,
    pub gas_fee: Decimal,
    pub fund_lock_tx_hash: Option<String>,
    pub settlement_tx_hash: Option<String>,
    pub status: OrderStatus,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone)]
/// Create the order row after a successful venue placement.
pub struct CreateOrder {
    pub order_uuid: String,
    pub user_wallet: String,
    pub event_id: i64,
    pub platform_id: i64,
    pub platform_order_id: Option<String>,
    pub bet_option: String,
    pub bet_amount: Decimal,
    pub fund_currency: String,
    pub locked_odds: Decimal,
    pub expected_profit: Decimal,
    pub fund_lock_tx_hash: Option<String>,
    pub status: OrderStatus,
}

impl Processor<CreateOrder> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CreateOrder", fields(order_uuid = %cmd.order_uuid))]
    async fn process(&self, cmd: CreateOrder) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO orders
                (order_uuid, user_wallet, event_id, platform_id, platform_order_id,
                 bet_option, bet_amount, fund_currency, locked_odds, expected_profit,
                 fund_lock_tx_hash, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&cmd.order_uuid)
        .bind(&cmd.user_wallet)
        .bind(cmd.event_id)
        .bind(cmd.platform_id)
        .bind(&cmd.platform_order_id)
        .bind(&cmd.bet_option)
        .bind(cmd.bet_amount)
        .bind(&cmd.fund_currency)
        .bind(cmd.locked_odds)
        .bind(cmd.expected_profit)
        .bind(&cmd.fund_lock_tx_hash)
        .bind(cmd.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Get an order by its betId.
pub struct GetOrderByUuid {
    pub order_uuid: String,
}

impl Processor<GetOrderByUuid> for DatabaseProcessor {
    type Output = Option<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOrderByUuid")]
    async fn process(&self, query: GetOrderByUuid) -> Result<Option<OrderRecord>, sqlx::Error> {
        sqlx::query_as::<_, OrderRecord>("SELECT * FROM orders WHERE order_uuid = $1")
            .bind(&query.order_uuid)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Paged order list for one wallet, optionally filtered by status
/// (`settled` selects the withdrawable ones).
pub struct ListOrdersByWallet {
    pub user_wallet: String,
    pub status: Option<OrderStatus>,
    pub page: i64,
    pub page_size: i64,
}

impl Processor<ListOrdersByWallet> for DatabaseProcessor {
    type Output = (Vec<OrderRecord>, i64);
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListOrdersByWallet")]
    async fn process(
        &self,
        query: ListOrdersByWallet,
    ) -> Result<(Vec<OrderRecord>, i64), sqlx::Error> {
        let page = query.page.max(1);
        let page_size = query.page_size.clamp(1, 100);

        let mut count_qb =
            QueryBuilder::new("SELECT COUNT(*) FROM orders WHERE user_wallet = ");
        count_qb.push_bind(query.user_wallet.clone());
        if let Some(status) = query.status {
            count_qb.push(" AND status = ");
            count_qb.push_bind(status);
        }
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::new("SELECT * FROM orders WHERE user_wallet = ");
        qb.push_bind(query.user_wallet.clone());
        if let Some(status) = query.status {
            qb.push(" AND status = ");
            qb.push_bind(status);
        }
        qb.push(" ORDER BY created_at DESC LIMIT ");
        qb.push_bind(page_size);
        qb.push(" OFFSET ");
        qb.push_bind((page - 1) * page_size);

        let items = qb.build_query_as::<OrderRecord>().fetch_all(&self.pool).await?;
        Ok((items, total))
    }
}

#[derive(Debug, Clone, Copy)]
/// All orders placed on one venue event (result-sync sweep input).
pub struct ListOrdersByEventId {
    pub event_id: i64,
}

impl Processor<ListOrdersByEventId> for DatabaseProcessor {
    type Output = Vec<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListOrdersByEventId")]
    async fn process(&self, query: ListOrdersByEventId) -> Result<Vec<OrderRecord>, sqlx::Error> {
        sqlx::query_as::<_, OrderRecord>("SELECT * FROM orders WHERE event_id = $1")
            .bind(query.event_id)
            .fetch_all(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Move an order to a new status.
pub struct UpdateOrderStatus {
    pub order_uuid: String,
    pub status: OrderStatus,
}

impl Processor<UpdateOrderStatus> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateOrderStatus", fields(order_uuid = %cmd.order_uuid))]
    async fn process(&self, cmd: UpdateOrderStatus) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE orders SET status = $2 WHERE order_uuid = $1")
            .bind(&cmd.order_uuid)
            .bind(cmd.status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Apply a settlement: tx hash, realized profit and fees, status `settled`.
pub struct UpdateOrderSettlement {
    pub order_uuid: String,
    pub settlement_tx_hash: String,
    pub actual_profit: Decimal,
    pub manage_fee: Decimal,
    pub gas_fee: Decimal,
}

impl Processor<UpdateOrderSettlement> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateOrderSettlement", fields(order_uuid = %cmd.order_uuid))]
    async fn process(&self, cmd: UpdateOrderSettlement) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE orders
            SET settlement_tx_hash = $2,
                actual_profit = $3,
                manage_fee = $4,
                gas_fee = $5,
                status = 'settled'
            WHERE order_uuid = $1
            "#,
        )
        .bind(&cmd.order_uuid)
        .bind(&cmd.settlement_tx_hash)
        .bind(cmd.actual_profit)
        .bind(cmd.manage_fee)
        .bind(cmd.gas_fee)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Append the immutable settlement audit row. Conflicts on tx_hash are
/// ignored so a replayed Settled log cannot duplicate the record; returns
/// whether a new row was written.
pub struct CreateSettlementRecord {
    pub order_uuid: String,
    pub user_wallet: String,
    pub settlement_amount: Decimal,
    pub manage_fee: Decimal,
    pub gas_fee: Decimal,
    pub tx_hash: String,
}

impl Processor<CreateSettlementRecord> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CreateSettlementRecord", fields(order_uuid = %cmd.order_uuid, tx_hash = %cmd.tx_hash))]
    async fn process(&self, cmd: CreateSettlementRecord) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO settlement_records
                (order_uuid, user_wallet, settlement_amount, manage_fee, gas_fee, tx_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tx_hash) DO NOTHING
            "#,
        )
        .bind(&cmd.order_uuid)
        .bind(&cmd.user_wallet)
        .bind(cmd.settlement_amount)
        .bind(cmd.manage_fee)
        .bind(cmd.gas_fee)
        .bind(&cmd.tx_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
