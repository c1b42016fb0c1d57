use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;

/// Running settlement totals per wallet. No API surface; accrued as
/// settlements land and kept for reporting.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub wallet_address: String,
    pub total_profit: Decimal,
    pub total_loss: Decimal,
    pub total_fee: Decimal,
    pub gas_fee_total: Decimal,
    pub is_active: bool,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

/// Split a signed profit into (profit, loss) accrual columns.
pub fn profit_split(profit: Decimal) -> (Decimal, Decimal) {
    if profit >= Decimal::ZERO {
        (profit, Decimal::ZERO)
    } else {
        (Decimal::ZERO, -profit)
    }
}

#[derive(Debug, Clone)]
/// Accrue one settlement onto the wallet's running totals, creating the
/// row on first contact.
pub struct AccrueUserSettlement {
    pub wallet_address: String,
    /// Signed realized profit of the settled order.
    pub profit: Decimal,
    pub fee: Decimal,
    pub gas_fee: Decimal,
}

impl Processor<AccrueUserSettlement> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AccrueUserSettlement", fields(wallet = %cmd.wallet_address))]
    async fn process(&self, cmd: AccrueUserSettlement) -> Result<(), sqlx::Error> {
        let (profit, loss) = profit_split(cmd.profit);
        sqlx::query(
            r#"
            INSERT INTO users (wallet_address, total_profit, total_loss, total_fee, gas_fee_total)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (wallet_address) DO UPDATE SET
                total_profit = users.total_profit + EXCLUDED.total_profit,
                total_loss = users.total_loss + EXCLUDED.total_loss,
                total_fee = users.total_fee + EXCLUDED.total_fee,
                gas_fee_total = users.gas_fee_total + EXCLUDED.gas_fee_total
            "#,
        )
        .bind(&cmd.wallet_address)
        .bind(profit)
        .bind(loss)
        .bind(cmd.fee)
        .bind(cmd.gas_fee)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn profit_splits_into_the_right_column() {
        assert_eq!(profit_split(dec!(5)), (dec!(5), dec!(0)));
        assert_eq!(profit_split(dec!(-10)), (dec!(0), dec!(10)));
        assert_eq!(profit_split(dec!(0)), (dec!(0), dec!(0)));
    }
}
