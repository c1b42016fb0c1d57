//! The order state machine.
//!
//! Inputs: chain-listener callbacks (`deposit_success`,
//! `on_settlement_completed`), the user-facing prepare/place/unfreeze/
//! withdraw requests, and the result-sync sweeps. State lives in the
//! store; the `(processed, refunded_at)` flags on the contract event row
//! serialize competing operations on one betId at the DB layer.

use kanau::processor::Processor;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;

use oddsmesh_sdk::objects::{
    ContractOrderStatus, OrderDetail, OrderListItem, OrderListResult, PlaceOrderRequest,
    PlaceOrderResult, PrepareOrderRequest, PrepareOrderResult, WithdrawInfo, WithdrawKind,
};

use crate::DatabaseProcessor;
use crate::adapters::{AdapterRegistry, VenueError, VenuePlaceOrder};
use crate::chain::executor::Executor;
use crate::chain::{ChainError, decimal_to_usdc};
use crate::config::ChainConfig;
use crate::entities::contract_event::{
    ContractEventRecord, GetContractEventByOrderId, GetDepositedEvent, InsertDepositEvent,
    MarkDepositProcessed, MarkDepositRefunded,
};
use crate::entities::event::{EventRecord, GetEventById, GetEventByUuid};
use crate::entities::canonical::{GetCanonicalIdByEventId, ListLinksByCanonicalId};
use crate::entities::odds::{GetOddsByEventIds, LiveOddsUpsert, UpsertLiveOdds};
use crate::entities::order::{
    CreateOrder, CreateSettlementRecord, GetOrderByUuid, ListOrdersByWallet, OrderRecord,
    UpdateOrderSettlement, UpdateOrderStatus,
};
use crate::entities::users::AccrueUserSettlement;
use crate::entities::{OptionKind, OrderStatus};
use crate::fiat::FiatConversion;
use crate::processors::{now_unix, unix_millis};
use crate::signature::{
    PREPARE_EXPIRY_SECS, SignatureError, build_place_order_message, verify_personal_sign,
};

/// Odds bounds submitted to venues and stored on orders.
pub const MIN_LOCKED_ODDS: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
pub const MAX_LOCKED_ODDS: Decimal = Decimal::from_parts(99, 0, 0, false, 2);

/// Tolerated gap between the request amount and the on-chain deposit.
const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Withdraw fee on positive profit, in basis points.
const WITHDRAW_FEE_BPS: i64 = 100;

/// Errors of the order pipeline, mapped onto HTTP by the server layer.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("contract order already placed")]
    AlreadyPlaced,
    #[error("contract order already refunded")]
    AlreadyRefunded,
    #[error("conflict: {0}")]
    ConflictState(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error(transparent)]
    SignatureInvalid(#[from] SignatureError),
    #[error(transparent)]
    Venue(#[from] VenueError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A FundsLocked log decoded by the chain listener.
#[derive(Debug, Clone)]
pub struct DepositSuccess {
    /// Hex betId, no 0x prefix.
    pub contract_order_id: String,
    pub user_wallet: String,
    pub amount: Decimal,
    pub currency: String,
    pub tx_hash: String,
    pub block_number: Option<i64>,
    pub raw: serde_json::Value,
}

/// One price candidate during best-venue selection.
#[derive(Debug, Clone)]
struct OddsCandidate {
    event_id: i64,
    platform_id: i64,
    platform_event_id: String,
    option_name: String,
    option_type: Option<OptionKind>,
    price: Decimal,
}

pub struct OrderService {
    processor: DatabaseProcessor,
    adapters: Arc<AdapterRegistry>,
    fiat: Arc<dyn FiatConversion>,
    chain: Arc<RwLock<ChainConfig>>,
}

impl OrderService {
    pub fn new(
        processor: DatabaseProcessor,
        adapters: Arc<AdapterRegistry>,
        fiat: Arc<dyn FiatConversion>,
        chain: Arc<RwLock<ChainConfig>>,
    ) -> Self {
        Self {
            processor,
            adapters,
            fiat,
            chain,
        }
    }

    // -----------------------------------------------------------------
    // Listener callbacks
    // -----------------------------------------------------------------

    /// Record a FundsLocked deposit. Idempotent on tx_hash: a replayed log
    /// is a no-op.
    pub async fn deposit_success(&self, ev: DepositSuccess) -> Result<(), OrderError> {
        let inserted = self
            .processor
            .process(InsertDepositEvent {
                contract_order_id: ev.contract_order_id.clone(),
                user_wallet: ev.user_wallet,
                amount: ev.amount,
                currency: ev.currency,
                tx_hash: ev.tx_hash.clone(),
                block_number: ev.block_number,
                event_data: ev.raw,
            })
            .await?;
        if inserted {
            tracing::info!(
                contract_order_id = %ev.contract_order_id,
                tx_hash = %ev.tx_hash,
                "deposit recorded"
            );
        } else {
            tracing::info!(tx_hash = %ev.tx_hash, "duplicate chain log ignored");
        }
        Ok(())
    }

    /// Apply an on-chain settlement. A missing order can only mean
    /// out-of-order delivery; the log is replayed on reconnect, so drop it.
    pub async fn on_settlement_completed(
        &self,
        order_uuid: &str,
        tx_hash: &str,
        payout: Decimal,
        fee: Decimal,
        gas_fee: Decimal,
    ) -> Result<(), OrderError> {
        let Some(order) = self
            .processor
            .process(GetOrderByUuid {
                order_uuid: order_uuid.to_string(),
            })
            .await?
        else {
            tracing::warn!(
                order_uuid,
                tx_hash,
                "settlement for unknown order dropped, awaiting replay"
            );
            return Ok(());
        };

        self.processor
            .process(UpdateOrderSettlement {
                order_uuid: order_uuid.to_string(),
                settlement_tx_hash: tx_hash.to_string(),
                actual_profit: payout - order.bet_amount,
                manage_fee: fee,
                gas_fee,
            })
            .await?;
        let recorded = self
            .processor
            .process(CreateSettlementRecord {
                order_uuid: order_uuid.to_string(),
                user_wallet: order.user_wallet.clone(),
                settlement_amount: payout,
                manage_fee: fee,
                gas_fee,
                tx_hash: tx_hash.to_string(),
            })
            .await?;
        // Accrue stats only for a first-seen settlement so a replayed log
        // cannot double-count.
        if recorded {
            if let Err(e) = self
                .processor
                .process(AccrueUserSettlement {
                    wallet_address: order.user_wallet,
                    profit: payout - order.bet_amount,
                    fee,
                    gas_fee,
                })
                .await
            {
                tracing::warn!(order_uuid, error = %e, "user stats accrual failed");
            }
        }
        tracing::info!(order_uuid, tx_hash, %payout, %fee, "order settled");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Prepare / Place
    // -----------------------------------------------------------------

    /// Quote the best live price and hand back the message to sign. No
    /// state is persisted here.
    pub async fn prepare(
        &self,
        req: &PrepareOrderRequest,
    ) -> Result<PrepareOrderResult, OrderError> {
        if req.contract_order_id.is_empty() || req.event_uuid.is_empty() || req.bet_option.is_empty()
        {
            return Err(OrderError::Validation(
                "contract_order_id, event_uuid and bet_option are required".to_string(),
            ));
        }
        self.deposited_event(&req.contract_order_id).await?;

        let (primary, linked) = self.resolve_event_and_links(&req.event_uuid).await?;
        let (candidates, _) = self.live_odds_candidates(&primary, &linked).await?;
        let best = pick_best_odds(&candidates, &req.bet_option)?;

        let locked_odds = clamp_odds(best.price);
        let expires_at = now_unix() + PREPARE_EXPIRY_SECS;
        let message_to_sign = build_place_order_message(
            &req.contract_order_id,
            &req.event_uuid,
            &req.bet_option,
            locked_odds,
            expires_at,
        );
        Ok(PrepareOrderResult {
            locked_odds,
            message_to_sign,
            expires_at_sec: expires_at,
        })
    }

    /// Verify, route to the best venue, place the venue-side order, then
    /// persist. Any venue failure aborts before anything is written; the
    /// deposit stays in DEPOSITED.
    pub async fn place(&self, req: &PlaceOrderRequest) -> Result<PlaceOrderResult, OrderError> {
        if req.contract_order_id.is_empty() || req.event_uuid.is_empty() || req.bet_option.is_empty()
        {
            return Err(OrderError::Validation(
                "contract_order_id, event_uuid and bet_option are required".to_string(),
            ));
        }
        let deposit = self.deposited_event(&req.contract_order_id).await?;

        if let Some(signature) = req.signature.as_deref() {
            let message = req.message_to_sign.as_deref().ok_or_else(|| {
                OrderError::Validation("message_to_sign is required with a signature".to_string())
            })?;
            verify_personal_sign(&deposit.user_wallet, message, signature, now_unix())?;
        }

        let deposit_amount = deposit.deposit_amount.unwrap_or(Decimal::ZERO);
        if deposit_amount <= Decimal::ZERO {
            return Err(OrderError::Validation(
                "deposit amount is not positive".to_string(),
            ));
        }
        if let Some(amount) = req.amount {
            if (amount - deposit_amount).abs() > AMOUNT_TOLERANCE {
                return Err(OrderError::Validation(format!(
                    "requested amount {amount} does not match deposited {deposit_amount}"
                )));
            }
        }
        let fund_currency = deposit
            .fund_currency
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "USDC".to_string());

        let (primary, linked) = self.resolve_event_and_links(&req.event_uuid).await?;
        let (candidates, fetched) = self.live_odds_candidates(&primary, &linked).await?;
        let best = pick_best_odds(&candidates, &req.bet_option)?.clone();

        let Some(trading) = self.adapters.trading(best.platform_id) else {
            return Err(OrderError::Venue(VenueError::NotConfigured(
                "trading adapter for best venue",
            )));
        };

        // USD-priced venues trade the converted amount; the order row
        // still records the native deposit.
        let venue_amount = if trading.fiat_denominated() {
            self.fiat
                .convert_to_usd(deposit_amount, &fund_currency)
                .await
                .map_err(|e| OrderError::Validation(format!("fiat conversion failed: {e}")))?
        } else {
            deposit_amount
        };

        let locked_odds = clamp_odds(match req.locked_odds {
            Some(client_odds) if client_odds > Decimal::ZERO => client_odds,
            _ => best.price,
        });

        let platform_order_id = trading
            .place_order(&VenuePlaceOrder {
                venue_event_id: best.platform_event_id.clone(),
                bet_option: best.option_name.clone(),
                amount: venue_amount,
                locked_odds,
            })
            .await?;

        let expected_profit = if best.price > Decimal::ZERO {
            deposit_amount * (Decimal::ONE / best.price - Decimal::ONE)
        } else {
            Decimal::ZERO
        };

        let create = CreateOrder {
            order_uuid: req.contract_order_id.clone(),
            user_wallet: deposit.user_wallet.clone(),
            event_id: best.event_id,
            platform_id: best.platform_id,
            platform_order_id: Some(platform_order_id.clone()),
            bet_option: best.option_name.clone(),
            bet_amount: deposit_amount,
            fund_currency,
            locked_odds,
            expected_profit,
            fund_lock_tx_hash: Some(deposit.tx_hash.clone()),
            status: OrderStatus::Placed,
        };
        if let Err(e) = self.processor.process(create).await {
            if is_unique_violation(&e) {
                return Err(OrderError::AlreadyPlaced);
            }
            return Err(e.into());
        }

        let consumed = self
            .processor
            .process(MarkDepositProcessed {
                contract_order_id: req.contract_order_id.clone(),
                order_uuid: req.contract_order_id.clone(),
            })
            .await?;
        if !consumed {
            tracing::warn!(
                contract_order_id = %req.contract_order_id,
                "deposit flag changed between venue placement and processing mark"
            );
        }

        // Push the prices used for routing back into the store so list and
        // detail views show what the order saw.
        if !fetched.is_empty() {
            if let Err(e) = self.processor.process(UpsertLiveOdds { rows: fetched }).await {
                tracing::warn!(error = %e, "failed to write back live odds");
            }
        }

        tracing::info!(
            contract_order_id = %req.contract_order_id,
            platform_id = best.platform_id,
            platform_order_id = %platform_order_id,
            %locked_odds,
            "order placed"
        );
        Ok(PlaceOrderResult {
            order_uuid: req.contract_order_id.clone(),
            platform_order_id,
            platform_id: best.platform_id,
            status: OrderStatus::Placed.into(),
        })
    }

    // -----------------------------------------------------------------
    // Unfreeze / Withdraw
    // -----------------------------------------------------------------

    /// Release a still-unused deposit back to the user. Only a confirmed,
    /// successful receipt moves the flag; a revert surfaces verbatim.
    pub async fn request_unfreeze(
        &self,
        contract_order_id: &str,
        wallet: Option<&str>,
    ) -> Result<String, OrderError> {
        if contract_order_id.is_empty() {
            return Err(OrderError::Validation(
                "contract_order_id is required".to_string(),
            ));
        }
        let executor = Executor::from_config(&self.chain.read().await.clone())?;
        let deposit = self.deposited_event(contract_order_id).await?;

        if let Some(wallet) = wallet {
            if !wallet.eq_ignore_ascii_case(&deposit.user_wallet) {
                return Err(OrderError::Validation(
                    "wallet does not match the deposit wallet".to_string(),
                ));
            }
        }
        let amount = deposit.deposit_amount.unwrap_or(Decimal::ZERO);
        let units = decimal_to_usdc(amount)?;
        let to = deposit
            .user_wallet
            .parse()
            .map_err(|_| OrderError::Validation("deposit wallet is not an address".to_string()))?;

        let tx_hash = executor.release_funds(contract_order_id, to, units).await?;

        let marked = self
            .processor
            .process(MarkDepositRefunded {
                contract_order_id: contract_order_id.to_string(),
            })
            .await?;
        if !marked {
            // The release already landed; losing the flag race is only a
            // bookkeeping anomaly worth an operator's attention.
            tracing::warn!(
                contract_order_id,
                tx_hash = %tx_hash,
                "refund confirmed on chain but deposit flag was already taken"
            );
        }
        tracing::info!(contract_order_id, tx_hash = %tx_hash, "deposit unfrozen");
        Ok(tx_hash)
    }

    /// Withdraw parameters for a settled order.
    pub async fn get_withdraw_info(&self, order_uuid: &str) -> Result<WithdrawInfo, OrderError> {
        let order = self.settled_order(order_uuid).await?;
        let (payout, fee) = withdraw_amounts(&order);

        if self.is_fiat_venue(order.platform_id) {
            Ok(WithdrawInfo {
                order_uuid: order.order_uuid,
                user_wallet: order.user_wallet,
                kind: WithdrawKind::Kalshi,
                amount: payout,
                fee: Some(fee),
                user_amount: Some(payout - fee),
                contract_address: None,
                method: None,
                message: "payout minus the 1% fee is settled by the backend".to_string(),
            })
        } else {
            let escrow = self.chain.read().await.escrow_address.clone();
            Ok(WithdrawInfo {
                order_uuid: order.order_uuid,
                user_wallet: order.user_wallet,
                kind: WithdrawKind::Chain,
                amount: payout,
                fee: None,
                user_amount: None,
                contract_address: escrow,
                method: Some("withdraw".to_string()),
                message: "sign and pay gas for the on-chain withdraw".to_string(),
            })
        }
    }

    /// Kick off a withdraw: fiat venues settle backend-side and flip to
    /// `withdrawn`; chain venues only record the request, the user signs
    /// the actual transaction.
    pub async fn request_withdraw(&self, order_uuid: &str) -> Result<(), OrderError> {
        let order = self.settled_order(order_uuid).await?;
        let next = if self.is_fiat_venue(order.platform_id) {
            let (payout, fee) = withdraw_amounts(&order);
            tracing::info!(
                order_uuid,
                %payout,
                %fee,
                user_amount = %(payout - fee),
                "fiat withdraw computed; payout execution is external"
            );
            OrderStatus::Withdrawn
        } else {
            OrderStatus::WithdrawRequested
        };
        self.processor
            .process(UpdateOrderStatus {
                order_uuid: order.order_uuid,
                status: next,
            })
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// Coarse deposit status for the frontend.
    pub async fn contract_order_status(
        &self,
        contract_order_id: &str,
    ) -> Result<ContractOrderStatus, OrderError> {
        if contract_order_id.is_empty() {
            return Err(OrderError::Validation(
                "contract_order_id is required".to_string(),
            ));
        }
        let Some(event) = self
            .processor
            .process(GetContractEventByOrderId {
                contract_order_id: contract_order_id.to_string(),
            })
            .await?
        else {
            return Ok(ContractOrderStatus::NotFound);
        };
        if event.refunded_at.is_some() {
            return Ok(ContractOrderStatus::Refunded);
        }
        if event.processed {
            return Ok(ContractOrderStatus::Placed);
        }
        Ok(ContractOrderStatus::Unprocessed)
    }

    /// Paged orders for one wallet, joined with event titles.
    pub async fn list_orders(
        &self,
        user_wallet: &str,
        status: Option<OrderStatus>,
        page: i64,
        page_size: i64,
    ) -> Result<OrderListResult, OrderError> {
        let (orders, total) = self
            .processor
            .process(ListOrdersByWallet {
                user_wallet: user_wallet.to_string(),
                status,
                page,
                page_size,
            })
            .await?;

        let mut items = Vec::with_capacity(orders.len());
        for order in orders {
            let event_title = self
                .processor
                .process(GetEventById {
                    event_id: order.event_id,
                })
                .await?
                .map(|e| e.title)
                .unwrap_or_default();
            items.push(OrderListItem {
                order_uuid: order.order_uuid,
                user_wallet: order.user_wallet,
                event_title,
                event_id: order.event_id,
                platform_id: order.platform_id,
                platform_order_id: order.platform_order_id,
                bet_option: order.bet_option,
                bet_amount: order.bet_amount,
                locked_odds: order.locked_odds,
                status: order.status.into(),
                created_at: unix_millis(order.created_at),
            });
        }
        Ok(OrderListResult {
            page: page.max(1),
            page_size: page_size.clamp(1, 100),
            total,
            items,
        })
    }

    /// Full order detail including event context and both tx hashes.
    pub async fn order_detail(&self, order_uuid: &str) -> Result<OrderDetail, OrderError> {
        let order = self
            .processor
            .process(GetOrderByUuid {
                order_uuid: order_uuid.to_string(),
            })
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {order_uuid}")))?;
        let event = self
            .processor
            .process(GetEventById {
                event_id: order.event_id,
            })
            .await?;

        let (event_uuid, event_title, start_time, end_time) = match event {
            Some(e) => (
                e.event_uuid,
                e.title,
                unix_millis(e.start_time),
                unix_millis(e.end_time),
            ),
            None => (String::new(), String::new(), 0, 0),
        };
        Ok(OrderDetail {
            order_uuid: order.order_uuid,
            platform_order_id: order.platform_order_id,
            user_wallet: order.user_wallet,
            event_id: order.event_id,
            event_uuid,
            event_title,
            platform_id: order.platform_id,
            bet_option: order.bet_option,
            bet_amount: order.bet_amount,
            fund_currency: order.fund_currency,
            locked_odds: order.locked_odds,
            expected_profit: order.expected_profit,
            actual_profit: order.actual_profit,
            status: order.status.into(),
            fund_lock_tx_hash: order.fund_lock_tx_hash,
            settlement_tx_hash: order.settlement_tx_hash,
            start_time,
            end_time,
            created_at: unix_millis(order.created_at),
            updated_at: unix_millis(order.updated_at),
        })
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    /// The deposit in DEPOSITED state, or the precise failure: missing,
    /// already consumed, or already refunded.
    async fn deposited_event(
        &self,
        contract_order_id: &str,
    ) -> Result<ContractEventRecord, OrderError> {
        if let Some(event) = self
            .processor
            .process(GetDepositedEvent {
                contract_order_id: contract_order_id.to_string(),
            })
            .await?
        {
            return Ok(event);
        }
        match self
            .processor
            .process(GetContractEventByOrderId {
                contract_order_id: contract_order_id.to_string(),
            })
            .await?
        {
            Some(event) if event.processed => Err(OrderError::AlreadyPlaced),
            Some(event) if event.refunded_at.is_some() => Err(OrderError::AlreadyRefunded),
            _ => Err(OrderError::NotFound(format!(
                "no deposit for contract_order_id {contract_order_id}"
            ))),
        }
    }

    /// Must exist and be in `settled`.
    async fn settled_order(&self, order_uuid: &str) -> Result<OrderRecord, OrderError> {
        let order = self
            .processor
            .process(GetOrderByUuid {
                order_uuid: order_uuid.to_string(),
            })
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {order_uuid}")))?;
        if order.status != OrderStatus::Settled {
            return Err(OrderError::ConflictState(format!(
                "order status {:?} is not withdrawable",
                order.status
            )));
        }
        Ok(order)
    }

    fn is_fiat_venue(&self, platform_id: i64) -> bool {
        self.adapters
            .trading(platform_id)
            .map(|t| t.fiat_denominated())
            .unwrap_or(platform_id == crate::adapters::VENUE_KALSHI)
    }

    /// Resolve the target by external uuid or numeric canonical id, and
    /// expand to all venue events of its canonical grouping.
    async fn resolve_event_and_links(
        &self,
        event_uuid_or_canonical: &str,
    ) -> Result<(EventRecord, Vec<EventRecord>), OrderError> {
        let primary = match self
            .processor
            .process(GetEventByUuid {
                event_uuid: event_uuid_or_canonical.to_string(),
            })
            .await?
        {
            Some(event) => event,
            None => {
                let canonical_id = event_uuid_or_canonical.parse::<i64>().map_err(|_| {
                    OrderError::NotFound(format!(
                        "event {event_uuid_or_canonical} is neither an event_uuid nor a canonical id"
                    ))
                })?;
                let links = self
                    .processor
                    .process(ListLinksByCanonicalId { canonical_id })
                    .await?;
                let first = links.first().ok_or_else(|| {
                    OrderError::NotFound(format!("canonical event {canonical_id}"))
                })?;
                self.processor
                    .process(GetEventById {
                        event_id: first.event_id,
                    })
                    .await?
                    .ok_or_else(|| {
                        OrderError::NotFound(format!("event {} for canonical link", first.event_id))
                    })?
            }
        };

        let mut linked = Vec::new();
        if let Some(canonical_id) = self
            .processor
            .process(GetCanonicalIdByEventId {
                event_id: primary.id,
            })
            .await?
        {
            for link in self
                .processor
                .process(ListLinksByCanonicalId { canonical_id })
                .await?
            {
                if let Some(event) = self
                    .processor
                    .process(GetEventById {
                        event_id: link.event_id,
                    })
                    .await?
                {
                    linked.push(event);
                }
            }
        }
        if linked.is_empty() {
            linked.push(primary.clone());
        }
        Ok((primary, linked))
    }

    /// Fan out to each linked venue for fresh prices; venues that fail are
    /// skipped. When every venue fails, fall back to the stored snapshot.
    /// Returns the candidates plus the fetched rows for write-back.
    async fn live_odds_candidates(
        &self,
        primary: &EventRecord,
        linked: &[EventRecord],
    ) -> Result<(Vec<OddsCandidate>, Vec<LiveOddsUpsert>), OrderError> {
        let mut candidates = Vec::new();
        let mut fetched = Vec::new();

        for event in linked {
            let Some(source) = self.adapters.live_odds(event.platform_id) else {
                continue;
            };
            match source.fetch_live_odds(&event.platform_event_id).await {
                Ok(rows) => {
                    for row in rows {
                        candidates.push(OddsCandidate {
                            event_id: event.id,
                            platform_id: event.platform_id,
                            platform_event_id: event.platform_event_id.clone(),
                            option_name: row.option_name.clone(),
                            option_type: OptionKind::classify(&row.option_name),
                            price: row.price,
                        });
                        fetched.push(LiveOddsUpsert {
                            event_id: event.id,
                            platform_id: event.platform_id,
                            platform_event_id: event.platform_event_id.clone(),
                            option_name: row.option_name,
                            price: row.price,
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        platform_id = event.platform_id,
                        venue_event_id = %event.platform_event_id,
                        error = %e,
                        "live odds fetch failed, skipping venue"
                    );
                }
            }
        }

        if candidates.is_empty() {
            let event_ids: Vec<i64> = linked.iter().map(|e| e.id).collect();
            let stored = self
                .processor
                .process(GetOddsByEventIds { event_ids })
                .await?;
            let event_by_id: std::collections::HashMap<i64, &EventRecord> =
                linked.iter().map(|e| (e.id, e)).collect();
            for row in stored {
                let platform_event_id = event_by_id
                    .get(&row.event_id)
                    .map(|e| e.platform_event_id.clone())
                    .unwrap_or_else(|| primary.platform_event_id.clone());
                candidates.push(OddsCandidate {
                    event_id: row.event_id,
                    platform_id: row.platform_id,
                    platform_event_id,
                    option_name: row.option_name,
                    option_type: row.option_type,
                    price: row.price,
                });
            }
        }

        if candidates.is_empty() {
            return Err(OrderError::Validation(
                "no odds available for this event".to_string(),
            ));
        }
        Ok((candidates, fetched))
    }
}

/// Clamp to the [0.01, 0.99] band venues accept.
fn clamp_odds(price: Decimal) -> Decimal {
    price.clamp(MIN_LOCKED_ODDS, MAX_LOCKED_ODDS)
}

/// Highest price matching the side: exact option-name match, or YES/NO
/// mapped onto the win/lose option types. Ties keep the first seen.
fn pick_best_odds<'a>(
    candidates: &'a [OddsCandidate],
    bet_option: &str,
) -> Result<&'a OddsCandidate, OrderError> {
    let bet = bet_option.trim();
    if bet.is_empty() {
        return Err(OrderError::Validation("bet_option is required".to_string()));
    }
    let bet_upper = bet.to_ascii_uppercase();

    let mut best: Option<&OddsCandidate> = None;
    for candidate in candidates {
        let name_match = candidate.option_name.trim().eq_ignore_ascii_case(bet);
        let kind_match = matches!(
            (bet_upper.as_str(), candidate.option_type),
            ("YES", Some(OptionKind::Win)) | ("NO", Some(OptionKind::Lose))
        );
        if !name_match && !kind_match {
            continue;
        }
        match best {
            Some(current) if candidate.price <= current.price => {}
            _ => best = Some(candidate),
        }
    }
    best.ok_or_else(|| {
        OrderError::Validation(format!("no odds match bet_option {bet_option:?}"))
    })
}

/// Payout and fee for a settled order. Orders settled as losses carry no
/// settlement transaction and pay out nothing.
fn withdraw_amounts(order: &OrderRecord) -> (Decimal, Decimal) {
    if order.settlement_tx_hash.is_none() {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    let payout = (order.bet_amount + order.actual_profit).max(Decimal::ZERO);
    let profit = order.actual_profit.max(Decimal::ZERO);
    let fee = profit * Decimal::from(WITHDRAW_FEE_BPS) / Decimal::from(10_000);
    (payout, fee)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candidate(
        platform_id: i64,
        name: &str,
        kind: Option<OptionKind>,
        price: Decimal,
    ) -> OddsCandidate {
        OddsCandidate {
            event_id: platform_id,
            platform_id,
            platform_event_id: format!("ev-{platform_id}"),
            option_name: name.to_string(),
            option_type: kind,
            price,
        }
    }

    #[test]
    fn clamp_keeps_odds_inside_band() {
        assert_eq!(clamp_odds(dec!(1.00)), dec!(0.99));
        assert_eq!(clamp_odds(dec!(0.00)), dec!(0.01));
        assert_eq!(clamp_odds(dec!(0.65)), dec!(0.65));
    }

    #[test]
    fn best_odds_prefers_highest_matching_price() {
        let candidates = vec![
            candidate(1, "YES", Some(OptionKind::Win), dec!(0.60)),
            candidate(2, "YES", Some(OptionKind::Win), dec!(0.65)),
            candidate(2, "NO", Some(OptionKind::Lose), dec!(0.40)),
        ];
        let best = pick_best_odds(&candidates, "YES").unwrap();
        assert_eq!(best.platform_id, 2);
        assert_eq!(best.price, dec!(0.65));
    }

    #[test]
    fn best_odds_ties_keep_first_seen() {
        let candidates = vec![
            candidate(1, "YES", Some(OptionKind::Win), dec!(0.65)),
            candidate(2, "YES", Some(OptionKind::Win), dec!(0.65)),
        ];
        assert_eq!(pick_best_odds(&candidates, "YES").unwrap().platform_id, 1);
    }

    #[test]
    fn yes_maps_to_win_type_on_named_options() {
        // A venue that labels options by team publishes win/lose types.
        let candidates = vec![
            candidate(1, "Lakers", Some(OptionKind::Win), dec!(0.58)),
            candidate(1, "Celtics", Some(OptionKind::Lose), dec!(0.42)),
            candidate(1, "Draw", Some(OptionKind::Draw), dec!(0.05)),
        ];
        let yes = pick_best_odds(&candidates, "YES").unwrap();
        assert_eq!(yes.option_name, "Lakers");
        let no = pick_best_odds(&candidates, "NO").unwrap();
        assert_eq!(no.option_name, "Celtics");
        // A draw option never matches a YES/NO bet.
        assert!(pick_best_odds(&candidates, "MAYBE").is_err());
    }

    #[test]
    fn exact_name_match_works_for_team_options() {
        let candidates = vec![
            candidate(1, "Viktoriya Tomova", None, dec!(0.55)),
            candidate(1, "Suzan Lamens", None, dec!(0.45)),
        ];
        let best = pick_best_odds(&candidates, "suzan lamens").unwrap();
        assert_eq!(best.price, dec!(0.45));
    }

    fn settled_order(
        actual_profit: Decimal,
        settlement_tx_hash: Option<&str>,
    ) -> OrderRecord {
        let now = time::PrimitiveDateTime::new(
            time::Date::from_calendar_date(2026, time::Month::April, 1).unwrap(),
            time::Time::MIDNIGHT,
        );
        OrderRecord {
            id: 1,
            order_uuid: "ab".repeat(32),
            user_wallet: "0x0000000000000000000000000000000000000001".to_string(),
            event_id: 1,
            platform_id: 2,
            platform_order_id: Some("k-1".to_string()),
            bet_option: "YES".to_string(),
            bet_amount: dec!(10),
            fund_currency: "USDC".to_string(),
            locked_odds: dec!(0.65),
            expected_profit: dec!(5.38),
            actual_profit,
            platform_fee: Decimal::ZERO,
            manage_fee: Decimal::ZERO,
            gas_fee: Decimal::ZERO,
            fund_lock_tx_hash: Some("0xlock".to_string()),
            settlement_tx_hash: settlement_tx_hash.map(|s| s.to_string()),
            status: OrderStatus::Settled,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn withdraw_amounts_take_one_percent_of_profit() {
        let order = settled_order(dec!(5), Some("0xsettle"));
        let (payout, fee) = withdraw_amounts(&order);
        assert_eq!(payout, dec!(15));
        assert_eq!(fee, dec!(0.05));
    }

    #[test]
    fn lost_orders_pay_out_nothing() {
        // Losses settle without a settlement transaction.
        let order = settled_order(Decimal::ZERO, None);
        let (payout, fee) = withdraw_amounts(&order);
        assert_eq!(payout, Decimal::ZERO);
        assert_eq!(fee, Decimal::ZERO);
    }

    #[test]
    fn negative_profit_never_charges_a_fee() {
        let order = settled_order(dec!(-10), Some("0xsettle"));
        let (payout, fee) = withdraw_amounts(&order);
        assert_eq!(payout, Decimal::ZERO);
        assert_eq!(fee, Decimal::ZERO);
    }
}
