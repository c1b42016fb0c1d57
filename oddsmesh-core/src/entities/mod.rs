pub mod canonical;
pub mod contract_event;
pub mod event;
pub mod odds;
pub mod order;
pub mod users;
pub mod venue;

use oddsmesh_sdk::objects::{EventStatus as SdkEventStatus, OrderStatus as SdkOrderStatus};

/// Normalized venue-event status.
///
/// This is the sqlx::Type version. For API/DTO use, see
/// `oddsmesh_sdk::objects::EventStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "event_status")]
pub enum EventStatus {
    Active,
    Resolved,
    Canceled,
}

impl From<EventStatus> for SdkEventStatus {
    fn from(value: EventStatus) -> Self {
        match value {
            EventStatus::Active => SdkEventStatus::Active,
            EventStatus::Resolved => SdkEventStatus::Resolved,
            EventStatus::Canceled => SdkEventStatus::Canceled,
        }
    }
}

impl From<SdkEventStatus> for EventStatus {
    fn from(value: SdkEventStatus) -> Self {
        match value {
            SdkEventStatus::Active => EventStatus::Active,
            SdkEventStatus::Resolved => EventStatus::Resolved,
            SdkEventStatus::Canceled => EventStatus::Canceled,
        }
    }
}

/// Normalized option classification used to map YES/NO bets onto venues
/// that label options by team name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "option_kind")]
pub enum OptionKind {
    Win,
    Draw,
    Lose,
}

impl OptionKind {
    /// Classify a venue-spelled option name. Anything that is not a
    /// recognizable YES/NO/DRAW label stays unclassified.
    pub fn classify(option_name: &str) -> Option<Self> {
        match option_name.trim().to_ascii_uppercase().as_str() {
            "YES" => Some(OptionKind::Win),
            "NO" => Some(OptionKind::Lose),
            "DRAW" | "TIE" => Some(OptionKind::Draw),
            _ => None,
        }
    }
}

/// Lifecycle status of an aggregated order (database-typed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "order_status")]
pub enum OrderStatus {
    PendingLock,
    Placed,
    Settlable,
    Settled,
    WithdrawRequested,
    Withdrawn,
    Refunded,
}

impl From<OrderStatus> for SdkOrderStatus {
    fn from(value: OrderStatus) -> Self {
        match value {
            OrderStatus::PendingLock => SdkOrderStatus::PendingLock,
            OrderStatus::Placed => SdkOrderStatus::Placed,
            OrderStatus::Settlable => SdkOrderStatus::Settlable,
            OrderStatus::Settled => SdkOrderStatus::Settled,
            OrderStatus::WithdrawRequested => SdkOrderStatus::WithdrawRequested,
            OrderStatus::Withdrawn => SdkOrderStatus::Withdrawn,
            OrderStatus::Refunded => SdkOrderStatus::Refunded,
        }
    }
}

impl From<SdkOrderStatus> for OrderStatus {
    fn from(value: SdkOrderStatus) -> Self {
        match value {
            SdkOrderStatus::PendingLock => OrderStatus::PendingLock,
            SdkOrderStatus::Placed => OrderStatus::Placed,
            SdkOrderStatus::Settlable => OrderStatus::Settlable,
            SdkOrderStatus::Settled => OrderStatus::Settled,
            SdkOrderStatus::WithdrawRequested => OrderStatus::WithdrawRequested,
            SdkOrderStatus::Withdrawn => OrderStatus::Withdrawn,
            SdkOrderStatus::Refunded => OrderStatus::Refunded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_known_labels() {
        assert_eq!(OptionKind::classify("YES"), Some(OptionKind::Win));
        assert_eq!(OptionKind::classify(" no "), Some(OptionKind::Lose));
        assert_eq!(OptionKind::classify("Draw"), Some(OptionKind::Draw));
        assert_eq!(OptionKind::classify("Tie"), Some(OptionKind::Draw));
        assert_eq!(OptionKind::classify("Lakers"), None);
    }
}
