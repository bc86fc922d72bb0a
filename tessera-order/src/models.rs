use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tessera_core::payment::{CustomerDetails, LineItem};
use tessera_core::{OrderId, SeatId, UserId};

/// Returned by a successful reservation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservationReceipt {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub seat_ids: Vec<SeatId>,
    pub held_until: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Entries moved to settlement; these seats are now sold.
    Settled { seat_ids: Vec<SeatId> },
    /// A repeated notification. Nothing changed.
    AlreadyFinal,
}

/// Where an order stands, derived from its ledger entries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// At least one seat held and inside the holding window
    Reserved,
    Settled,
    /// Every hold expired, was cancelled or was superseded
    Lapsed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub state: OrderState,
    pub seats: Vec<LineItem>,
    pub gross_amount: i64,
    pub customer: CustomerDetails,
    pub held_until: Option<DateTime<Utc>>,
}
