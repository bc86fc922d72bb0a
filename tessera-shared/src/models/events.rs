use uuid::Uuid;

/// Broadcast after a committed seat transition (reserve, confirm, cancel, expire).
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct SeatStatusChangedEvent {
    pub seat_id: i64,
    pub status: String, // stored status: available, reserved, sold
    pub order_id: Option<Uuid>,
    pub changed_at: i64,
}

impl SeatStatusChangedEvent {
    pub fn new(seat_id: i64, status: impl Into<String>, order_id: Option<Uuid>) -> Self {
        Self {
            seat_id,
            status: status.into(),
            order_id,
            changed_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Emitted once per order when payment settles.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderSettledEvent {
    pub order_id: Uuid,
    pub seat_ids: Vec<i64>,
    pub timestamp: i64,
}

impl OrderSettledEvent {
    pub fn new(order_id: Uuid, seat_ids: Vec<i64>) -> Self {
        Self {
            order_id,
            seat_ids,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}
