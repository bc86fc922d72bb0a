use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tessera_shared::Masked;
use uuid::Uuid;

use crate::CoreError;

pub type SeatId = i64;
pub type UserId = i64;
pub type OrderId = Uuid;

/// Stored status of a seat
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    Available,
    Reserved,
    Sold,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "available",
            SeatStatus::Reserved => "reserved",
            SeatStatus::Sold => "sold",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(SeatStatus::Available),
            "reserved" => Ok(SeatStatus::Reserved),
            "sold" => Ok(SeatStatus::Sold),
            other => Err(CoreError::StorageError(format!("unknown seat status: {}", other))),
        }
    }
}

/// Lifecycle state of a reservation entry.
/// `Cancelled` and `Expired` are the retired states; `Settlement` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Reserved,
    Settlement,
    Cancelled,
    Expired,
}

impl EntryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryState::Reserved => "reserved",
            EntryState::Settlement => "settlement",
            EntryState::Cancelled => "cancelled",
            EntryState::Expired => "expired",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, EntryState::Reserved | EntryState::Settlement)
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved" => Ok(EntryState::Reserved),
            "settlement" => Ok(EntryState::Settlement),
            "cancelled" => Ok(EntryState::Cancelled),
            "expired" => Ok(EntryState::Expired),
            other => Err(CoreError::StorageError(format!("unknown entry state: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seat {
    pub seat_id: SeatId,
    pub name: String,
    pub price: i64,
    pub link: String,
    pub status: SeatStatus,
    pub updated_at: DateTime<Utc>,
}

impl Seat {
    pub fn new(seat_id: SeatId, name: impl Into<String>, price: i64, link: impl Into<String>) -> Self {
        Self {
            seat_id,
            name: name.into(),
            price,
            link: link.into(),
            status: SeatStatus::Available,
            updated_at: Utc::now(),
        }
    }

    /// A stored `reserved` status whose clock ran past the holding window.
    pub fn hold_lapsed(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.status == SeatStatus::Reserved && now > self.updated_at + window
    }
}

/// One reservation attempt for one seat. Entries reserved together share an `order_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservationEntry {
    pub entry_id: Uuid,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub seat_id: SeatId,
    pub state: EntryState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReservationEntry {
    pub fn reserved(order_id: OrderId, user_id: UserId, seat_id: SeatId, now: DateTime<Utc>) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            order_id,
            user_id,
            seat_id,
            state: EntryState::Reserved,
            created_at: now,
            updated_at: now,
        }
    }

    /// Still `reserved`, but older than the holding window.
    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.state == EntryState::Reserved && now > self.updated_at + window
    }

    /// Counts against the holder: settled, or reserved within the window.
    pub fn is_live(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.state {
            EntryState::Settlement => true,
            EntryState::Reserved => !self.is_expired(now, window),
            EntryState::Cancelled | EntryState::Expired => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
}

/// Knobs the coordinator enforces on every reservation.
#[derive(Debug, Clone, Copy)]
pub struct ReservationPolicy {
    pub holding_window: Duration,
    pub max_seats_per_user: usize,
    pub reserve_timeout: std::time::Duration,
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self {
            holding_window: Duration::minutes(15),
            max_seats_per_user: 5,
            reserve_timeout: std::time::Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings_round_trip() {
        for status in [SeatStatus::Available, SeatStatus::Reserved, SeatStatus::Sold] {
            assert_eq!(status.as_str().parse::<SeatStatus>().unwrap(), status);
        }
        assert!("held".parse::<EntryState>().is_err());
    }

    #[test]
    fn test_entry_expiry_uses_holding_window() {
        let now = Utc::now();
        let window = Duration::minutes(15);
        let mut entry = ReservationEntry::reserved(Uuid::new_v4(), 1, 10, now - Duration::minutes(20));

        assert!(entry.is_expired(now, window));
        assert!(!entry.is_live(now, window));

        entry.state = EntryState::Settlement;
        assert!(!entry.is_expired(now, window));
        assert!(entry.is_live(now, window));
    }

    #[test]
    fn test_hold_lapsed_only_for_reserved_seats() {
        let now = Utc::now();
        let window = Duration::minutes(15);
        let mut seat = Seat::new(1, "A1", 150_000, "https://tickets.example/a1");
        seat.updated_at = now - Duration::hours(1);

        assert!(!seat.hold_lapsed(now, window));
        seat.status = SeatStatus::Reserved;
        assert!(seat.hold_lapsed(now, window));
        seat.status = SeatStatus::Sold;
        assert!(!seat.hold_lapsed(now, window));
    }
}
