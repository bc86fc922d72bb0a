use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{EntryState, OrderId, ReservationEntry, Seat, SeatId, SeatStatus, User, UserId};
use crate::CoreResult;

/// Store of record for seats, users and the reservation ledger.
///
/// Plain methods are lock-free reads. Anything that mutates goes through
/// [`ReservationStore::begin`], which hands out a unit of work that either
/// commits as a whole or, when dropped, leaves storage untouched.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn begin(&self) -> CoreResult<Box<dyn ReservationTx>>;

    async fn list_seats(&self) -> CoreResult<Vec<Seat>>;

    async fn get_seat(&self, seat_id: SeatId) -> CoreResult<Option<Seat>>;

    async fn get_user(&self, user_id: UserId) -> CoreResult<Option<User>>;

    /// Entries of the user in an active state (reserved or settlement).
    async fn active_entries_for_user(&self, user_id: UserId) -> CoreResult<Vec<ReservationEntry>>;

    /// Every entry of the order, retired ones included.
    async fn entries_for_order(&self, order_id: OrderId) -> CoreResult<Vec<ReservationEntry>>;

    /// Seats stored as `reserved` whose `updated_at` is before `cutoff`.
    async fn stale_seat_ids(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<SeatId>>;
}

/// A single write transaction.
///
/// Lock order is user, then seats (ascending id), then entries. Every
/// implementation must keep it so concurrent transactions cannot deadlock.
#[async_trait]
pub trait ReservationTx: Send {
    /// Locks the user row. `None` when the user does not exist.
    async fn lock_user(&mut self, user_id: UserId) -> CoreResult<Option<User>>;

    /// Locks the seat rows, returned in ascending `seat_id` order. Unknown ids are skipped.
    async fn lock_seats(&mut self, seat_ids: &[SeatId]) -> CoreResult<Vec<Seat>>;

    async fn active_entries_for_seats(&mut self, seat_ids: &[SeatId]) -> CoreResult<Vec<ReservationEntry>>;

    async fn active_entries_for_user(&mut self, user_id: UserId) -> CoreResult<Vec<ReservationEntry>>;

    /// Locks and returns every entry of the order.
    async fn lock_order(&mut self, order_id: OrderId) -> CoreResult<Vec<ReservationEntry>>;

    async fn insert_entry(&mut self, entry: &ReservationEntry) -> CoreResult<()>;

    async fn set_entry_state(&mut self, entry: &ReservationEntry, state: EntryState, now: DateTime<Utc>) -> CoreResult<()>;

    async fn set_seat_status(&mut self, seat_id: SeatId, status: SeatStatus, now: DateTime<Utc>) -> CoreResult<()>;

    async fn commit(self: Box<Self>) -> CoreResult<()>;
}
