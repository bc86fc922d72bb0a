use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use tessera_core::payment::{CustomerDetails, LineItem};
use tessera_core::repository::ReservationStore;
use tessera_core::{
    Clock, CoreError, CoreResult, EntryState, OrderId, ReservationEntry, ReservationPolicy, Seat, SeatId, SeatStatus,
    UserId,
};

use crate::models::{ConfirmOutcome, OrderState, OrderSummary, ReservationReceipt};

/// Seat lifecycle engine: reserve, confirm, cancel and expire.
///
/// Every mutation re-reads what it depends on inside its own transaction, so
/// a stale view from the read path can never commit a double booking.
pub struct ReservationCoordinator {
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
    policy: ReservationPolicy,
}

impl ReservationCoordinator {
    pub fn new(store: Arc<dyn ReservationStore>, clock: Arc<dyn Clock>, policy: ReservationPolicy) -> Self {
        Self { store, clock, policy }
    }

    pub fn policy(&self) -> &ReservationPolicy {
        &self.policy
    }

    pub fn store(&self) -> Arc<dyn ReservationStore> {
        self.store.clone()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Hold `seat_ids` for `user_id` under a fresh order id. All or nothing.
    pub async fn reserve(&self, user_id: UserId, seat_ids: &[SeatId]) -> CoreResult<ReservationReceipt> {
        validate_seat_ids(seat_ids)?;

        let deadline = self.policy.reserve_timeout;
        match tokio::time::timeout(deadline, self.reserve_in_tx(user_id, seat_ids)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Reservation for user {} on {:?} timed out after {:?}", user_id, seat_ids, deadline);
                Err(CoreError::Timeout(deadline))
            }
        }
    }

    async fn reserve_in_tx(&self, user_id: UserId, seat_ids: &[SeatId]) -> CoreResult<ReservationReceipt> {
        let window = self.policy.holding_window;
        let mut tx = self.store.begin().await?;
        let now = self.clock.now();

        tx.lock_user(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("user {}", user_id)))?;

        let seats = tx.lock_seats(seat_ids).await?;
        if let Some(missing) = seat_ids.iter().find(|id| !seats.iter().any(|s| s.seat_id == **id)) {
            return Err(CoreError::NotFound(format!("seat {}", missing)));
        }

        let current = tx.active_entries_for_seats(seat_ids).await?;
        for seat in &seats {
            let holder = current.iter().find(|e| e.seat_id == seat.seat_id);
            check_reservable(seat, holder, user_id, now, window)?;
        }

        let limit = self.policy.max_seats_per_user;
        let held = tx
            .active_entries_for_user(user_id)
            .await?
            .iter()
            .filter(|e| e.is_live(now, window) && !seat_ids.contains(&e.seat_id))
            .count();
        if held + seat_ids.len() > limit {
            return Err(CoreError::LimitExceeded {
                held,
                requested: seat_ids.len(),
                limit,
            });
        }

        // Own holds are superseded; anyone else's can only be here if expired.
        for entry in current.iter().filter(|e| e.state == EntryState::Reserved) {
            let retired = if entry.user_id == user_id {
                EntryState::Cancelled
            } else {
                EntryState::Expired
            };
            tx.set_entry_state(entry, retired, now).await?;
        }

        let order_id = Uuid::new_v4();
        for seat in &seats {
            tx.insert_entry(&ReservationEntry::reserved(order_id, user_id, seat.seat_id, now))
                .await?;
            tx.set_seat_status(seat.seat_id, SeatStatus::Reserved, now).await?;
        }

        tx.commit().await?;

        let seat_ids: Vec<SeatId> = seats.iter().map(|s| s.seat_id).collect();
        info!("Order {} reserved seats {:?} for user {}", order_id, seat_ids, user_id);

        Ok(ReservationReceipt {
            order_id,
            user_id,
            seat_ids,
            held_until: now + window,
        })
    }

    /// Payment confirmed: reserved entries of the order become settlement and
    /// their seats are sold. Repeated calls return `AlreadyFinal`.
    pub async fn confirm(&self, order_id: OrderId) -> CoreResult<ConfirmOutcome> {
        let seat_ids = self.order_seat_ids(order_id).await?;

        let mut tx = self.store.begin().await?;
        let now = self.clock.now();

        tx.lock_seats(&seat_ids).await?;
        let entries = tx.lock_order(order_id).await?;

        let pending: Vec<&ReservationEntry> = entries.iter().filter(|e| e.state == EntryState::Reserved).collect();
        if pending.is_empty() {
            if entries.iter().any(|e| e.state == EntryState::Settlement) {
                info!("Order {} already settled, ignoring repeated confirmation", order_id);
                return Ok(ConfirmOutcome::AlreadyFinal);
            }
            return Err(CoreError::Conflict(format!("order {} no longer holds any seat", order_id)));
        }

        for entry in &pending {
            tx.set_entry_state(entry, EntryState::Settlement, now).await?;
            tx.set_seat_status(entry.seat_id, SeatStatus::Sold, now).await?;
        }

        tx.commit().await?;

        let sold: Vec<SeatId> = pending.iter().map(|e| e.seat_id).collect();
        info!("Order {} settled, seats {:?} sold", order_id, sold);
        Ok(ConfirmOutcome::Settled { seat_ids: sold })
    }

    /// Payment failed: release whatever the order still holds.
    /// Returns the seats that went back to available.
    pub async fn cancel(&self, order_id: OrderId) -> CoreResult<Vec<SeatId>> {
        let seat_ids = self.order_seat_ids(order_id).await?;

        let mut tx = self.store.begin().await?;
        let now = self.clock.now();

        tx.lock_seats(&seat_ids).await?;
        let entries = tx.lock_order(order_id).await?;

        if entries.iter().any(|e| e.state == EntryState::Settlement) {
            return Err(CoreError::AlreadyFinal(format!("order {} is already settled", order_id)));
        }

        let mut released = Vec::new();
        for entry in entries.iter().filter(|e| e.state == EntryState::Reserved) {
            tx.set_entry_state(entry, EntryState::Cancelled, now).await?;
            tx.set_seat_status(entry.seat_id, SeatStatus::Available, now).await?;
            released.push(entry.seat_id);
        }

        if released.is_empty() {
            return Ok(released);
        }

        tx.commit().await?;
        info!("Order {} cancelled, seats {:?} released", order_id, released);
        Ok(released)
    }

    /// Make a lapsed hold on one seat durable. `true` when the seat was released.
    /// A settled entry is never touched.
    pub async fn expire(&self, seat_id: SeatId) -> CoreResult<bool> {
        let window = self.policy.holding_window;
        let mut tx = self.store.begin().await?;
        let now = self.clock.now();

        let seat = tx
            .lock_seats(&[seat_id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::NotFound(format!("seat {}", seat_id)))?;

        let active = tx.active_entries_for_seats(&[seat_id]).await?;
        match active.first() {
            Some(entry) if entry.is_expired(now, window) => {
                tx.set_entry_state(entry, EntryState::Expired, now).await?;
            }
            Some(_) => return Ok(false),
            // Status left behind without a ledger entry
            None if seat.hold_lapsed(now, window) => {}
            None => return Ok(false),
        }

        tx.set_seat_status(seat_id, SeatStatus::Available, now).await?;
        tx.commit().await?;

        info!("Hold on seat {} expired", seat_id);
        Ok(true)
    }

    /// Eager pass over every lapsed hold. Returns the released seats.
    pub async fn expire_stale(&self) -> CoreResult<Vec<SeatId>> {
        let cutoff = self.clock.now() - self.policy.holding_window;
        let candidates = self.store.stale_seat_ids(cutoff).await?;

        let mut released = Vec::new();
        for seat_id in candidates {
            match self.expire(seat_id).await {
                Ok(true) => released.push(seat_id),
                Ok(false) => {}
                Err(e) => warn!("Failed to expire seat {}: {}", seat_id, e),
            }
        }
        Ok(released)
    }

    /// Seats, amount and contact details of one of the user's orders.
    pub async fn order_summary(&self, user_id: UserId, order_id: OrderId) -> CoreResult<OrderSummary> {
        let entries: Vec<ReservationEntry> = self
            .store
            .entries_for_order(order_id)
            .await?
            .into_iter()
            .filter(|e| e.user_id == user_id)
            .collect();
        if entries.is_empty() {
            return Err(CoreError::NotFound(format!("order {}", order_id)));
        }

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("user {}", user_id)))?;

        let now = self.clock.now();
        let window = self.policy.holding_window;
        let (state, billed) = order_state(&entries, now, window);

        let mut seats = Vec::with_capacity(billed.len());
        for entry in &billed {
            let seat: Seat = self
                .store
                .get_seat(entry.seat_id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("seat {}", entry.seat_id)))?;
            seats.push(LineItem {
                seat_id: seat.seat_id,
                name: seat.name,
                price: seat.price,
            });
        }

        let held_until = match state {
            OrderState::Reserved => billed.iter().map(|e| e.updated_at + window).min(),
            OrderState::Settled | OrderState::Lapsed => None,
        };

        Ok(OrderSummary {
            order_id,
            state,
            gross_amount: seats.iter().map(|s| s.price).sum(),
            seats,
            customer: CustomerDetails {
                name: user.name,
                email: user.email,
                phone: user.phone,
            },
            held_until,
        })
    }

    async fn order_seat_ids(&self, order_id: OrderId) -> CoreResult<Vec<SeatId>> {
        let entries = self.store.entries_for_order(order_id).await?;
        if entries.is_empty() {
            return Err(CoreError::NotFound(format!("order {}", order_id)));
        }
        let mut ids: Vec<SeatId> = entries.iter().map(|e| e.seat_id).collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

fn validate_seat_ids(seat_ids: &[SeatId]) -> CoreResult<()> {
    if seat_ids.is_empty() {
        return Err(CoreError::ValidationError("at least one seat is required".to_string()));
    }
    let mut seen = HashSet::with_capacity(seat_ids.len());
    if let Some(dup) = seat_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(CoreError::ValidationError(format!("seat {} requested twice", dup)));
    }
    Ok(())
}

fn check_reservable(
    seat: &Seat,
    holder: Option<&ReservationEntry>,
    user_id: UserId,
    now: DateTime<Utc>,
    window: Duration,
) -> CoreResult<()> {
    if seat.status == SeatStatus::Sold {
        return Err(CoreError::Conflict(format!("seat {} is sold", seat.seat_id)));
    }
    match holder {
        Some(entry) if entry.state == EntryState::Settlement => {
            Err(CoreError::Conflict(format!("seat {} is sold", seat.seat_id)))
        }
        Some(entry) if entry.user_id != user_id && !entry.is_expired(now, window) => {
            Err(CoreError::Conflict(format!("seat {} is held by another user", seat.seat_id)))
        }
        _ => Ok(()),
    }
}

/// Settled entries win, then live holds; otherwise the order has lapsed.
fn order_state(entries: &[ReservationEntry], now: DateTime<Utc>, window: Duration) -> (OrderState, Vec<ReservationEntry>) {
    let settled: Vec<ReservationEntry> = entries
        .iter()
        .filter(|e| e.state == EntryState::Settlement)
        .cloned()
        .collect();
    if !settled.is_empty() {
        return (OrderState::Settled, settled);
    }

    let live: Vec<ReservationEntry> = entries
        .iter()
        .filter(|e| e.state == EntryState::Reserved && !e.is_expired(now, window))
        .cloned()
        .collect();
    if !live.is_empty() {
        return (OrderState::Reserved, live);
    }

    (OrderState::Lapsed, entries.to_vec())
}
