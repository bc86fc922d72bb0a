use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tessera_core::repository::ReservationStore;
use tessera_core::{Clock, CoreResult, EntryState, ReservationEntry, Seat, SeatId, SeatStatus, UserId};

/// Seat status as one particular viewer sees it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewStatus {
    Available,
    Reserved,
    Sold,
    ReservedByMe,
    PurchasedByMe,
}

impl From<SeatStatus> for ViewStatus {
    fn from(status: SeatStatus) -> Self {
        match status {
            SeatStatus::Available => ViewStatus::Available,
            SeatStatus::Reserved => ViewStatus::Reserved,
            SeatStatus::Sold => ViewStatus::Sold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatView {
    pub seat_id: SeatId,
    pub name: String,
    pub price: i64,
    pub status: ViewStatus,
}

/// Effective per-seat view for one user.
///
/// Stored status first, then the viewer's own active entries relabel their
/// seats, then lapsed holds read as available. Nothing is written back; the
/// write path re-checks expiry under its own locks.
pub fn resolve(
    seats: &[Seat],
    user_entries: &[ReservationEntry],
    now: DateTime<Utc>,
    holding_window: Duration,
) -> Vec<SeatView> {
    let mut views: Vec<SeatView> = seats
        .iter()
        .map(|seat| SeatView {
            seat_id: seat.seat_id,
            name: seat.name.clone(),
            price: seat.price,
            status: seat.status.into(),
        })
        .collect();

    let index: HashMap<SeatId, usize> = views
        .iter()
        .enumerate()
        .map(|(i, v)| (v.seat_id, i))
        .collect();

    for entry in user_entries {
        let Some(&i) = index.get(&entry.seat_id) else {
            continue;
        };
        match entry.state {
            EntryState::Reserved => views[i].status = ViewStatus::ReservedByMe,
            EntryState::Settlement => views[i].status = ViewStatus::PurchasedByMe,
            EntryState::Cancelled | EntryState::Expired => {}
        }
    }

    for (seat, view) in seats.iter().zip(views.iter_mut()) {
        if seat.hold_lapsed(now, holding_window) {
            view.status = ViewStatus::Available;
        }
    }

    views
}

/// Read path over the store of record. Takes no locks.
pub struct AvailabilityResolver {
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
    holding_window: Duration,
}

impl AvailabilityResolver {
    pub fn new(store: Arc<dyn ReservationStore>, clock: Arc<dyn Clock>, holding_window: Duration) -> Self {
        Self {
            store,
            clock,
            holding_window,
        }
    }

    pub async fn seats_for(&self, user_id: UserId) -> CoreResult<Vec<SeatView>> {
        let seats = self.store.list_seats().await?;
        let entries = self.store.active_entries_for_user(user_id).await?;
        tracing::debug!("Resolving {} seats for user {} ({} active entries)", seats.len(), user_id, entries.len());
        Ok(resolve(&seats, &entries, self.clock.now(), self.holding_window))
    }
}
