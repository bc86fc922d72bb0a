use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use tokio::sync::{Mutex, OwnedMutexGuard};

use tessera_core::repository::{ReservationStore, ReservationTx};
use tessera_core::{
    CoreError, CoreResult, EntryState, OrderId, ReservationEntry, Seat, SeatId, SeatStatus, User, UserId,
};
use tessera_shared::Masked;

#[derive(Debug, Default, Clone)]
struct MemoryState {
    seats: BTreeMap<SeatId, Seat>,
    users: HashMap<UserId, User>,
    entries: Vec<ReservationEntry>,
}

/// In-process store of record.
///
/// Writers are serialized by a single async lock held for the whole
/// transaction and work on a private copy that replaces the committed state
/// on commit. Readers only touch the committed state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    committed: Arc<RwLock<MemoryState>>,
    writer: Arc<Mutex<()>>,
}

fn poisoned() -> CoreError {
    CoreError::StorageError("memory store lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `seats` seats named A1.. and `users` users with ids 1..
    pub fn seeded(seats: u32, users: u32) -> Self {
        let mut state = MemoryState::default();
        for id in 1..=seats as i64 {
            state.seats.insert(
                id,
                Seat::new(id, format!("A{}", id), 100_000, format!("/seats/{}", id)),
            );
        }
        for id in 1..=users as i64 {
            state.users.insert(
                id,
                User {
                    user_id: id,
                    name: format!("Guest {}", id),
                    email: Masked(format!("guest{}@example.com", id)),
                    phone: Masked(String::new()),
                },
            );
        }
        Self {
            committed: Arc::new(RwLock::new(state)),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Waits for any open transaction, so its commit cannot overwrite the row.
    pub async fn insert_seat(&self, seat: Seat) -> CoreResult<()> {
        let _writer = self.writer.lock().await;
        let mut state = self.committed.write().map_err(|_| poisoned())?;
        state.seats.insert(seat.seat_id, seat);
        Ok(())
    }

    pub async fn insert_user(&self, user: User) -> CoreResult<()> {
        let _writer = self.writer.lock().await;
        let mut state = self.committed.write().map_err(|_| poisoned())?;
        state.users.insert(user.user_id, user);
        Ok(())
    }

    /// Every ledger row, retired ones included.
    pub fn ledger(&self) -> Vec<ReservationEntry> {
        self.committed
            .read()
            .map(|s| s.entries.clone())
            .unwrap_or_default()
    }

    fn read(&self) -> CoreResult<RwLockReadGuard<'_, MemoryState>> {
        self.committed.read().map_err(|_| poisoned())
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn begin(&self) -> CoreResult<Box<dyn ReservationTx>> {
        let guard = self.writer.clone().lock_owned().await;
        let working = self.read()?.clone();
        Ok(Box::new(MemoryTx {
            _guard: guard,
            working,
            committed: self.committed.clone(),
        }))
    }

    async fn list_seats(&self) -> CoreResult<Vec<Seat>> {
        Ok(self.read()?.seats.values().cloned().collect())
    }

    async fn get_seat(&self, seat_id: SeatId) -> CoreResult<Option<Seat>> {
        Ok(self.read()?.seats.get(&seat_id).cloned())
    }

    async fn get_user(&self, user_id: UserId) -> CoreResult<Option<User>> {
        Ok(self.read()?.users.get(&user_id).cloned())
    }

    async fn active_entries_for_user(&self, user_id: UserId) -> CoreResult<Vec<ReservationEntry>> {
        Ok(self
            .read()?
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && e.state.is_active())
            .cloned()
            .collect())
    }

    async fn entries_for_order(&self, order_id: OrderId) -> CoreResult<Vec<ReservationEntry>> {
        Ok(self
            .read()?
            .entries
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn stale_seat_ids(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<SeatId>> {
        Ok(self
            .read()?
            .seats
            .values()
            .filter(|s| s.status == SeatStatus::Reserved && s.updated_at < cutoff)
            .map(|s| s.seat_id)
            .collect())
    }
}

struct MemoryTx {
    _guard: OwnedMutexGuard<()>,
    working: MemoryState,
    committed: Arc<RwLock<MemoryState>>,
}

#[async_trait]
impl ReservationTx for MemoryTx {
    async fn lock_user(&mut self, user_id: UserId) -> CoreResult<Option<User>> {
        Ok(self.working.users.get(&user_id).cloned())
    }

    async fn lock_seats(&mut self, seat_ids: &[SeatId]) -> CoreResult<Vec<Seat>> {
        let mut ids = seat_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids
            .iter()
            .filter_map(|id| self.working.seats.get(id).cloned())
            .collect())
    }

    async fn active_entries_for_seats(&mut self, seat_ids: &[SeatId]) -> CoreResult<Vec<ReservationEntry>> {
        Ok(self
            .working
            .entries
            .iter()
            .filter(|e| e.state.is_active() && seat_ids.contains(&e.seat_id))
            .cloned()
            .collect())
    }

    async fn active_entries_for_user(&mut self, user_id: UserId) -> CoreResult<Vec<ReservationEntry>> {
        Ok(self
            .working
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && e.state.is_active())
            .cloned()
            .collect())
    }

    async fn lock_order(&mut self, order_id: OrderId) -> CoreResult<Vec<ReservationEntry>> {
        Ok(self
            .working
            .entries
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn insert_entry(&mut self, entry: &ReservationEntry) -> CoreResult<()> {
        // Mirrors the partial unique index on the Postgres ledger.
        if entry.state.is_active()
            && self
                .working
                .entries
                .iter()
                .any(|e| e.seat_id == entry.seat_id && e.state.is_active())
        {
            return Err(CoreError::StorageError(format!(
                "seat {} already has an active entry",
                entry.seat_id
            )));
        }
        self.working.entries.push(entry.clone());
        Ok(())
    }

    async fn set_entry_state(&mut self, entry: &ReservationEntry, state: EntryState, now: DateTime<Utc>) -> CoreResult<()> {
        let row = self
            .working
            .entries
            .iter_mut()
            .find(|e| e.entry_id == entry.entry_id)
            .ok_or_else(|| CoreError::NotFound(format!("entry {}", entry.entry_id)))?;
        row.state = state;
        row.updated_at = now;
        Ok(())
    }

    async fn set_seat_status(&mut self, seat_id: SeatId, status: SeatStatus, now: DateTime<Utc>) -> CoreResult<()> {
        let seat = self
            .working
            .seats
            .get_mut(&seat_id)
            .ok_or_else(|| CoreError::NotFound(format!("seat {}", seat_id)))?;
        seat.status = status;
        seat.updated_at = now;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        let MemoryTx { _guard, working, committed } = *self;
        let mut state = committed.write().map_err(|_| poisoned())?;
        *state = working;
        Ok(())
    }
}
