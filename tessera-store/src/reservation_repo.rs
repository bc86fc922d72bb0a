use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use tessera_core::repository::{ReservationStore, ReservationTx};
use tessera_core::{CoreError, CoreResult, EntryState, OrderId, ReservationEntry, Seat, SeatId, SeatStatus, User, UserId};
use tessera_shared::Masked;

use crate::db_err;

/// Postgres-backed seat store and reservation ledger.
pub struct PgReservationStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PgReservationStore {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self { pool, lock_timeout_ms }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct SeatRow {
    seat_id: i64,
    name: String,
    price: i64,
    link: String,
    status: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SeatRow> for Seat {
    type Error = CoreError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        Ok(Seat {
            seat_id: row.seat_id,
            name: row.name,
            price: row.price,
            link: row.link,
            status: row.status.parse()?,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    entry_id: Uuid,
    order_id: Uuid,
    user_id: i64,
    seat_id: i64,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for ReservationEntry {
    type Error = CoreError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(ReservationEntry {
            entry_id: row.entry_id,
            order_id: row.order_id,
            user_id: row.user_id,
            seat_id: row.seat_id,
            state: row.state.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: i64,
    name: String,
    email: String,
    phone: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            user_id: row.user_id,
            name: row.name,
            email: Masked(row.email),
            phone: Masked(row.phone),
        }
    }
}

fn seats_from(rows: Vec<SeatRow>) -> CoreResult<Vec<Seat>> {
    rows.into_iter().map(Seat::try_from).collect()
}

fn entries_from(rows: Vec<EntryRow>) -> CoreResult<Vec<ReservationEntry>> {
    rows.into_iter().map(ReservationEntry::try_from).collect()
}

const SEAT_COLUMNS: &str = "seat_id, name, price, link, status, updated_at";
const ENTRY_COLUMNS: &str = "entry_id, order_id, user_id, seat_id, state, created_at, updated_at";
const ACTIVE_STATES: &str = "state IN ('reserved', 'settlement')";

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn begin(&self) -> CoreResult<Box<dyn ReservationTx>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // A blocked row lock turns into an error instead of an unbounded wait.
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        Ok(Box::new(PgReservationTx { tx }))
    }

    async fn list_seats(&self) -> CoreResult<Vec<Seat>> {
        let rows: Vec<SeatRow> = sqlx::query_as(&format!(
            "SELECT {} FROM seats WHERE deleted_at IS NULL ORDER BY seat_id",
            SEAT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        seats_from(rows)
    }

    async fn get_seat(&self, seat_id: SeatId) -> CoreResult<Option<Seat>> {
        let row: Option<SeatRow> = sqlx::query_as(&format!(
            "SELECT {} FROM seats WHERE seat_id = $1 AND deleted_at IS NULL",
            SEAT_COLUMNS
        ))
        .bind(seat_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Seat::try_from).transpose()
    }

    async fn get_user(&self, user_id: UserId) -> CoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT user_id, name, email, phone FROM users WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(User::from))
    }

    async fn active_entries_for_user(&self, user_id: UserId) -> CoreResult<Vec<ReservationEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reservations WHERE user_id = $1 AND {} ORDER BY created_at",
            ENTRY_COLUMNS, ACTIVE_STATES
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        entries_from(rows)
    }

    async fn entries_for_order(&self, order_id: OrderId) -> CoreResult<Vec<ReservationEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reservations WHERE order_id = $1 ORDER BY seat_id",
            ENTRY_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        entries_from(rows)
    }

    async fn stale_seat_ids(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<SeatId>> {
        let ids: Vec<(i64,)> = sqlx::query_as(
            "SELECT seat_id FROM seats WHERE status = 'reserved' AND updated_at < $1 AND deleted_at IS NULL",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}

struct PgReservationTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ReservationTx for PgReservationTx {
    async fn lock_user(&mut self, user_id: UserId) -> CoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT user_id, name, email, phone FROM users WHERE user_id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.map(User::from))
    }

    async fn lock_seats(&mut self, seat_ids: &[SeatId]) -> CoreResult<Vec<Seat>> {
        let rows: Vec<SeatRow> = sqlx::query_as(&format!(
            "SELECT {} FROM seats WHERE seat_id = ANY($1) AND deleted_at IS NULL ORDER BY seat_id FOR UPDATE",
            SEAT_COLUMNS
        ))
        .bind(seat_ids.to_vec())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        seats_from(rows)
    }

    async fn active_entries_for_seats(&mut self, seat_ids: &[SeatId]) -> CoreResult<Vec<ReservationEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reservations WHERE seat_id = ANY($1) AND {} ORDER BY seat_id FOR UPDATE",
            ENTRY_COLUMNS, ACTIVE_STATES
        ))
        .bind(seat_ids.to_vec())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        entries_from(rows)
    }

    async fn active_entries_for_user(&mut self, user_id: UserId) -> CoreResult<Vec<ReservationEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reservations WHERE user_id = $1 AND {}",
            ENTRY_COLUMNS, ACTIVE_STATES
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        entries_from(rows)
    }

    async fn lock_order(&mut self, order_id: OrderId) -> CoreResult<Vec<ReservationEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reservations WHERE order_id = $1 ORDER BY seat_id FOR UPDATE",
            ENTRY_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        entries_from(rows)
    }

    async fn insert_entry(&mut self, entry: &ReservationEntry) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reservations (entry_id, order_id, user_id, seat_id, state, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.entry_id)
        .bind(entry.order_id)
        .bind(entry.user_id)
        .bind(entry.seat_id)
        .bind(entry.state.as_str())
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn set_entry_state(&mut self, entry: &ReservationEntry, state: EntryState, now: DateTime<Utc>) -> CoreResult<()> {
        let result = sqlx::query("UPDATE reservations SET state = $1, updated_at = $2 WHERE entry_id = $3")
            .bind(state.as_str())
            .bind(now)
            .bind(entry.entry_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("entry {}", entry.entry_id)));
        }
        Ok(())
    }

    async fn set_seat_status(&mut self, seat_id: SeatId, status: SeatStatus, now: DateTime<Utc>) -> CoreResult<()> {
        let result = sqlx::query("UPDATE seats SET status = $1, updated_at = $2 WHERE seat_id = $3")
            .bind(status.as_str())
            .bind(now)
            .bind(seat_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("seat {}", seat_id)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        let PgReservationTx { tx } = *self;
        tx.commit().await.map_err(db_err)
    }
}
