pub mod models;
pub mod repository;
pub mod payment;
pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};
pub use models::{EntryState, OrderId, ReservationEntry, ReservationPolicy, Seat, SeatId, SeatStatus, User, UserId};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Seat limit exceeded: holding {held}, requested {requested}, limit {limit}")]
    LimitExceeded {
        held: usize,
        requested: usize,
        limit: usize,
    },
    #[error("Payment gateway error: {0}")]
    GatewayError(String),
    #[error("Order already final: {0}")]
    AlreadyFinal(String),
    #[error("Reservation did not complete within {0:?}")]
    Timeout(std::time::Duration),
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl CoreError {
    /// Errors the caller can fix by changing the request.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            CoreError::ValidationError(_) | CoreError::Conflict(_) | CoreError::LimitExceeded { .. }
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
