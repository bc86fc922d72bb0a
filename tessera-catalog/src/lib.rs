pub mod availability;

pub use availability::{resolve, AvailabilityResolver, SeatView, ViewStatus};
