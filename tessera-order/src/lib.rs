pub mod models;
pub mod coordinator;
pub mod orchestrator;

pub use models::{ConfirmOutcome, OrderState, OrderSummary, ReservationReceipt};
pub use coordinator::ReservationCoordinator;
pub use orchestrator::{MockPaymentGateway, NotificationOutcome, PaymentOrchestrator};
