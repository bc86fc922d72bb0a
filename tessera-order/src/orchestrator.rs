use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use tessera_core::payment::{PaymentGateway, PaymentNotification, PaymentReference, PaymentRequest, PaymentResult};
use tessera_core::{CoreError, CoreResult, OrderId, SeatId, UserId};

use crate::coordinator::ReservationCoordinator;
use crate::models::{ConfirmOutcome, OrderState, OrderSummary};

/// What a gateway notification did to the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Confirmed(ConfirmOutcome),
    Released(Vec<SeatId>),
    /// Pending or unrecognised status, or a failure for an order already settled
    Ignored,
}

pub struct PaymentOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    coordinator: Arc<ReservationCoordinator>,
}

impl PaymentOrchestrator {
    pub fn new(gateway: Arc<dyn PaymentGateway>, coordinator: Arc<ReservationCoordinator>) -> Self {
        Self { gateway, coordinator }
    }

    /// Open a gateway transaction for an order the user still holds.
    ///
    /// Runs outside any ledger transaction; a slow gateway never holds a seat lock.
    pub async fn initiate_payment(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> CoreResult<(OrderSummary, PaymentReference)> {
        let summary = self.coordinator.order_summary(user_id, order_id).await?;
        match summary.state {
            OrderState::Reserved => {}
            OrderState::Settled => {
                return Err(CoreError::AlreadyFinal(format!("order {} is already paid", order_id)));
            }
            OrderState::Lapsed => {
                return Err(CoreError::Conflict(format!("order {} no longer holds any seat", order_id)));
            }
        }

        let request = PaymentRequest::new(order_id, summary.seats.clone(), summary.customer.clone());
        let reference = self.gateway.create_transaction(&request).await?;

        info!("Payment opened for order {} ({} seats, gross {})", order_id, summary.seats.len(), summary.gross_amount);
        Ok((summary, reference))
    }

    /// Apply an asynchronous gateway notification. Safe to receive more than once.
    pub async fn handle_notification(&self, notification: &PaymentNotification) -> CoreResult<NotificationOutcome> {
        if !self.gateway.verify_notification(notification) {
            warn!("Rejected notification for order {}: bad signature", notification.order_id);
            return Err(CoreError::ValidationError("notification signature mismatch".to_string()));
        }

        let order_id = notification.order_id;
        match notification.result() {
            PaymentResult::Settled => {
                let outcome = self.coordinator.confirm(order_id).await?;
                Ok(NotificationOutcome::Confirmed(outcome))
            }
            PaymentResult::Failed => match self.coordinator.cancel(order_id).await {
                Ok(released) if released.is_empty() => {
                    info!("Failure notification for order {} with nothing left to release", order_id);
                    Ok(NotificationOutcome::Ignored)
                }
                Ok(released) => Ok(NotificationOutcome::Released(released)),
                Err(CoreError::AlreadyFinal(msg)) => {
                    warn!("Failure notification after settlement: {}", msg);
                    Ok(NotificationOutcome::Ignored)
                }
                Err(e) => Err(e),
            },
            PaymentResult::Pending => Ok(NotificationOutcome::Ignored),
            PaymentResult::Unknown(status) => {
                warn!("Unhandled transaction status '{}' for order {}", status, order_id);
                Ok(NotificationOutcome::Ignored)
            }
        }
    }
}

/// Gateway stand-in for development and tests. Flip `set_failing` to
/// simulate an outage.
#[derive(Default)]
pub struct MockPaymentGateway {
    failing: AtomicBool,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_transaction(&self, request: &PaymentRequest) -> CoreResult<PaymentReference> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::GatewayError("simulated gateway outage".to_string()));
        }
        let token = format!("mock_{}", request.order_id.simple());
        Ok(PaymentReference {
            redirect_url: format!("https://pay.invalid/checkout/{}", token),
            token,
        })
    }
}
