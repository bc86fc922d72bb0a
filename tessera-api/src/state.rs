use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

use tessera_catalog::AvailabilityResolver;
use tessera_order::{PaymentOrchestrator, ReservationCoordinator};
use tessera_shared::models::events::{OrderSettledEvent, SeatStatusChangedEvent};
use tessera_store::{EventProducer, RedisClient};

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ReservationCoordinator>,
    pub resolver: Arc<AvailabilityResolver>,
    pub payments: Arc<PaymentOrchestrator>,
    pub redis: Option<Arc<RedisClient>>,
    pub kafka: Option<Arc<EventProducer>>,
    pub sse_tx: broadcast::Sender<SeatStatusChangedEvent>,
    pub auth: AuthConfig,
    pub metrics: Arc<Metrics>,
    /// Requests per minute per client IP, only enforced with Redis configured
    pub rate_limit: i64,
}

impl AppState {
    /// Fan committed seat transitions out to SSE subscribers and Kafka.
    /// Never fails the caller.
    pub fn announce(&self, events: Vec<SeatStatusChangedEvent>) {
        for event in &events {
            // No subscribers is not an error
            let _ = self.sse_tx.send(event.clone());
        }

        if let Some(kafka) = self.kafka.clone() {
            tokio::spawn(async move {
                for event in &events {
                    if let Err(e) = kafka.publish_seat_status(event).await {
                        warn!("Seat event for {} not published: {}", event.seat_id, e);
                    }
                }
            });
        }
    }

    pub fn announce_settlement(&self, event: OrderSettledEvent) {
        if let Some(kafka) = self.kafka.clone() {
            tokio::spawn(async move {
                if let Err(e) = kafka.publish_order_settled(&event).await {
                    warn!("Settlement event for order {} not published: {}", event.order_id, e);
                }
            });
        }
    }
}
