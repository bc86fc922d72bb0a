use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tessera_shared::models::events::{OrderSettledEvent, SeatStatusChangedEvent};
use tracing::{info, error};

pub const SEAT_STATUS_TOPIC: &str = "seats.status";
pub const ORDER_SETTLED_TOPIC: &str = "orders.settled";

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!("Sent message to {}/{}: partition {} offset {}", topic, key, delivery.partition, delivery.offset);
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }

    pub async fn publish_seat_status(&self, event: &SeatStatusChangedEvent) -> Result<(), rdkafka::error::KafkaError> {
        let payload = serde_json::to_string(event).unwrap_or_default();
        self.publish(SEAT_STATUS_TOPIC, &event.seat_id.to_string(), &payload).await
    }

    pub async fn publish_order_settled(&self, event: &OrderSettledEvent) -> Result<(), rdkafka::error::KafkaError> {
        let payload = serde_json::to_string(event).unwrap_or_default();
        self.publish(ORDER_SETTLED_TOPIC, &event.order_id.to_string(), &payload).await
    }
}
