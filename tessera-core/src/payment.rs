use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tessera_shared::Masked;

use crate::models::{OrderId, SeatId};
use crate::CoreResult;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub seat_id: SeatId,
    pub name: String,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
}

/// Everything the gateway needs to open a payable transaction for one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order_id: OrderId,
    pub gross_amount: i64,
    pub items: Vec<LineItem>,
    pub customer: CustomerDetails,
}

impl PaymentRequest {
    pub fn new(order_id: OrderId, items: Vec<LineItem>, customer: CustomerDetails) -> Self {
        let gross_amount = items.iter().map(|i| i.price).sum();
        Self {
            order_id,
            gross_amount,
            items,
            customer,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentReference {
    pub token: String,
    pub redirect_url: String,
}

/// Asynchronous notification posted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub order_id: OrderId,
    pub transaction_status: String,
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub gross_amount: Option<String>,
    #[serde(default)]
    pub signature_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentResult {
    Settled,
    Failed,
    Pending,
    Unknown(String),
}

impl PaymentNotification {
    pub fn result(&self) -> PaymentResult {
        match self.transaction_status.as_str() {
            "settlement" | "capture" => PaymentResult::Settled,
            "deny" | "cancel" | "expire" | "failure" => PaymentResult::Failed,
            "pending" => PaymentResult::Pending,
            other => PaymentResult::Unknown(other.to_string()),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a payable transaction. Errors come back as `CoreError::GatewayError`
    /// and are never retried here.
    async fn create_transaction(&self, request: &PaymentRequest) -> CoreResult<PaymentReference>;

    /// Check that a notification really came from the gateway.
    fn verify_notification(&self, _notification: &PaymentNotification) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_gross_amount_sums_items() {
        let request = PaymentRequest::new(
            Uuid::new_v4(),
            vec![
                LineItem { seat_id: 1, name: "A1".into(), price: 150_000 },
                LineItem { seat_id: 2, name: "A2".into(), price: 100_000 },
            ],
            CustomerDetails {
                name: "Rina".into(),
                email: Masked("rina@example.com".into()),
                phone: Masked("0812".into()),
            },
        );
        assert_eq!(request.gross_amount, 250_000);
    }

    #[test]
    fn test_notification_result_mapping() {
        let mut n: PaymentNotification = serde_json::from_value(serde_json::json!({
            "order_id": Uuid::new_v4(),
            "transaction_status": "capture"
        }))
        .unwrap();
        assert_eq!(n.result(), PaymentResult::Settled);

        n.transaction_status = "expire".into();
        assert_eq!(n.result(), PaymentResult::Failed);

        n.transaction_status = "refund".into();
        assert_eq!(n.result(), PaymentResult::Unknown("refund".into()));
    }
}
