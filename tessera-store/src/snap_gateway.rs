use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha512};
use std::time::Duration;
use tracing::{error, info};

use tessera_core::payment::{PaymentGateway, PaymentNotification, PaymentReference, PaymentRequest};
use tessera_core::{CoreError, CoreResult};

/// HTTP client for a Snap-style hosted checkout.
///
/// `POST {base_url}/snap/v1/transactions` with basic auth on the server key
/// returns a token plus a redirect URL the buyer pays at.
pub struct SnapGateway {
    client: reqwest::Client,
    base_url: String,
    server_key: String,
    finish_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnapResponse {
    token: String,
    redirect_url: String,
}

impl SnapGateway {
    pub fn new(base_url: &str, server_key: &str, finish_url: Option<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            server_key: server_key.to_string(),
            finish_url,
        })
    }

    fn body(&self, request: &PaymentRequest) -> Value {
        let items: Vec<Value> = request
            .items
            .iter()
            .map(|item| {
                json!({
                    "id": item.seat_id.to_string(),
                    "price": item.price,
                    "quantity": 1,
                    "name": item.name,
                })
            })
            .collect();

        let mut body = json!({
            "transaction_details": {
                "order_id": request.order_id.to_string(),
                "gross_amount": request.gross_amount,
            },
            "item_details": items,
            "customer_details": {
                "first_name": request.customer.name,
                "last_name": "",
                "email": request.customer.email,
                "phone": request.customer.phone,
            },
        });

        if let Some(finish) = &self.finish_url {
            body["callbacks"] = json!({ "finish": finish });
        }
        body
    }
}

/// `sha512(order_id + status_code + gross_amount + server_key)`, hex encoded.
pub fn notification_signature(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let digest = Sha512::digest(format!("{}{}{}{}", order_id, status_code, gross_amount, server_key).as_bytes());
    format!("{:x}", digest)
}

#[async_trait]
impl PaymentGateway for SnapGateway {
    async fn create_transaction(&self, request: &PaymentRequest) -> CoreResult<PaymentReference> {
        let url = format!("{}/snap/v1/transactions", self.base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.server_key, Some(""))
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| CoreError::GatewayError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Gateway rejected order {}: {} {}", request.order_id, status, text);
            return Err(CoreError::GatewayError(text));
        }

        let snap: SnapResponse = response
            .json()
            .await
            .map_err(|e| CoreError::GatewayError(e.to_string()))?;

        info!("Gateway transaction opened for order {}", request.order_id);
        Ok(PaymentReference {
            token: snap.token,
            redirect_url: snap.redirect_url,
        })
    }

    fn verify_notification(&self, notification: &PaymentNotification) -> bool {
        if self.server_key.is_empty() {
            return true;
        }
        let (Some(code), Some(amount), Some(signature)) = (
            notification.status_code.as_deref(),
            notification.gross_amount.as_deref(),
            notification.signature_key.as_deref(),
        ) else {
            return false;
        };
        let expected = notification_signature(&notification.order_id.to_string(), code, amount, &self.server_key);
        expected.eq_ignore_ascii_case(signature)
    }
}
