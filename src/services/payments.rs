use crate::db::DbPool;
use crate::entities::webhook_log;
use crate::errors::ServiceError;
use crate::message_queue::PrintQueue;
use crate::services::chat::{self, ChatProvider};
use crate::services::orders::{OrderService, PaymentConfirmation};
use crate::services::sessions::SessionService;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set, SqlErr};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const PAID_EVENT: &str = "payment_link.paid";
const PROVIDER: &str = "razorpay";

/// Result of processing one webhook delivery. Every variant maps to a
/// 200 response; only signature failures are rejected.
#[derive(Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Payment applied: order paid, print job created and enqueued.
    Processed {
        order_id: Uuid,
        print_job_id: Uuid,
    },
    /// This event id was seen before; no effects were applied.
    AlreadyProcessed,
    /// An event type this service does not handle.
    Ignored,
    /// A paid event for a payment link no order references.
    OrderNotFound,
}

/// Processes payment provider webhooks with at-most-once effects.
///
/// The idempotency ledger insert happens before any side effect, so a
/// duplicate delivery (including a concurrent one) is cut off at the
/// unique event_id index.
pub struct PaymentWebhookService {
    db_pool: Arc<DbPool>,
    orders: Arc<OrderService>,
    sessions: Arc<SessionService>,
    chat: Arc<dyn ChatProvider>,
    queue: Arc<dyn PrintQueue>,
    webhook_secret: String,
}

impl PaymentWebhookService {
    pub fn new(
        db_pool: Arc<DbPool>,
        orders: Arc<OrderService>,
        sessions: Arc<SessionService>,
        chat: Arc<dyn ChatProvider>,
        queue: Arc<dyn PrintQueue>,
        webhook_secret: String,
    ) -> Self {
        Self {
            db_pool,
            orders,
            sessions,
            chat,
            queue,
            webhook_secret,
        }
    }

    /// Verifies the signature and applies the event. Returns
    /// `Unauthorized` for a missing or invalid signature.
    #[instrument(skip(self, raw_body, signature))]
    pub async fn process_event(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, ServiceError> {
        let signature = signature
            .ok_or_else(|| ServiceError::Unauthorized("missing webhook signature".into()))?;
        if !self.verify_signature(raw_body, signature) {
            warn!("Webhook signature verification failed");
            return Err(ServiceError::Unauthorized(
                "invalid webhook signature".into(),
            ));
        }

        let payload: serde_json::Value = serde_json::from_slice(raw_body)
            .map_err(|e| ServiceError::BadRequest(format!("invalid webhook body: {}", e)))?;

        let payload_hash = hex::encode(Sha256::digest(raw_body));
        let event_id = payload
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| payload_hash.clone());
        let event_type = payload
            .get("event")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        if !self.record_event(&event_id, &event_type, &payload_hash).await? {
            info!(event_id = %event_id, "Duplicate webhook delivery ignored");
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        if event_type != PAID_EVENT {
            info!(event_type = %event_type, "Unhandled webhook event type");
            return Ok(WebhookOutcome::Ignored);
        }

        self.apply_paid_event(&payload).await
    }

    fn verify_signature(&self, raw_body: &[u8], signature: &str) -> bool {
        let mut mac = match HmacSha256::new_from_slice(self.webhook_secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(raw_body);
        let expected = hex::encode(mac.finalize().into_bytes());
        constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }

    /// Inserts into the idempotency ledger. Returns false when the event
    /// id already exists.
    async fn record_event(
        &self,
        event_id: &str,
        event_type: &str,
        payload_hash: &str,
    ) -> Result<bool, ServiceError> {
        let row = webhook_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            event_id: Set(event_id.to_string()),
            event_type: Set(event_type.to_string()),
            provider: Set(PROVIDER.to_string()),
            payload_hash: Set(payload_hash.to_string()),
            processed_at: Set(Utc::now()),
        };

        match row.insert(&*self.db_pool).await {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(false)
            }
            Err(e) => {
                error!("Failed to record webhook event: {}", e);
                Err(ServiceError::DatabaseError(e))
            }
        }
    }

    async fn apply_paid_event(
        &self,
        payload: &serde_json::Value,
    ) -> Result<WebhookOutcome, ServiceError> {
        let link_entity = payload
            .pointer("/payload/payment_link/entity")
            .ok_or_else(|| {
                ServiceError::BadRequest("paid event missing payment_link entity".into())
            })?;
        let payment_link_id = link_entity
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ServiceError::BadRequest("paid event missing payment link id".into()))?;

        let provider_reference = payload
            .pointer("/payload/payment/entity/id")
            .and_then(|v| v.as_str());

        // Amounts arrive in minor units (paise).
        let amount_minor = payload
            .pointer("/payload/payment/entity/amount")
            .or_else(|| link_entity.get("amount_paid"))
            .or_else(|| link_entity.get("amount"))
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        let amount_paid = Decimal::new(amount_minor, 2);

        match self
            .orders
            .confirm_payment(payment_link_id, provider_reference, amount_paid)
            .await?
        {
            PaymentConfirmation::OrderNotFound => {
                warn!(payment_link_id = %payment_link_id, "Paid event for unknown payment link");
                Ok(WebhookOutcome::OrderNotFound)
            }
            PaymentConfirmation::AlreadyPaid(order) => {
                info!(order_id = %order.id, "Order already paid; webhook had no effect");
                Ok(WebhookOutcome::AlreadyProcessed)
            }
            PaymentConfirmation::Confirmed { order, print_job } => {
                // Queue and notification failures are logged, never bubbled:
                // the payment is committed and the provider must see 200.
                if let Err(e) = self.queue.enqueue(&print_job.id.to_string()).await {
                    error!(print_job_id = %print_job.id, "Failed to enqueue print job: {}", e);
                }

                let short_id = order.id.to_string().chars().take(8).collect::<String>();
                if let Err(e) = self
                    .chat
                    .send_message(&order.customer_phone, &chat::msg_payment_success(&short_id))
                    .await
                {
                    error!(order_id = %order.id, "Failed to send payment confirmation: {}", e);
                }

                if let Err(e) = self.sessions.reset(&order.customer_phone).await {
                    error!(order_id = %order.id, "Failed to reset session after payment: {}", e);
                }

                Ok(WebhookOutcome::Processed {
                    order_id: order.id,
                    print_job_id: print_job.id,
                })
            }
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Computes the hex HMAC-SHA256 signature for a webhook body. Shared with
/// tests that forge deliveries.
pub fn sign_payload(secret: &str, raw_body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn signature_round_trip() {
        let secret = "webhook-secret-for-tests";
        let body = br#"{"event":"payment_link.paid"}"#;
        let sig = sign_payload(secret, body);

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        assert_eq!(sig, hex::encode(mac.finalize().into_bytes()));
        assert_eq!(sig.len(), 64);
    }
}
