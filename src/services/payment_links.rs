use crate::errors::ServiceError;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

/// Request to create a hosted payment link for an order.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentLinkRequest {
    pub amount: Decimal,
    pub currency: String,
    pub customer_phone: String,
    pub description: String,
    pub reference_id: String,
}

/// A provider-hosted payment link.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentLink {
    pub id: String,
    pub url: String,
}

/// Abstraction over the payment provider's link-creation API.
#[async_trait]
pub trait PaymentLinkProvider: Send + Sync {
    async fn create_payment_link(
        &self,
        request: PaymentLinkRequest,
    ) -> Result<PaymentLink, ServiceError>;
}

/// REST client for a Razorpay-style payment link API.
///
/// Amounts are sent in minor units (the provider expects paise/cents),
/// so the decimal total is multiplied by 100 before the call.
pub struct HttpPaymentLinkClient {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl HttpPaymentLinkClient {
    pub fn new(base_url: String, key_id: String, key_secret: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            key_id,
            key_secret,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateLinkBody {
    amount: i64,
    currency: String,
    description: String,
    reference_id: String,
    customer: CustomerBody,
    notify: NotifyBody,
}

#[derive(Debug, Serialize)]
struct CustomerBody {
    contact: String,
}

#[derive(Debug, Serialize)]
struct NotifyBody {
    sms: bool,
}

#[derive(Debug, Deserialize)]
struct CreateLinkResponse {
    id: String,
    short_url: String,
}

#[async_trait]
impl PaymentLinkProvider for HttpPaymentLinkClient {
    #[instrument(skip(self, request), fields(reference_id = %request.reference_id))]
    async fn create_payment_link(
        &self,
        request: PaymentLinkRequest,
    ) -> Result<PaymentLink, ServiceError> {
        let minor_units = (request.amount * dec!(100))
            .round()
            .to_i64()
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Amount {} cannot be expressed in minor units",
                    request.amount
                ))
            })?;

        let body = CreateLinkBody {
            amount: minor_units,
            currency: request.currency,
            description: request.description,
            reference_id: request.reference_id,
            customer: CustomerBody {
                contact: request.customer_phone,
            },
            notify: NotifyBody { sms: false },
        };

        let response = self
            .client
            .post(format!("{}/v1/payment_links", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Payment link request failed: {}", e);
                ServiceError::ExternalServiceError(format!("payment provider unreachable: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, body = %text, "Payment link creation rejected");
            return Err(ServiceError::ExternalServiceError(format!(
                "payment provider returned {}",
                status
            )));
        }

        let parsed: CreateLinkResponse = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("invalid payment provider response: {}", e))
        })?;

        Ok(PaymentLink {
            id: parsed.id,
            url: parsed.short_url,
        })
    }
}
