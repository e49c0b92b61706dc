use crate::errors::ServiceError;
use crate::services::payments::WebhookOutcome;
use crate::AppState;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde_json::json;
use tracing::instrument;

const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

pub fn payment_webhook_routes() -> Router<AppState> {
    Router::new().route("/", post(receive_event))
}

/// Receives a payment provider event.
///
/// Signature verification runs against the raw body, before any JSON
/// parsing. Every verified delivery gets a 200 regardless of outcome so
/// the provider stops retrying; only a bad signature is rejected.
#[utoipa::path(
    post,
    path = "/webhooks/payments",
    tag = "webhooks",
    request_body(content = String, content_type = "application/json", description = "Raw signed event envelope"),
    responses(
        (status = 200, description = "Event accepted"),
        (status = 401, description = "Missing or invalid signature"),
        (status = 400, description = "Malformed event body")
    )
)]
#[instrument(skip(state, headers, body))]
pub async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .services
        .payments
        .process_event(&body, signature)
        .await?;

    let body = match outcome {
        WebhookOutcome::Processed {
            order_id,
            print_job_id,
        } => json!({
            "status": "processed",
            "order_id": order_id,
            "print_job_id": print_job_id,
        }),
        WebhookOutcome::AlreadyProcessed => json!({ "status": "already_processed" }),
        WebhookOutcome::Ignored => json!({ "status": "ignored" }),
        WebhookOutcome::OrderNotFound => json!({ "status": "order_not_found" }),
    };

    Ok(Json(body).into_response())
}
