use crate::services::conversation::{InboundMedia, InboundMessage};
use crate::AppState;
use axum::{
    extract::{Form, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use tracing::{error, info, instrument};

/// Inbound message webhook form, field names as the chat provider sends
/// them.
#[derive(Debug, Deserialize)]
pub struct InboundForm {
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "NumMedia", default)]
    pub num_media: Option<String>,
    #[serde(rename = "MediaUrl0")]
    pub media_url: Option<String>,
    #[serde(rename = "MediaContentType0")]
    pub media_content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusCallbackForm {
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
    #[serde(rename = "MessageStatus")]
    pub message_status: Option<String>,
}

pub fn chat_webhook_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(inbound_message).get(verify_webhook))
        .route("/status", post(message_status))
}

/// Receives an inbound customer message and replies with TwiML.
///
/// The provider retries non-2xx responses, so this endpoint answers 200
/// even when handling fails; the failure reply goes out as the message
/// body instead.
#[instrument(skip(state, form), fields(from = %form.from))]
async fn inbound_message(State(state): State<AppState>, Form(form): Form<InboundForm>) -> Response {
    let media = match (form.media_url, form.media_content_type) {
        (Some(url), Some(content_type))
            if form.num_media.as_deref().map_or(true, |n| n != "0") =>
        {
            Some(InboundMedia {
                url,
                content_type,
                file_name: None,
            })
        }
        _ => None,
    };

    let message = InboundMessage {
        from: form.from,
        body: form.body,
        media,
    };

    let reply = match state.services.conversation.handle_message(message).await {
        Ok(reply) => reply,
        Err(e) => {
            error!("Conversation handling failed: {}", e);
            crate::services::chat::msg_processing_problem()
        }
    };

    twiml_response(&reply)
}

/// Webhook verification challenge (hub.challenge echo).
#[instrument(skip(state, params))]
async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let expected = state.config.chat_verify_token.as_deref();
    match (params.mode.as_deref(), params.verify_token.as_deref(), expected) {
        (Some("subscribe"), Some(token), Some(expected)) if token == expected => {
            info!("Chat webhook verified");
            (StatusCode::OK, params.challenge.unwrap_or_default()).into_response()
        }
        _ => (StatusCode::FORBIDDEN, "verification failed").into_response(),
    }
}

/// Delivery status callbacks are acknowledged and logged, nothing more.
async fn message_status(Form(form): Form<StatusCallbackForm>) -> StatusCode {
    info!(
        sid = form.message_sid.as_deref().unwrap_or("-"),
        status = form.message_status.as_deref().unwrap_or("-"),
        "Message status callback"
    );
    StatusCode::OK
}

fn twiml_response(body: &str) -> Response {
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        escape_xml(body)
    );
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml")],
        xml,
    )
        .into_response()
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_escaping() {
        assert_eq!(escape_xml("B&W <3 \"quotes\""), "B&amp;W &lt;3 &quot;quotes&quot;");
    }
}
