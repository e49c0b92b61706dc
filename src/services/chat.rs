use crate::errors::ServiceError;
use crate::models::PrintType;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{error, instrument};

/// A media attachment fetched from the chat provider.
pub struct MediaDownload {
    pub bytes: bytes::Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
}

/// Abstraction over the chat platform (outbound messages and media fetch).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Sends a text message to a customer phone number.
    async fn send_message(&self, to: &str, body: &str) -> Result<(), ServiceError>;

    /// Downloads a media attachment referenced by an inbound message.
    async fn download_media(&self, media_url: &str) -> Result<MediaDownload, ServiceError>;
}

/// Twilio REST client for WhatsApp messaging.
pub struct TwilioChatClient {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioChatClient {
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            account_sid,
            auth_token,
            from_number,
        }
    }
}

#[async_trait]
impl ChatProvider for TwilioChatClient {
    #[instrument(skip(self, body))]
    async fn send_message(&self, to: &str, body: &str) -> Result<(), ServiceError> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );
        let params = [
            ("From", self.from_number.as_str()),
            ("To", to),
            ("Body", body),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!("Chat send failed: {}", e);
                ServiceError::ExternalServiceError(format!("chat provider unreachable: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(status = %status, "Chat provider rejected outbound message");
            return Err(ServiceError::ExternalServiceError(format!(
                "chat provider returned {}",
                status
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn download_media(&self, media_url: &str) -> Result<MediaDownload, ServiceError> {
        let response = self
            .client
            .get(media_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("media download failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "media download returned {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = response.bytes().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("media body read failed: {}", e))
        })?;

        Ok(MediaDownload {
            bytes,
            content_type,
            file_name: None,
        })
    }
}

/// Null provider for environments without chat credentials. Outbound
/// messages are logged and dropped.
pub struct NoopChatClient;

#[async_trait]
impl ChatProvider for NoopChatClient {
    async fn send_message(&self, to: &str, body: &str) -> Result<(), ServiceError> {
        tracing::info!(to = %to, body = %body, "Chat disabled; dropping outbound message");
        Ok(())
    }

    async fn download_media(&self, _media_url: &str) -> Result<MediaDownload, ServiceError> {
        Err(ServiceError::ExternalServiceError(
            "chat provider is not configured".into(),
        ))
    }
}

// Canned reply templates. Kept together so the whole conversational
// surface can be reviewed in one place.

pub fn msg_welcome() -> String {
    "Welcome to PrintDesk! Send me the document you want to print (PDF or image) and I'll take care of the rest.".to_string()
}

pub fn msg_file_received(file_name: &str) -> String {
    format!(
        "Got it! Received \"{}\".\n\nHow would you like it printed?\n1. Color\n2. Black & White\n3. Both (one color copy + one B&W copy)\n\nReply with a number or type the option.",
        file_name
    )
}

pub fn msg_ask_copies(print_type: PrintType) -> String {
    format!(
        "{} it is. How many copies do you need? (1-100)",
        print_type_label(print_type)
    )
}

pub fn msg_invalid_print_type() -> String {
    "Sorry, I didn't catch that. Please reply with:\n1. Color\n2. Black & White\n3. Both".to_string()
}

pub fn msg_invalid_copies() -> String {
    "Please send a number of copies between 1 and 100.".to_string()
}

pub fn msg_order_summary(
    file_name: &str,
    print_type: PrintType,
    copies: i32,
    amount: Decimal,
) -> String {
    // Two decimal places regardless of the scale the amount came back
    // from the database with.
    format!(
        "Order summary:\nFile: {}\nType: {}\nCopies: {}\nTotal: \u{20B9}{:.2}\n",
        file_name,
        print_type_label(print_type),
        copies,
        amount
    )
}

pub fn msg_payment_link(url: &str) -> String {
    format!(
        "Please complete the payment here:\n{}\n\nYour documents go to print as soon as the payment clears.",
        url
    )
}

pub fn msg_awaiting_payment(url: &str) -> String {
    format!(
        "Your payment is still pending. Use this link to pay:\n{}\n\nOr reply \"cancel\" to discard the order.",
        url
    )
}

pub fn msg_payment_success(order_short_id: &str) -> String {
    format!(
        "Payment received! Order {} is queued for printing. I'll message you when it's done.",
        order_short_id
    )
}

pub fn msg_print_complete(file_name: &str) -> String {
    format!(
        "Your document \"{}\" has been printed and is ready for pickup. Thank you!",
        file_name
    )
}

pub fn msg_print_failed() -> String {
    "We hit a problem printing your document. The shop has been notified and will follow up with you shortly.".to_string()
}

pub fn msg_cancelled() -> String {
    "Your order has been cancelled. Send a document whenever you're ready to start again.".to_string()
}

pub fn msg_unsupported_file() -> String {
    "Sorry, that file type isn't supported. Please send a PDF, Word document, or image (JPG/PNG).".to_string()
}

pub fn msg_send_file_first() -> String {
    "Please send the document you'd like to print first.".to_string()
}

pub fn msg_processing_problem() -> String {
    "Sorry, something went wrong on our side. Please try that again in a moment.".to_string()
}

fn print_type_label(print_type: PrintType) -> &'static str {
    match print_type {
        PrintType::Color => "Color",
        PrintType::Bw => "Black & White",
        PrintType::Both => "Color + B&W",
    }
}
