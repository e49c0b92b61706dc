use crate::errors::ServiceError;
use crate::models::{ConversationState, PrintType};
use crate::services::chat::{self, ChatProvider};
use crate::services::orders::OrderService;
use crate::services::sessions::SessionService;
use crate::storage::FileStore;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

/// An inbound chat message, normalized from the provider's webhook form.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub from: String,
    pub body: String,
    pub media: Option<InboundMedia>,
}

#[derive(Debug, Clone)]
pub struct InboundMedia {
    pub url: String,
    pub content_type: String,
    pub file_name: Option<String>,
}

/// Classified input, independent of the provider's message shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Media { supported: bool },
    Text(String),
}

/// What to do for one (state, input) pair. Produced by [`plan`], executed
/// by [`ConversationService::handle_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Welcome,
    SaveFile,
    UnsupportedFile,
    SetPrintType(PrintType),
    RepromptPrintType,
    SetCopies(i32),
    RepromptCopies,
    PaymentReminder,
    CancelFlow,
}

/// The conversation transition table as a total function.
///
/// Every (state, input) pair maps to exactly one action; unrecognized
/// input re-prompts without changing state. A supported document starts
/// (or restarts) an order from any state, including a pending payment.
/// Cancel keywords only mean "cancel" while a payment is pending;
/// anywhere else they are ordinary text. Keeping this pure makes the
/// table testable without a database.
pub fn plan(state: ConversationState, input: &Input) -> Action {
    use ConversationState::*;

    match input {
        Input::Media { supported: true } => Action::SaveFile,
        Input::Media { supported: false } => Action::UnsupportedFile,
        Input::Text(text) => match state {
            Idle | AwaitingFile => Action::Welcome,
            AwaitingPrintType => match parse_print_type(text) {
                Some(print_type) => Action::SetPrintType(print_type),
                None => Action::RepromptPrintType,
            },
            AwaitingCopies => match parse_copies(text) {
                Some(copies) => Action::SetCopies(copies),
                None => Action::RepromptCopies,
            },
            AwaitingPayment => {
                if is_cancel_keyword(text) {
                    Action::CancelFlow
                } else {
                    Action::PaymentReminder
                }
            }
        },
    }
}

/// Classifies a raw message. An attachment outranks the text body.
pub fn classify(message: &InboundMessage) -> Input {
    if let Some(media) = &message.media {
        return Input::Media {
            supported: is_supported_content_type(&media.content_type),
        };
    }
    Input::Text(message.body.clone())
}

const SUPPORTED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "text/plain",
];

pub fn is_supported_content_type(content_type: &str) -> bool {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    SUPPORTED_CONTENT_TYPES.contains(&normalized.as_str())
}

fn is_cancel_keyword(body: &str) -> bool {
    matches!(
        body.trim().to_lowercase().as_str(),
        "cancel" | "stop" | "exit"
    )
}

/// Accepts menu numbers, number words, and spelled-out options.
pub fn parse_print_type(text: &str) -> Option<PrintType> {
    match text.trim().to_lowercase().as_str() {
        "1" | "one" | "color" | "colour" => Some(PrintType::Color),
        "2" | "two" | "bw" | "b&w" | "black and white" | "black & white" => Some(PrintType::Bw),
        "3" | "three" | "both" | "all" => Some(PrintType::Both),
        _ => None,
    }
}

/// Accepts digits and the number words one through ten, clamped to the
/// 1..=100 order limit.
pub fn parse_copies(text: &str) -> Option<i32> {
    let normalized = text.trim().to_lowercase();
    let value = match normalized.as_str() {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        other => other.parse::<i32>().ok()?,
    };
    (1..=100).contains(&value).then_some(value)
}

/// Drives the conversation: classifies the message, plans the action,
/// executes its side effects, and returns the reply text.
pub struct ConversationService {
    sessions: Arc<SessionService>,
    orders: Arc<OrderService>,
    chat: Arc<dyn ChatProvider>,
    store: Arc<FileStore>,
    /// One lock per phone so messages from the same customer are applied
    /// in order even when the provider delivers them concurrently.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ConversationService {
    pub fn new(
        sessions: Arc<SessionService>,
        orders: Arc<OrderService>,
        chat: Arc<dyn ChatProvider>,
        store: Arc<FileStore>,
    ) -> Self {
        Self {
            sessions,
            orders,
            chat,
            store,
            locks: DashMap::new(),
        }
    }

    /// Handles one inbound message and returns the reply to send back.
    ///
    /// Capability failures (storage, payment provider) produce an
    /// apologetic reply and leave the session state untouched, so the
    /// customer can simply retry.
    #[instrument(skip(self, message), fields(from = %message.from))]
    pub async fn handle_message(&self, message: InboundMessage) -> Result<String, ServiceError> {
        let lock = self
            .locks
            .entry(message.from.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let session = self.sessions.get_or_create(&message.from).await?;
        let state = self.sessions.state_of(&session);
        let input = classify(&message);
        let action = plan(state, &input);
        info!(state = %state, action = ?action, "Planned conversation step");

        match action {
            Action::Welcome => {
                if state == ConversationState::Idle {
                    // IDLE greets and starts waiting for a document.
                    self.sessions
                        .store_state_awaiting_file(session)
                        .await?;
                }
                Ok(chat::msg_welcome())
            }
            Action::SaveFile => self.save_file(session, &message).await,
            Action::UnsupportedFile => Ok(chat::msg_unsupported_file()),
            Action::SetPrintType(print_type) => {
                if session.temp_file_url.is_none() {
                    // State says a file exists but the session lost it;
                    // recover by starting over.
                    warn!("Session in AWAITING_PRINT_TYPE without a stored file");
                    self.sessions.reset(&message.from).await?;
                    return Ok(chat::msg_send_file_first());
                }
                self.sessions
                    .store_print_type(session, &print_type.to_string())
                    .await?;
                Ok(chat::msg_ask_copies(print_type))
            }
            Action::RepromptPrintType => Ok(chat::msg_invalid_print_type()),
            Action::SetCopies(copies) => self.place_order(session, copies).await,
            Action::RepromptCopies => Ok(chat::msg_invalid_copies()),
            Action::PaymentReminder => {
                let url = match session.draft_order_id {
                    Some(order_id) => self
                        .orders
                        .get_order(order_id)
                        .await
                        .ok()
                        .and_then(|o| o.payment_link_url),
                    None => None,
                };
                match url {
                    Some(url) => Ok(chat::msg_awaiting_payment(&url)),
                    None => {
                        // No link to point at; unwedge the session.
                        self.sessions.reset(&message.from).await?;
                        Ok(chat::msg_welcome())
                    }
                }
            }
            Action::CancelFlow => {
                self.sessions.reset(&message.from).await?;
                Ok(chat::msg_cancelled())
            }
        }
    }

    async fn save_file(
        &self,
        session: crate::entities::session::Model,
        message: &InboundMessage,
    ) -> Result<String, ServiceError> {
        let media = message
            .media
            .as_ref()
            .ok_or_else(|| ServiceError::InternalError("SaveFile planned without media".into()))?;

        let download = match self.chat.download_media(&media.url).await {
            Ok(download) => download,
            Err(e) => {
                error!("Media download failed: {}", e);
                return Ok(chat::msg_processing_problem());
            }
        };

        let file_name = media
            .file_name
            .clone()
            .or(download.file_name)
            .unwrap_or_else(|| default_file_name(&download.content_type));

        let stored = match self
            .store
            .save(&message.from, &file_name, &download.bytes)
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                error!("Failed to store uploaded document: {}", e);
                return Ok(chat::msg_processing_problem());
            }
        };

        self.sessions
            .store_temp_file(session, &stored.url, &file_name, Some(&media.url))
            .await?;
        Ok(chat::msg_file_received(&file_name))
    }

    async fn place_order(
        &self,
        session: crate::entities::session::Model,
        copies: i32,
    ) -> Result<String, ServiceError> {
        let (Some(file_url), Some(file_name), Some(print_type_str)) = (
            session.temp_file_url.clone(),
            session.temp_file_name.clone(),
            session.temp_print_type.clone(),
        ) else {
            warn!("Session in AWAITING_COPIES missing file or print type");
            self.sessions.reset(&session.phone).await?;
            return Ok(chat::msg_send_file_first());
        };

        let print_type: PrintType = print_type_str
            .parse()
            .map_err(|_| ServiceError::InternalError(format!("bad print type: {}", print_type_str)))?;

        let order = self.orders.create_draft(&session.phone).await?;
        self.orders
            .attach_file(order.id, &file_name, &file_url, None, 1)
            .await?;
        let order = self
            .orders
            .attach_print_config(order.id, print_type, copies)
            .await?;

        let finalized = match self.orders.finalize_with_payment_link(order.id).await {
            Ok(finalized) => finalized,
            Err(e) => {
                // Leave the session in AWAITING_COPIES; the draft order is
                // abandoned and a retry creates a fresh one.
                error!("Payment link creation failed: {}", e);
                if let Err(e) = self.orders.cancel_draft(order.id).await {
                    error!("Failed to cancel abandoned draft: {}", e);
                }
                return Ok(chat::msg_processing_problem());
            }
        };

        self.sessions.link_draft_order(session, finalized.id).await?;

        let link_url = finalized.payment_link_url.as_deref().unwrap_or_default();
        let mut reply = chat::msg_order_summary(&file_name, print_type, copies, finalized.amount);
        reply.push('\n');
        reply.push_str(&chat::msg_payment_link(link_url));
        Ok(reply)
    }
}

fn default_file_name(content_type: &str) -> String {
    let ext = match content_type.split(';').next().unwrap_or("").trim() {
        "application/pdf" => "pdf",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        "text/plain" => "txt",
        _ => "bin",
    };
    format!("document.{}", ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn print_type_aliases() {
        assert_eq!(parse_print_type("1"), Some(PrintType::Color));
        assert_eq!(parse_print_type(" one "), Some(PrintType::Color));
        assert_eq!(parse_print_type("Colour"), Some(PrintType::Color));
        assert_eq!(parse_print_type("2"), Some(PrintType::Bw));
        assert_eq!(parse_print_type("B&W"), Some(PrintType::Bw));
        assert_eq!(parse_print_type("black and white"), Some(PrintType::Bw));
        assert_eq!(parse_print_type("3"), Some(PrintType::Both));
        assert_eq!(parse_print_type("BOTH"), Some(PrintType::Both));
        assert_eq!(parse_print_type("all"), Some(PrintType::Both));
        assert_eq!(parse_print_type("4"), None);
        assert_eq!(parse_print_type("maybe"), None);
    }

    #[test]
    fn copies_parsing_and_bounds() {
        assert_eq!(parse_copies("5"), Some(5));
        assert_eq!(parse_copies(" ten "), Some(10));
        assert_eq!(parse_copies("100"), Some(100));
        assert_eq!(parse_copies("0"), None);
        assert_eq!(parse_copies("101"), None);
        assert_eq!(parse_copies("-3"), None);
        assert_eq!(parse_copies("a few"), None);
        assert_eq!(parse_copies("3.5"), None);
    }

    #[test]
    fn supported_content_types() {
        assert!(is_supported_content_type("application/pdf"));
        assert!(is_supported_content_type("image/JPEG"));
        assert!(is_supported_content_type("image/gif"));
        assert!(is_supported_content_type("image/png; charset=binary"));
        assert!(is_supported_content_type("text/plain"));
        assert!(is_supported_content_type(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        ));
        assert!(is_supported_content_type("application/vnd.ms-powerpoint"));
        assert!(!is_supported_content_type("video/mp4"));
        assert!(!is_supported_content_type("application/zip"));
    }

    #[test]
    fn plan_is_total() {
        let inputs = [
            Input::Media { supported: true },
            Input::Media { supported: false },
            Input::Text("hello".into()),
            Input::Text("cancel".into()),
            Input::Text("1".into()),
            Input::Text("5".into()),
            Input::Text("".into()),
        ];
        for state in ConversationState::iter() {
            for input in &inputs {
                // Must never panic; every pair has a defined action.
                let _ = plan(state, input);
            }
        }
    }

    #[test]
    fn cancel_only_applies_to_a_pending_payment() {
        assert_eq!(
            plan(
                ConversationState::AwaitingPayment,
                &Input::Text("cancel".into())
            ),
            Action::CancelFlow
        );
        assert_eq!(
            plan(
                ConversationState::AwaitingPayment,
                &Input::Text(" STOP ".into())
            ),
            Action::CancelFlow
        );

        // Anywhere else the word is ordinary (and here invalid) input.
        assert_eq!(
            plan(
                ConversationState::AwaitingCopies,
                &Input::Text("cancel".into())
            ),
            Action::RepromptCopies
        );
        assert_eq!(
            plan(
                ConversationState::AwaitingPrintType,
                &Input::Text("stop".into())
            ),
            Action::RepromptPrintType
        );
        assert_eq!(
            plan(ConversationState::Idle, &Input::Text("exit".into())),
            Action::Welcome
        );
    }

    #[test]
    fn awaiting_payment_reminds_on_text_but_accepts_a_new_document() {
        let state = ConversationState::AwaitingPayment;
        assert_eq!(
            plan(state, &Input::Text("3".into())),
            Action::PaymentReminder
        );
        assert_eq!(
            plan(state, &Input::Text("did it work?".into())),
            Action::PaymentReminder
        );
        // A new upload restarts the order flow.
        assert_eq!(
            plan(state, &Input::Media { supported: true }),
            Action::SaveFile
        );
    }

    #[test]
    fn idle_text_greets_and_media_starts_order() {
        assert_eq!(
            plan(ConversationState::Idle, &Input::Text("hi".into())),
            Action::Welcome
        );
        assert_eq!(
            plan(ConversationState::Idle, &Input::Media { supported: true }),
            Action::SaveFile
        );
        assert_eq!(
            plan(ConversationState::Idle, &Input::Media { supported: false }),
            Action::UnsupportedFile
        );
    }

    #[test]
    fn selection_states_parse_or_reprompt() {
        assert_eq!(
            plan(
                ConversationState::AwaitingPrintType,
                &Input::Text("2".into())
            ),
            Action::SetPrintType(PrintType::Bw)
        );
        assert_eq!(
            plan(
                ConversationState::AwaitingPrintType,
                &Input::Text("purple".into())
            ),
            Action::RepromptPrintType
        );
        assert_eq!(
            plan(ConversationState::AwaitingCopies, &Input::Text("7".into())),
            Action::SetCopies(7)
        );
        assert_eq!(
            plan(
                ConversationState::AwaitingCopies,
                &Input::Text("lots".into())
            ),
            Action::RepromptCopies
        );
    }

    #[test]
    fn new_media_mid_flow_replaces_the_file() {
        assert_eq!(
            plan(
                ConversationState::AwaitingCopies,
                &Input::Media { supported: true }
            ),
            Action::SaveFile
        );
    }

    #[test]
    fn classification_prefers_the_attachment() {
        // Even a cancel-looking body is media when a document rides along.
        let msg = InboundMessage {
            from: "+15550001111".into(),
            body: "CANCEL".into(),
            media: Some(InboundMedia {
                url: "http://media".into(),
                content_type: "application/pdf".into(),
                file_name: None,
            }),
        };
        assert_eq!(classify(&msg), Input::Media { supported: true });

        let msg = InboundMessage {
            from: "+15550001111".into(),
            body: "".into(),
            media: Some(InboundMedia {
                url: "http://media".into(),
                content_type: "video/mp4".into(),
                file_name: None,
            }),
        };
        assert_eq!(classify(&msg), Input::Media { supported: false });

        let msg = InboundMessage {
            from: "+15550001111".into(),
            body: "cancel".into(),
            media: None,
        };
        assert_eq!(classify(&msg), Input::Text("cancel".into()));
    }
}
