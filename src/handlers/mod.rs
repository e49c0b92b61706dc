use crate::services::conversation::ConversationService;
use crate::services::orders::OrderService;
use crate::services::payments::PaymentWebhookService;
use crate::services::print_jobs::PrintJobService;
use crate::services::sessions::SessionService;
use std::sync::Arc;

pub mod chat_webhooks;
pub mod payment_webhooks;
pub mod print_jobs;

/// Service container shared by every handler through [`crate::AppState`].
#[derive(Clone)]
pub struct AppServices {
    pub conversation: Arc<ConversationService>,
    pub orders: Arc<OrderService>,
    pub sessions: Arc<SessionService>,
    pub payments: Arc<PaymentWebhookService>,
    pub print_jobs: Arc<PrintJobService>,
}
