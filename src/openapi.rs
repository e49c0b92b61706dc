use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::ErrorResponse;
use crate::models::{ConversationState, OrderStatus, PaymentState, PrintJobStatus, PrintType};
use crate::services::print_jobs::JobDetail;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::payment_webhooks::receive_event,
        crate::handlers::print_jobs::list_jobs,
        crate::handlers::print_jobs::get_job,
        crate::handlers::print_jobs::update_status,
        crate::handlers::print_jobs::retry_job,
    ),
    components(schemas(
        ErrorResponse,
        JobDetail,
        ConversationState,
        PrintType,
        OrderStatus,
        PaymentState,
        PrintJobStatus,
    )),
    tags(
        (name = "webhooks", description = "Inbound provider webhooks"),
        (name = "print-jobs", description = "Worker-facing print job API")
    ),
    info(
        title = "PrintDesk API",
        description = "Chat-driven print shop backend"
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
