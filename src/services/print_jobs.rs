use crate::db::DbPool;
use crate::entities::{order, print_job};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::message_queue::PrintQueue;
use crate::models::PrintJobStatus;
use crate::services::chat::{self, ChatProvider};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Everything the print worker needs to execute a job.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobDetail {
    pub id: Uuid,
    pub order_id: Uuid,
    pub file_url: String,
    pub file_name: String,
    pub copies: i32,
    pub print_type: String,
    pub status: String,
    pub retry_count: i32,
    pub max_retries: i32,
    pub printer_name: Option<String>,
}

/// Print job lifecycle driven by worker status reports.
pub struct PrintJobService {
    db_pool: Arc<DbPool>,
    chat: Arc<dyn ChatProvider>,
    queue: Arc<dyn PrintQueue>,
    event_sender: Option<Arc<EventSender>>,
}

impl PrintJobService {
    pub fn new(
        db_pool: Arc<DbPool>,
        chat: Arc<dyn ChatProvider>,
        queue: Arc<dyn PrintQueue>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            chat,
            queue,
            event_sender,
        }
    }

    /// Fetches a job together with the order fields the worker needs.
    #[instrument(skip(self))]
    pub async fn get_job_detail(&self, job_id: Uuid) -> Result<JobDetail, ServiceError> {
        let (job, order) = self.find_with_order(job_id).await?;

        Ok(JobDetail {
            id: job.id,
            order_id: job.order_id,
            file_url: order.file_url.unwrap_or_default(),
            file_name: order.file_name.unwrap_or_default(),
            copies: order.copies,
            print_type: order.print_type.unwrap_or_default(),
            status: job.status,
            retry_count: job.retry_count,
            max_retries: job.max_retries,
            printer_name: job.printer_name,
        })
    }

    /// Applies a worker status report.
    ///
    /// COMPLETED stamps printed_at and notifies the customer. FAILED
    /// records the error and bumps retry_count; the failure notification
    /// fires exactly once, on the report that exhausts max_retries.
    #[instrument(skip(self, error_message))]
    pub async fn update_status(
        &self,
        job_id: Uuid,
        new_status: PrintJobStatus,
        error_message: Option<&str>,
    ) -> Result<print_job::Model, ServiceError> {
        let (job, order) = self.find_with_order(job_id).await?;

        let current = PrintJobStatus::from_str(&job.status)
            .map_err(|_| ServiceError::InvalidStatus(job.status.clone()))?;
        if !worker_transition_allowed(current, new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "print job {} cannot move from {} to {}",
                job_id, current, new_status
            )));
        }

        let now = Utc::now();
        let retry_count = job.retry_count;
        let max_retries = job.max_retries;

        let mut active: print_job::ActiveModel = job.into();
        active.status = Set(new_status.to_string());
        active.updated_at = Set(Some(now));

        match new_status {
            PrintJobStatus::Completed => {
                active.printed_at = Set(Some(now));
            }
            PrintJobStatus::Failed => {
                active.last_error = Set(error_message.map(str::to_string));
                active.retry_count = Set(retry_count + 1);
            }
            _ => {}
        }

        let updated = active.update(&*self.db_pool).await?;

        match new_status {
            PrintJobStatus::Completed => {
                info!(print_job_id = %job_id, "Print job completed");
                let file_name = order.file_name.as_deref().unwrap_or("your document");
                self.notify(&order.customer_phone, &chat::msg_print_complete(file_name))
                    .await;
                self.emit(Event::PrintJobCompleted {
                    print_job_id: job_id,
                })
                .await;
            }
            PrintJobStatus::Failed => {
                warn!(
                    print_job_id = %job_id,
                    retry_count = updated.retry_count,
                    max_retries,
                    "Print job failed"
                );
                if updated.retry_count == max_retries {
                    self.notify(&order.customer_phone, &chat::msg_print_failed())
                        .await;
                }
                self.emit(Event::PrintJobFailed {
                    print_job_id: job_id,
                    retry_count: updated.retry_count,
                })
                .await;
            }
            _ => {}
        }

        Ok(updated)
    }

    /// Re-queues a FAILED job. The retry count is preserved so repeated
    /// failures still converge on the max_retries cutoff.
    #[instrument(skip(self))]
    pub async fn retry(&self, job_id: Uuid) -> Result<print_job::Model, ServiceError> {
        let job = self.get_job(job_id).await?;

        if job.status != PrintJobStatus::Failed.to_string() {
            return Err(ServiceError::InvalidStatus(format!(
                "print job {} is {}, only FAILED jobs can be retried",
                job_id, job.status
            )));
        }

        let mut active: print_job::ActiveModel = job.into();
        active.status = Set(PrintJobStatus::Queued.to_string());
        active.last_error = Set(None);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db_pool).await?;

        if let Err(e) = self.queue.enqueue(&job_id.to_string()).await {
            error!(print_job_id = %job_id, "Failed to re-enqueue print job: {}", e);
            return Err(ServiceError::QueueError(e.to_string()));
        }

        info!(print_job_id = %job_id, retry_count = updated.retry_count, "Print job re-queued");
        self.emit(Event::PrintJobQueued {
            print_job_id: job_id,
        })
        .await;
        Ok(updated)
    }

    /// Lists jobs, newest first, optionally filtered by status.
    pub async fn list(
        &self,
        status: Option<PrintJobStatus>,
    ) -> Result<Vec<print_job::Model>, ServiceError> {
        let mut query = print_job::Entity::find();
        if let Some(status) = status {
            query = query.filter(print_job::Column::Status.eq(status.to_string()));
        }
        query
            .order_by_desc(print_job::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<print_job::Model, ServiceError> {
        print_job::Entity::find_by_id(job_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Print job {} not found", job_id)))
    }

    async fn find_with_order(
        &self,
        job_id: Uuid,
    ) -> Result<(print_job::Model, order::Model), ServiceError> {
        let job = self.get_job(job_id).await?;
        let order = order::Entity::find_by_id(job.order_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "print job {} references missing order {}",
                    job_id, job.order_id
                ))
            })?;
        Ok((job, order))
    }

    async fn notify(&self, phone: &str, body: &str) {
        if let Err(e) = self.chat.send_message(phone, body).await {
            error!("Failed to send print status notification: {}", e);
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                error!("Failed to emit event: {}", e);
            }
        }
    }
}

/// Transitions a worker status report may perform. QUEUED and retry moves
/// are owned by the backend, not the worker.
fn worker_transition_allowed(current: PrintJobStatus, next: PrintJobStatus) -> bool {
    use PrintJobStatus::*;
    matches!(
        (current, next),
        (Queued, Printing) | (Queued, Failed) | (Printing, Completed) | (Printing, Failed)
    )
}
