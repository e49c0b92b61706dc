use crate::db::DbPool;
use crate::entities::{order, payment, print_job};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{OrderStatus, PaymentState, PrintJobStatus, PrintType};
use crate::services::payment_links::{PaymentLinkProvider, PaymentLinkRequest};
use crate::services::pricing::{self, PageRates};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, SqlErr, TransactionTrait,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

const DEFAULT_MAX_RETRIES: i32 = 3;

/// Outcome of applying a payment confirmation to an order.
///
/// `AlreadyPaid` covers both a prior confirmed payment and losing the
/// race against a concurrent confirmation of the same order.
pub enum PaymentConfirmation {
    OrderNotFound,
    AlreadyPaid(order::Model),
    Confirmed {
        order: order::Model,
        print_job: print_job::Model,
    },
}

/// Order lifecycle: draft creation, pricing, payment link issuance, and
/// payment confirmation.
pub struct OrderService {
    db_pool: Arc<DbPool>,
    payment_links: Arc<dyn PaymentLinkProvider>,
    event_sender: Option<Arc<EventSender>>,
    rates: PageRates,
    default_shop_id: Option<Uuid>,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        payment_links: Arc<dyn PaymentLinkProvider>,
        event_sender: Option<Arc<EventSender>>,
        rates: PageRates,
        default_shop_id: Option<Uuid>,
    ) -> Self {
        Self {
            db_pool,
            payment_links,
            event_sender,
            rates,
            default_shop_id,
        }
    }

    /// Creates an empty DRAFT order for a customer.
    #[instrument(skip(self))]
    pub async fn create_draft(&self, customer_phone: &str) -> Result<order::Model, ServiceError> {
        let now = Utc::now();
        let model = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_phone: Set(customer_phone.to_string()),
            file_name: Set(None),
            file_url: Set(None),
            file_hash: Set(None),
            page_count: Set(1),
            print_type: Set(None),
            copies: Set(1),
            amount: Set(Decimal::ZERO),
            status: Set(OrderStatus::Draft.to_string()),
            payment_link_id: Set(None),
            payment_link_url: Set(None),
            shop_id: Set(self.default_shop_id),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let created = model.insert(&*self.db_pool).await.map_err(|e| {
            error!("Failed to create draft order: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        self.emit(Event::OrderCreated {
            order_id: created.id,
        })
        .await;
        Ok(created)
    }

    /// Attaches the stored document to a draft order.
    #[instrument(skip(self, file_url))]
    pub async fn attach_file(
        &self,
        order_id: Uuid,
        file_name: &str,
        file_url: &str,
        file_hash: Option<&str>,
        page_count: i32,
    ) -> Result<order::Model, ServiceError> {
        let model = self.require_draft(order_id).await?;

        let mut active: order::ActiveModel = model.into();
        active.file_name = Set(Some(file_name.to_string()));
        active.file_url = Set(Some(file_url.to_string()));
        active.file_hash = Set(file_hash.map(str::to_string));
        active.page_count = Set(page_count.max(1));
        active.updated_at = Set(Some(Utc::now()));
        active.update(&*self.db_pool).await.map_err(Into::into)
    }

    /// Records the print configuration and reprices the order.
    #[instrument(skip(self))]
    pub async fn attach_print_config(
        &self,
        order_id: Uuid,
        print_type: PrintType,
        copies: i32,
    ) -> Result<order::Model, ServiceError> {
        if !(1..=100).contains(&copies) {
            return Err(ServiceError::ValidationError(format!(
                "copies must be between 1 and 100, got {}",
                copies
            )));
        }

        let model = self.require_draft(order_id).await?;
        let amount = pricing::quote(print_type, copies, model.page_count, &self.rates);

        let mut active: order::ActiveModel = model.into();
        active.print_type = Set(Some(print_type.to_string()));
        active.copies = Set(copies);
        active.amount = Set(amount);
        active.updated_at = Set(Some(Utc::now()));
        active.update(&*self.db_pool).await.map_err(Into::into)
    }

    /// Requests a payment link from the provider, then moves the order to
    /// PAYMENT_PENDING and opens an INITIATED payment record.
    ///
    /// The provider call happens before the transaction on purpose: a
    /// provider failure must leave the order untouched in DRAFT.
    #[instrument(skip(self))]
    pub async fn finalize_with_payment_link(
        &self,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let model = self.require_draft(order_id).await?;

        if model.file_url.is_none() {
            return Err(ServiceError::ValidationError(
                "order has no document attached".into(),
            ));
        }
        if model.print_type.is_none() {
            return Err(ServiceError::ValidationError(
                "order has no print type selected".into(),
            ));
        }
        if model.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "order amount must be positive".into(),
            ));
        }

        let link = self
            .payment_links
            .create_payment_link(PaymentLinkRequest {
                amount: model.amount,
                currency: "INR".to_string(),
                customer_phone: model.customer_phone.clone(),
                description: format!(
                    "Print order for {}",
                    model.file_name.as_deref().unwrap_or("document")
                ),
                reference_id: model.id.to_string(),
            })
            .await?;

        let txn = self.db_pool.begin().await?;

        let order_amount = model.amount;
        let mut active: order::ActiveModel = model.into();
        active.status = Set(OrderStatus::PaymentPending.to_string());
        active.payment_link_id = Set(Some(link.id.clone()));
        active.payment_link_url = Set(Some(link.url.clone()));
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        let payment_row = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(updated.id),
            payment_link_id: Set(link.id),
            provider_reference: Set(None),
            status: Set(PaymentState::Initiated.to_string()),
            amount: Set(order_amount),
            paid_at: Set(None),
            created_at: Set(Utc::now()),
        };
        payment_row.insert(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit order finalization: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %updated.id, "Order finalized with payment link");
        self.emit(Event::OrderFinalized {
            order_id: updated.id,
        })
        .await;
        Ok(updated)
    }

    /// Applies a verified payment confirmation.
    ///
    /// Idempotent at the order level: an order already PAID, or a lost race
    /// on the print job's unique order_id index, reports `AlreadyPaid`
    /// without side effects.
    #[instrument(skip(self))]
    pub async fn confirm_payment(
        &self,
        payment_link_id: &str,
        provider_reference: Option<&str>,
        amount_paid: Decimal,
    ) -> Result<PaymentConfirmation, ServiceError> {
        let Some(model) = order::Entity::find()
            .filter(order::Column::PaymentLinkId.eq(payment_link_id))
            .one(&*self.db_pool)
            .await?
        else {
            return Ok(PaymentConfirmation::OrderNotFound);
        };

        let status = OrderStatus::from_str(&model.status)
            .map_err(|_| ServiceError::InvalidStatus(model.status.clone()))?;
        if status == OrderStatus::Paid {
            return Ok(PaymentConfirmation::AlreadyPaid(model));
        }
        if !status.can_transition_to(OrderStatus::Paid) {
            return Err(ServiceError::InvalidStatus(format!(
                "order {} cannot be paid from status {}",
                model.id, model.status
            )));
        }

        if amount_paid != model.amount {
            warn!(
                order_id = %model.id,
                expected = %model.amount,
                received = %amount_paid,
                "Paid amount differs from order amount"
            );
        }

        let txn = self.db_pool.begin().await?;
        let now = Utc::now();

        let order_id = model.id;
        let shop_id = model.shop_id;
        let mut active: order::ActiveModel = model.into();
        active.status = Set(OrderStatus::Paid.to_string());
        active.updated_at = Set(Some(now));
        let updated = active.update(&txn).await?;

        if let Some(payment_row) = payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(&txn)
            .await?
        {
            let mut active: payment::ActiveModel = payment_row.into();
            active.status = Set(PaymentState::Success.to_string());
            active.provider_reference = Set(provider_reference.map(str::to_string));
            active.paid_at = Set(Some(now));
            active.update(&txn).await?;
        }

        let job = print_job::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            shop_id: Set(shop_id),
            printer_name: Set(None),
            status: Set(PrintJobStatus::Queued.to_string()),
            retry_count: Set(0),
            max_retries: Set(DEFAULT_MAX_RETRIES),
            last_error: Set(None),
            printed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let job = match job.insert(&txn).await {
            Ok(job) => job,
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                // A concurrent confirmation already created the job.
                txn.rollback().await?;
                let current = self.get_order(order_id).await?;
                return Ok(PaymentConfirmation::AlreadyPaid(current));
            }
            Err(e) => {
                error!("Failed to create print job: {}", e);
                return Err(ServiceError::DatabaseError(e));
            }
        };

        txn.commit().await?;

        info!(order_id = %order_id, print_job_id = %job.id, "Payment confirmed, print job created");
        self.emit(Event::OrderPaid {
            order_id,
            print_job_id: job.id,
        })
        .await;

        Ok(PaymentConfirmation::Confirmed {
            order: updated,
            print_job: job,
        })
    }

    /// Cancels a DRAFT order. Orders past DRAFT stay on the books.
    #[instrument(skip(self))]
    pub async fn cancel_draft(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        let model = self.require_draft(order_id).await?;
        let mut active: order::ActiveModel = model.into();
        active.status = Set(OrderStatus::Cancelled.to_string());
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db_pool).await?;

        self.emit(Event::OrderCancelled {
            order_id: updated.id,
        })
        .await;
        Ok(updated)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn require_draft(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        let model = self.get_order(order_id).await?;
        if model.status != OrderStatus::Draft.to_string() {
            return Err(ServiceError::InvalidStatus(format!(
                "order {} is {}, expected DRAFT",
                order_id, model.status
            )));
        }
        Ok(model)
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                error!("Failed to emit event: {}", e);
            }
        }
    }
}
