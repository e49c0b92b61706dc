use crate::db::DbPool;
use crate::entities::session::{self, Entity as Session};
use crate::errors::ServiceError;
use crate::models::ConversationState;
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// Manages per-phone conversation sessions and their lifecycle.
///
/// A session that has been idle longer than the configured timeout is
/// treated as abandoned: the next message from that phone starts over
/// from IDLE with all temporary selections cleared.
pub struct SessionService {
    db_pool: Arc<DbPool>,
    timeout: Duration,
}

impl SessionService {
    pub fn new(db_pool: Arc<DbPool>, timeout_minutes: i64) -> Self {
        Self {
            db_pool,
            timeout: Duration::minutes(timeout_minutes),
        }
    }

    /// Returns the active session for a phone, creating a fresh IDLE
    /// session if none exists and resetting one that has expired.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, phone: &str) -> Result<session::Model, ServiceError> {
        let existing = self.find_by_phone(phone).await?;

        match existing {
            Some(model) if self.is_expired(&model) => {
                info!(phone = %phone, "Session expired, resetting to IDLE");
                self.reset_model(model).await
            }
            Some(model) => self.touch(model).await,
            None => {
                debug!(phone = %phone, "Creating new session");
                let now = Utc::now();
                let model = session::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    phone: Set(phone.to_string()),
                    state: Set(ConversationState::Idle.to_string()),
                    draft_order_id: Set(None),
                    temp_file_url: Set(None),
                    temp_file_name: Set(None),
                    temp_file_media_id: Set(None),
                    temp_print_type: Set(None),
                    last_activity: Set(now),
                    created_at: Set(now),
                };
                model.insert(&*self.db_pool).await.map_err(|e| {
                    error!("Failed to create session: {}", e);
                    ServiceError::DatabaseError(e)
                })
            }
        }
    }

    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<session::Model>, ServiceError> {
        Session::find()
            .filter(session::Column::Phone.eq(phone))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Records a received document and advances to AWAITING_PRINT_TYPE.
    /// Any previously linked draft order is unlinked, so a new upload
    /// always starts a fresh order.
    #[instrument(skip(self, file_url))]
    pub async fn store_temp_file(
        &self,
        model: session::Model,
        file_url: &str,
        file_name: &str,
        media_id: Option<&str>,
    ) -> Result<session::Model, ServiceError> {
        let mut active: session::ActiveModel = model.into();
        active.draft_order_id = Set(None);
        active.temp_file_url = Set(Some(file_url.to_string()));
        active.temp_file_name = Set(Some(file_name.to_string()));
        active.temp_file_media_id = Set(media_id.map(str::to_string));
        active.temp_print_type = Set(None);
        active.state = Set(ConversationState::AwaitingPrintType.to_string());
        active.last_activity = Set(Utc::now());
        active.update(&*self.db_pool).await.map_err(Into::into)
    }

    /// Records the chosen print type and advances to AWAITING_COPIES.
    #[instrument(skip(self))]
    pub async fn store_print_type(
        &self,
        model: session::Model,
        print_type: &str,
    ) -> Result<session::Model, ServiceError> {
        let mut active: session::ActiveModel = model.into();
        active.temp_print_type = Set(Some(print_type.to_string()));
        active.state = Set(ConversationState::AwaitingCopies.to_string());
        active.last_activity = Set(Utc::now());
        active.update(&*self.db_pool).await.map_err(Into::into)
    }

    /// Attaches the finalized draft order and advances to AWAITING_PAYMENT.
    #[instrument(skip(self))]
    pub async fn link_draft_order(
        &self,
        model: session::Model,
        order_id: Uuid,
    ) -> Result<session::Model, ServiceError> {
        let mut active: session::ActiveModel = model.into();
        active.draft_order_id = Set(Some(order_id));
        active.state = Set(ConversationState::AwaitingPayment.to_string());
        active.last_activity = Set(Utc::now());
        active.update(&*self.db_pool).await.map_err(Into::into)
    }

    /// Moves an IDLE session to AWAITING_FILE after the greeting.
    #[instrument(skip(self))]
    pub async fn store_state_awaiting_file(
        &self,
        model: session::Model,
    ) -> Result<session::Model, ServiceError> {
        let mut active: session::ActiveModel = model.into();
        active.state = Set(ConversationState::AwaitingFile.to_string());
        active.last_activity = Set(Utc::now());
        active.update(&*self.db_pool).await.map_err(Into::into)
    }

    /// Returns the session to IDLE, discarding every temporary selection.
    /// Used after payment completes, on cancel, and on expiry.
    #[instrument(skip(self))]
    pub async fn reset(&self, phone: &str) -> Result<Option<session::Model>, ServiceError> {
        match self.find_by_phone(phone).await? {
            Some(model) => Ok(Some(self.reset_model(model).await?)),
            None => Ok(None),
        }
    }

    pub fn state_of(&self, model: &session::Model) -> ConversationState {
        ConversationState::from_str(&model.state).unwrap_or(ConversationState::Idle)
    }

    fn is_expired(&self, model: &session::Model) -> bool {
        Utc::now() - model.last_activity > self.timeout
    }

    async fn touch(&self, model: session::Model) -> Result<session::Model, ServiceError> {
        let mut active: session::ActiveModel = model.into();
        active.last_activity = Set(Utc::now());
        active.update(&*self.db_pool).await.map_err(Into::into)
    }

    async fn reset_model(&self, model: session::Model) -> Result<session::Model, ServiceError> {
        let mut active: session::ActiveModel = model.into();
        active.state = Set(ConversationState::Idle.to_string());
        active.draft_order_id = Set(None);
        active.temp_file_url = Set(None);
        active.temp_file_name = Set(None);
        active.temp_file_media_id = Set(None);
        active.temp_print_type = Set(None);
        active.last_activity = Set(Utc::now());
        active.update(&*self.db_pool).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DatabaseConnection;

    fn service(timeout_minutes: i64) -> SessionService {
        SessionService::new(
            Arc::new(DatabaseConnection::Disconnected),
            timeout_minutes,
        )
    }

    fn model_with_activity(minutes_ago: i64) -> session::Model {
        let now = Utc::now();
        session::Model {
            id: Uuid::new_v4(),
            phone: "+15550001111".into(),
            state: ConversationState::AwaitingCopies.to_string(),
            draft_order_id: None,
            temp_file_url: None,
            temp_file_name: None,
            temp_file_media_id: None,
            temp_print_type: None,
            last_activity: now - Duration::minutes(minutes_ago),
            created_at: now,
        }
    }

    #[test]
    fn expiry_respects_timeout() {
        let svc = service(30);
        assert!(!svc.is_expired(&model_with_activity(29)));
        assert!(svc.is_expired(&model_with_activity(31)));
    }

    #[test]
    fn unknown_state_string_falls_back_to_idle() {
        let svc = service(30);
        let mut model = model_with_activity(0);
        model.state = "BOGUS".into();
        assert_eq!(svc.state_of(&model), ConversationState::Idle);
    }
}
