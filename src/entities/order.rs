use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One print request. Never deleted; the row doubles as an audit trail.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub customer_phone: String,

    pub file_name: Option<String>,
    pub file_url: Option<String>,
    pub file_hash: Option<String>,
    pub page_count: i32,

    pub print_type: Option<String>,
    pub copies: i32,
    pub amount: Decimal,

    pub status: String,

    /// Join key between the provider's payment confirmation and this order.
    #[sea_orm(unique)]
    pub payment_link_id: Option<String>,
    pub payment_link_url: Option<String>,

    pub shop_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::payment::Entity")]
    Payment,
    #[sea_orm(has_one = "super::print_job::Entity")]
    PrintJob,
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

impl Related<super::print_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PrintJob.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
