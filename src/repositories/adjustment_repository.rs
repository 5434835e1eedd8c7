use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::UnitOfWork;
use crate::entities::stock_adjustment::{self, AdjustmentReason, Entity as StockAdjustment};
use crate::errors::ServiceError;
use crate::repositories::stock_ledger::QuantityChange;

/// Audit entry about to be written alongside its ledger change.
#[derive(Debug, Clone)]
pub struct NewAdjustment {
    pub variant_id: Uuid,
    pub branch_id: Uuid,
    pub change: QuantityChange,
    pub reason: Option<AdjustmentReason>,
    pub notes: Option<String>,
    pub actor_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdjustmentFilter {
    pub variant_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub limit: Option<u64>,
}

pub async fn insert(
    uow: &UnitOfWork,
    new: NewAdjustment,
) -> Result<stock_adjustment::Model, ServiceError> {
    stock_adjustment::ActiveModel {
        id: Set(Uuid::new_v4()),
        variant_id: Set(new.variant_id),
        branch_id: Set(new.branch_id),
        previous_qty: Set(new.change.previous),
        new_qty: Set(new.change.current),
        difference: Set(new.change.difference()),
        reason: Set(new.reason),
        notes: Set(new.notes),
        actor_id: Set(new.actor_id),
        created_at: Set(Utc::now()),
    }
    .insert(&**uow)
    .await
    .map_err(ServiceError::db_error)
}

/// Audit history, newest first.
pub async fn list<C: ConnectionTrait>(
    db: &C,
    filter: &AdjustmentFilter,
) -> Result<Vec<stock_adjustment::Model>, ServiceError> {
    let mut query = StockAdjustment::find();
    if let Some(variant_id) = filter.variant_id {
        query = query.filter(stock_adjustment::Column::VariantId.eq(variant_id));
    }
    if let Some(branch_id) = filter.branch_id {
        query = query.filter(stock_adjustment::Column::BranchId.eq(branch_id));
    }
    if let Some(limit) = filter.limit {
        query = query.limit(limit);
    }

    query
        .order_by_desc(stock_adjustment::Column::CreatedAt)
        .all(db)
        .await
        .map_err(ServiceError::db_error)
}
