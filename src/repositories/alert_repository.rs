use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::db::UnitOfWork;
use crate::entities::stock_alert::{self, Entity as StockAlert};
use crate::errors::{is_unique_violation, ServiceError};

pub async fn find<C: ConnectionTrait>(
    db: &C,
    variant_id: Uuid,
    branch_id: Uuid,
) -> Result<Option<stock_alert::Model>, ServiceError> {
    StockAlert::find()
        .filter(stock_alert::Column::VariantId.eq(variant_id))
        .filter(stock_alert::Column::BranchId.eq(branch_id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

/// Claims the pair's threshold row (present or not) for writing, then reads it.
async fn lock(
    uow: &UnitOfWork,
    variant_id: Uuid,
    branch_id: Uuid,
) -> Result<Option<stock_alert::Model>, ServiceError> {
    StockAlert::update_many()
        .col_expr(
            stock_alert::Column::UpdatedAt,
            Expr::col(stock_alert::Column::UpdatedAt).into(),
        )
        .filter(stock_alert::Column::VariantId.eq(variant_id))
        .filter(stock_alert::Column::BranchId.eq(branch_id))
        .exec(&**uow)
        .await
        .map_err(ServiceError::db_error)?;

    StockAlert::find()
        .filter(stock_alert::Column::VariantId.eq(variant_id))
        .filter(stock_alert::Column::BranchId.eq(branch_id))
        .lock_exclusive()
        .one(&**uow)
        .await
        .map_err(ServiceError::db_error)
}

async fn activate(
    uow: &UnitOfWork,
    existing: stock_alert::Model,
    min_qty: i32,
) -> Result<stock_alert::Model, ServiceError> {
    let mut active = existing.into_active_model();
    active.min_qty = Set(min_qty);
    active.is_active = Set(true);
    active.updated_at = Set(Utc::now());
    active.update(&**uow).await.map_err(ServiceError::db_error)
}

/// Creates or replaces the threshold for the pair and marks it active.
pub async fn upsert(
    uow: &UnitOfWork,
    variant_id: Uuid,
    branch_id: Uuid,
    min_qty: i32,
) -> Result<stock_alert::Model, ServiceError> {
    if let Some(existing) = lock(uow, variant_id, branch_id).await? {
        return activate(uow, existing, min_qty).await;
    }

    let now = Utc::now();
    let row = stock_alert::ActiveModel {
        id: Set(Uuid::new_v4()),
        variant_id: Set(variant_id),
        branch_id: Set(branch_id),
        min_qty: Set(min_qty),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let savepoint = uow.savepoint().await?;
    match row.insert(&savepoint).await {
        Ok(created) => {
            savepoint.commit().await.map_err(ServiceError::db_error)?;
            Ok(created)
        }
        Err(e) if is_unique_violation(&e) => {
            savepoint.rollback().await.map_err(ServiceError::db_error)?;
            let existing = find(&**uow, variant_id, branch_id).await?.ok_or_else(|| {
                ServiceError::InternalError("Alert vanished after unique violation".to_string())
            })?;
            activate(uow, existing, min_qty).await
        }
        Err(e) => Err(ServiceError::db_error(e)),
    }
}

/// Soft-deactivates the pair's threshold. `None` when no threshold exists.
pub async fn deactivate(
    uow: &UnitOfWork,
    variant_id: Uuid,
    branch_id: Uuid,
) -> Result<Option<stock_alert::Model>, ServiceError> {
    let Some(existing) = lock(uow, variant_id, branch_id).await? else {
        return Ok(None);
    };

    let mut active = existing.into_active_model();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&**uow).await.map_err(ServiceError::db_error)?;
    Ok(Some(updated))
}

pub async fn list_active<C: ConnectionTrait>(
    db: &C,
    branch_id: Option<Uuid>,
) -> Result<Vec<stock_alert::Model>, ServiceError> {
    let mut query = StockAlert::find().filter(stock_alert::Column::IsActive.eq(true));
    if let Some(branch_id) = branch_id {
        query = query.filter(stock_alert::Column::BranchId.eq(branch_id));
    }

    query
        .order_by_asc(stock_alert::Column::BranchId)
        .order_by_asc(stock_alert::Column::VariantId)
        .all(db)
        .await
        .map_err(ServiceError::db_error)
}
