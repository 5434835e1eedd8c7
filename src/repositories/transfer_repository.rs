use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::db::UnitOfWork;
use crate::entities::stock_transfer::{self, Entity as StockTransfer, TransferStatus};
use crate::errors::{is_unique_violation, ServiceError};
use crate::services::transfer_code::TransferCodeGenerator;

#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub variant_id: Uuid,
    pub from_branch_id: Uuid,
    pub to_branch_id: Uuid,
    pub quantity: i32,
    pub status: TransferStatus,
    pub requested_by: Uuid,
    pub resolved_by: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferFilter {
    /// Matches transfers leaving or entering this branch
    pub branch_id: Option<Uuid>,
    pub variant_id: Option<Uuid>,
    pub status: Option<TransferStatus>,
    pub limit: Option<u64>,
}

/// Inserts the transfer under a freshly generated code, retrying with a new
/// code whenever the candidate collides with an existing one.
pub async fn insert_with_unique_code(
    uow: &UnitOfWork,
    new: NewTransfer,
    codes: &dyn TransferCodeGenerator,
    prefix: &str,
    max_attempts: u32,
) -> Result<stock_transfer::Model, ServiceError> {
    let now = Utc::now();
    let id = Uuid::new_v4();

    for attempt in 1..=max_attempts {
        let code = codes.generate(prefix, now.date_naive());
        let row = stock_transfer::ActiveModel {
            id: Set(id),
            code: Set(code.clone()),
            variant_id: Set(new.variant_id),
            from_branch_id: Set(new.from_branch_id),
            to_branch_id: Set(new.to_branch_id),
            quantity: Set(new.quantity),
            status: Set(new.status),
            requested_by: Set(new.requested_by),
            resolved_by: Set(new.resolved_by),
            resolved_at: Set(new.resolved_by.map(|_| now)),
            notes: Set(new.notes.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let savepoint = uow.savepoint().await?;
        match row.insert(&savepoint).await {
            Ok(created) => {
                savepoint.commit().await.map_err(ServiceError::db_error)?;
                return Ok(created);
            }
            Err(e) if is_unique_violation(&e) => {
                savepoint.rollback().await.map_err(ServiceError::db_error)?;
                warn!(code = %code, attempt, "Transfer code collision, retrying");
            }
            Err(e) => return Err(ServiceError::db_error(e)),
        }
    }

    Err(ServiceError::Conflict(format!(
        "Could not allocate a unique transfer code after {} attempts",
        max_attempts
    )))
}

pub async fn find_by_id<C: ConnectionTrait>(
    db: &C,
    transfer_id: Uuid,
) -> Result<Option<stock_transfer::Model>, ServiceError> {
    StockTransfer::find_by_id(transfer_id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

/// Claims the transfer row for writing, then reads it. Resolution paths call
/// this first so that the transaction's opening statement is a write.
pub async fn lock_by_id(
    uow: &UnitOfWork,
    transfer_id: Uuid,
) -> Result<Option<stock_transfer::Model>, ServiceError> {
    StockTransfer::update_many()
        .col_expr(
            stock_transfer::Column::UpdatedAt,
            Expr::col(stock_transfer::Column::UpdatedAt).into(),
        )
        .filter(stock_transfer::Column::Id.eq(transfer_id))
        .exec(&**uow)
        .await
        .map_err(ServiceError::db_error)?;

    StockTransfer::find_by_id(transfer_id)
        .lock_exclusive()
        .one(&**uow)
        .await
        .map_err(ServiceError::db_error)
}

pub async fn find_by_code<C: ConnectionTrait>(
    db: &C,
    code: &str,
) -> Result<Option<stock_transfer::Model>, ServiceError> {
    StockTransfer::find()
        .filter(stock_transfer::Column::Code.eq(code))
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

/// Moves a PENDING transfer to `status`. Returns false when the transfer was
/// no longer pending, in which case nothing is written.
pub async fn resolve_pending(
    uow: &UnitOfWork,
    transfer_id: Uuid,
    status: TransferStatus,
    resolved_by: Uuid,
    notes: Option<String>,
) -> Result<bool, ServiceError> {
    let now: DateTime<Utc> = Utc::now();
    let mut update = StockTransfer::update_many()
        .col_expr(stock_transfer::Column::Status, Expr::value(status))
        .col_expr(stock_transfer::Column::ResolvedBy, Expr::value(resolved_by))
        .col_expr(stock_transfer::Column::ResolvedAt, Expr::value(now))
        .col_expr(stock_transfer::Column::UpdatedAt, Expr::value(now));

    if let Some(notes) = notes {
        update = update.col_expr(stock_transfer::Column::Notes, Expr::value(notes));
    }

    let result = update
        .filter(stock_transfer::Column::Id.eq(transfer_id))
        .filter(stock_transfer::Column::Status.eq(TransferStatus::Pending))
        .exec(&**uow)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(result.rows_affected == 1)
}

/// Transfers matching `filter`, newest first.
pub async fn list<C: ConnectionTrait>(
    db: &C,
    filter: &TransferFilter,
) -> Result<Vec<stock_transfer::Model>, ServiceError> {
    let mut query = StockTransfer::find();
    if let Some(branch_id) = filter.branch_id {
        query = query.filter(
            Condition::any()
                .add(stock_transfer::Column::FromBranchId.eq(branch_id))
                .add(stock_transfer::Column::ToBranchId.eq(branch_id)),
        );
    }
    if let Some(variant_id) = filter.variant_id {
        query = query.filter(stock_transfer::Column::VariantId.eq(variant_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(stock_transfer::Column::Status.eq(status));
    }
    if let Some(limit) = filter.limit {
        query = query.limit(limit);
    }

    query
        .order_by_desc(stock_transfer::Column::CreatedAt)
        .all(db)
        .await
        .map_err(ServiceError::db_error)
}
