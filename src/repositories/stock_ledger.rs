//! Per-branch stock ledger.
//!
//! The only code that writes `stocks` rows. Decrements are guarded
//! conditional updates, so a quantity can never go below zero no matter how
//! many writers race on the same (variant, branch) pair.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::db::UnitOfWork;
use crate::entities::stock::{self, Entity as Stock};
use crate::errors::{is_unique_violation, ServiceError};

/// Quantity of a ledger row before and after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityChange {
    pub previous: i32,
    pub current: i32,
}

impl QuantityChange {
    pub fn difference(&self) -> i32 {
        self.current - self.previous
    }
}

pub(crate) fn not_found(variant_id: Uuid, branch_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!(
        "No stock for variant {} at branch {}",
        variant_id, branch_id
    ))
}

fn pair_filter(variant_id: Uuid, branch_id: Uuid) -> sea_orm::Condition {
    sea_orm::Condition::all()
        .add(stock::Column::VariantId.eq(variant_id))
        .add(stock::Column::BranchId.eq(branch_id))
}

pub async fn find<C: ConnectionTrait>(
    db: &C,
    variant_id: Uuid,
    branch_id: Uuid,
) -> Result<Option<stock::Model>, ServiceError> {
    Stock::find()
        .filter(pair_filter(variant_id, branch_id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

/// Current quantity, or `NotFound` when the pair was never allocated.
pub async fn get_quantity<C: ConnectionTrait>(
    db: &C,
    variant_id: Uuid,
    branch_id: Uuid,
) -> Result<i32, ServiceError> {
    find(db, variant_id, branch_id)
        .await?
        .map(|row| row.quantity)
        .ok_or_else(|| not_found(variant_id, branch_id))
}

pub async fn list_for_branch<C: ConnectionTrait>(
    db: &C,
    branch_id: Uuid,
) -> Result<Vec<stock::Model>, ServiceError> {
    Stock::find()
        .filter(stock::Column::BranchId.eq(branch_id))
        .order_by_asc(stock::Column::VariantId)
        .all(db)
        .await
        .map_err(ServiceError::db_error)
}

/// Rows for any of `variant_ids`, optionally narrowed to one branch.
pub async fn list_for_variants<C: ConnectionTrait>(
    db: &C,
    variant_ids: &[Uuid],
    branch_id: Option<Uuid>,
) -> Result<Vec<stock::Model>, ServiceError> {
    if variant_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = Stock::find().filter(stock::Column::VariantId.is_in(variant_ids.to_vec()));
    if let Some(branch_id) = branch_id {
        query = query.filter(stock::Column::BranchId.eq(branch_id));
    }
    query.all(db).await.map_err(ServiceError::db_error)
}

/// Claims the pair for writing before reading it.
///
/// The no-op update is the first write of the transaction, so SQLite takes
/// its write lock here and a concurrent writer waits on the busy timeout
/// instead of failing a later lock upgrade. On Postgres it row-locks the pair.
async fn lock_row(
    uow: &UnitOfWork,
    variant_id: Uuid,
    branch_id: Uuid,
) -> Result<Option<stock::Model>, ServiceError> {
    Stock::update_many()
        .col_expr(stock::Column::Version, Expr::col(stock::Column::Version).into())
        .filter(pair_filter(variant_id, branch_id))
        .exec(&**uow)
        .await
        .map_err(ServiceError::db_error)?;

    Stock::find()
        .filter(pair_filter(variant_id, branch_id))
        .lock_exclusive()
        .one(&**uow)
        .await
        .map_err(ServiceError::db_error)
}

/// Locks the rows of one variant at two branches, always in ascending branch
/// order, and returns them in argument order. Missing rows come back as `None`.
pub async fn lock_pair(
    uow: &UnitOfWork,
    variant_id: Uuid,
    first_branch: Uuid,
    second_branch: Uuid,
) -> Result<(Option<stock::Model>, Option<stock::Model>), ServiceError> {
    if first_branch <= second_branch {
        let first = lock_row(uow, variant_id, first_branch).await?;
        let second = lock_row(uow, variant_id, second_branch).await?;
        Ok((first, second))
    } else {
        let second = lock_row(uow, variant_id, second_branch).await?;
        let first = lock_row(uow, variant_id, first_branch).await?;
        Ok((first, second))
    }
}

/// Adds `delta` (which may be negative) to the pair's quantity.
///
/// Fails with `InsufficientStock` when the result would be negative and with
/// `NotFound` when the pair has no ledger row. Nothing is written on failure.
pub async fn apply_delta(
    uow: &UnitOfWork,
    variant_id: Uuid,
    branch_id: Uuid,
    delta: i32,
) -> Result<QuantityChange, ServiceError> {
    let mut update = Stock::update_many()
        .col_expr(
            stock::Column::Quantity,
            Expr::col(stock::Column::Quantity).add(delta),
        )
        .col_expr(
            stock::Column::Version,
            Expr::col(stock::Column::Version).add(1),
        )
        .col_expr(stock::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(pair_filter(variant_id, branch_id));

    if delta < 0 {
        update = update.filter(stock::Column::Quantity.gte(delta.saturating_neg()));
    }

    let result = update
        .exec(&**uow)
        .await
        .map_err(ServiceError::db_error)?;

    let row = find(&**uow, variant_id, branch_id)
        .await?
        .ok_or_else(|| not_found(variant_id, branch_id))?;

    if result.rows_affected == 0 {
        return Err(ServiceError::insufficient_stock(
            variant_id,
            branch_id,
            row.quantity,
            delta.saturating_neg(),
        ));
    }

    let change = QuantityChange {
        previous: row.quantity - delta,
        current: row.quantity,
    };
    debug!(
        variant_id = %variant_id,
        branch_id = %branch_id,
        previous = change.previous,
        current = change.current,
        version = row.version,
        "Applied stock delta"
    );
    Ok(change)
}

/// Overwrites the pair's quantity and returns the value it replaced.
pub async fn set_quantity(
    uow: &UnitOfWork,
    variant_id: Uuid,
    branch_id: Uuid,
    new_quantity: i32,
) -> Result<QuantityChange, ServiceError> {
    if new_quantity < 0 {
        return Err(ServiceError::ValidationError(format!(
            "Quantity cannot be negative (got {})",
            new_quantity
        )));
    }

    let row = lock_row(uow, variant_id, branch_id)
        .await?
        .ok_or_else(|| not_found(variant_id, branch_id))?;

    Stock::update_many()
        .col_expr(stock::Column::Quantity, Expr::value(new_quantity))
        .col_expr(
            stock::Column::Version,
            Expr::col(stock::Column::Version).add(1),
        )
        .col_expr(stock::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(stock::Column::Id.eq(row.id))
        .exec(&**uow)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(QuantityChange {
        previous: row.quantity,
        current: new_quantity,
    })
}

/// Creates a zero-quantity row for the pair if none exists. Returns the row
/// and whether it was created by this call.
pub async fn ensure_exists(
    uow: &UnitOfWork,
    variant_id: Uuid,
    branch_id: Uuid,
    initial_price: Decimal,
) -> Result<(stock::Model, bool), ServiceError> {
    if let Some(existing) = lock_row(uow, variant_id, branch_id).await? {
        return Ok((existing, false));
    }

    let now = Utc::now();
    let row = stock::ActiveModel {
        id: Set(Uuid::new_v4()),
        variant_id: Set(variant_id),
        branch_id: Set(branch_id),
        quantity: Set(0),
        unit_price: Set(initial_price),
        version: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
    };

    // A concurrent allocation of the same pair loses the unique index race;
    // the savepoint keeps that failure from aborting the outer transaction.
    let savepoint = uow.savepoint().await?;
    match row.insert(&savepoint).await {
        Ok(created) => {
            savepoint.commit().await.map_err(ServiceError::db_error)?;
            debug!(variant_id = %variant_id, branch_id = %branch_id, "Allocated stock row");
            Ok((created, true))
        }
        Err(e) if is_unique_violation(&e) => {
            savepoint.rollback().await.map_err(ServiceError::db_error)?;
            let existing = find(&**uow, variant_id, branch_id)
                .await?
                .ok_or_else(|| not_found(variant_id, branch_id))?;
            Ok((existing, false))
        }
        Err(e) => Err(ServiceError::db_error(e)),
    }
}
