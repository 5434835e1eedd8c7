/*!
 * Unit of work
 *
 * Every ledger-affecting operation runs inside exactly one `UnitOfWork`.
 * Repository mutations take it explicitly, so no write can happen outside
 * a transaction, and `finish` commits or rolls back on every exit path.
 */

use crate::errors::ServiceError;
use sea_orm::{DatabaseTransaction, TransactionTrait};
use std::ops::Deref;
use std::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// An open database transaction.
///
/// Dropping a `UnitOfWork` without calling `commit`, `rollback` or `finish`
/// rolls the transaction back.
///
/// # Example
///
/// ```rust,ignore
/// let uow = UnitOfWork::begin(&*db).await?;
/// let result = stock_ledger::apply_delta(&uow, variant_id, branch_id, -3).await;
/// let change = uow.finish(result).await?;
/// ```
pub struct UnitOfWork {
    txn: DatabaseTransaction,
    id: Uuid,
    started: Instant,
}

impl UnitOfWork {
    /// Opens a transaction on the given connection.
    pub async fn begin<C>(db: &C) -> Result<Self, ServiceError>
    where
        C: TransactionTrait,
    {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        let id = Uuid::new_v4();
        debug!(transaction_id = %id, "Starting database transaction");
        Ok(Self {
            txn,
            id,
            started: Instant::now(),
        })
    }

    /// Opens a nested transaction (a SAVEPOINT). Failing statements inside it
    /// can be rolled back without aborting the enclosing unit of work.
    pub async fn savepoint(&self) -> Result<DatabaseTransaction, ServiceError> {
        self.txn.begin().await.map_err(ServiceError::db_error)
    }

    pub async fn commit(self) -> Result<(), ServiceError> {
        let Self { txn, id, started } = self;
        txn.commit().await.map_err(|e| {
            error!(transaction_id = %id, error = %e, "Transaction commit failed");
            ServiceError::db_error(e)
        })?;
        debug!(transaction_id = %id, "Transaction committed successfully in {:?}", started.elapsed());
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), ServiceError> {
        let Self { txn, id, started } = self;
        txn.rollback().await.map_err(ServiceError::db_error)?;
        warn!(transaction_id = %id, "Transaction rolled back after {:?}", started.elapsed());
        Ok(())
    }

    /// Commits when `result` is `Ok`, rolls back otherwise, and hands the
    /// result back. A failed commit turns the result into an error; a failed
    /// rollback is logged and the original error is returned.
    pub async fn finish<T>(self, result: Result<T, ServiceError>) -> Result<T, ServiceError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                let id = self.id;
                if let Err(rollback_err) = self.rollback().await {
                    error!(transaction_id = %id, error = %rollback_err, "Transaction rollback failed");
                }
                Err(err)
            }
        }
    }
}

impl Deref for UnitOfWork {
    type Target = DatabaseTransaction;

    fn deref(&self) -> &Self::Target {
        &self.txn
    }
}
