use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{DbPool, UnitOfWork},
    entities::{stock, stock_alert},
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{alert_repository, stock_ledger},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SetAlertCommand {
    pub variant_id: Uuid,
    pub branch_id: Uuid,
    #[validate(range(min = 0, message = "Minimum quantity cannot be negative"))]
    pub min_qty: i32,
}

/// An active threshold whose pair currently holds less than the minimum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockItem {
    pub variant_id: Uuid,
    pub branch_id: Uuid,
    pub quantity: i32,
    pub min_qty: i32,
    pub deficit: i32,
}

/// Joins thresholds with ledger rows. A pair without a ledger row counts as
/// holding zero units.
fn evaluate(alerts: &[stock_alert::Model], stocks: &[stock::Model]) -> Vec<LowStockItem> {
    let quantities: HashMap<(Uuid, Uuid), i32> = stocks
        .iter()
        .map(|row| ((row.variant_id, row.branch_id), row.quantity))
        .collect();

    alerts
        .iter()
        .filter(|alert| alert.is_active)
        .filter_map(|alert| {
            let quantity = quantities
                .get(&(alert.variant_id, alert.branch_id))
                .copied()
                .unwrap_or(0);
            (quantity < alert.min_qty).then(|| LowStockItem {
                variant_id: alert.variant_id,
                branch_id: alert.branch_id,
                quantity,
                min_qty: alert.min_qty,
                deficit: alert.min_qty - quantity,
            })
        })
        .collect()
}

async fn check_pair(
    db: &DbPool,
    variant_id: Uuid,
    branch_id: Uuid,
) -> Result<Option<LowStockItem>, ServiceError> {
    let Some(alert) = alert_repository::find(db, variant_id, branch_id).await? else {
        return Ok(None);
    };
    let stocks: Vec<stock::Model> = stock_ledger::find(db, variant_id, branch_id)
        .await?
        .into_iter()
        .collect();
    Ok(evaluate(&[alert], &stocks).into_iter().next())
}

/// Publishes `LowStockDetected` for every pair in `pairs` that is now below
/// its active threshold. Runs after commit, so failures are only logged.
pub(crate) async fn publish_low_stock(
    db: &DbPool,
    event_sender: &EventSender,
    pairs: &[(Uuid, Uuid)],
) {
    for &(variant_id, branch_id) in pairs {
        match check_pair(db, variant_id, branch_id).await {
            Ok(Some(item)) => {
                event_sender
                    .publish(Event::LowStockDetected {
                        variant_id: item.variant_id,
                        branch_id: item.branch_id,
                        quantity: item.quantity,
                        min_qty: item.min_qty,
                    })
                    .await;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(variant_id = %variant_id, branch_id = %branch_id, error = %e, "Low stock check failed");
            }
        }
    }
}

pub struct StockAlertService {
    db_pool: Arc<DbPool>,
}

impl StockAlertService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Creates or replaces the low-stock threshold for a pair and activates it.
    #[instrument(skip(self))]
    pub async fn set_alert(
        &self,
        command: SetAlertCommand,
    ) -> Result<stock_alert::Model, ServiceError> {
        command.validate()?;

        let uow = UnitOfWork::begin(&*self.db_pool).await?;
        let result =
            alert_repository::upsert(&uow, command.variant_id, command.branch_id, command.min_qty)
                .await;
        let alert = uow.finish(result).await?;

        info!(
            variant_id = %alert.variant_id,
            branch_id = %alert.branch_id,
            min_qty = alert.min_qty,
            "Stock alert set"
        );
        Ok(alert)
    }

    /// Deactivates the pair's threshold; the row is kept.
    #[instrument(skip(self))]
    pub async fn deactivate_alert(
        &self,
        variant_id: Uuid,
        branch_id: Uuid,
    ) -> Result<stock_alert::Model, ServiceError> {
        let uow = UnitOfWork::begin(&*self.db_pool).await?;
        let result = alert_repository::deactivate(&uow, variant_id, branch_id)
            .await
            .and_then(|alert| {
                alert.ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "No stock alert for variant {} at branch {}",
                        variant_id, branch_id
                    ))
                })
            });
        let alert = uow.finish(result).await?;

        info!(variant_id = %variant_id, branch_id = %branch_id, "Stock alert deactivated");
        Ok(alert)
    }

    /// Active thresholds, optionally limited to one branch.
    pub async fn list_alerts(
        &self,
        branch_id: Option<Uuid>,
    ) -> Result<Vec<stock_alert::Model>, ServiceError> {
        alert_repository::list_active(&*self.db_pool, branch_id).await
    }

    /// Active thresholds that the live ledger currently falls short of.
    #[instrument(skip(self))]
    pub async fn list_low_stock(
        &self,
        branch_id: Option<Uuid>,
    ) -> Result<Vec<LowStockItem>, ServiceError> {
        let db = self.db_pool.as_ref();
        let alerts = alert_repository::list_active(db, branch_id).await?;

        let mut variant_ids: Vec<Uuid> = alerts.iter().map(|a| a.variant_id).collect();
        variant_ids.sort();
        variant_ids.dedup();
        let stocks = stock_ledger::list_for_variants(db, &variant_ids, branch_id).await?;

        Ok(evaluate(&alerts, &stocks))
    }
}
