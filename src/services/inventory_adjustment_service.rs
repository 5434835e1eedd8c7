use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{DbPool, UnitOfWork},
    entities::{
        stock,
        stock_adjustment::{self, AdjustmentReason},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    repositories::{
        adjustment_repository::{self, AdjustmentFilter, NewAdjustment},
        stock_ledger::{self, QuantityChange},
    },
    services::stock_alert_service::publish_low_stock,
};

/// Whether an adjustment adds units to or removes units from the ledger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AdjustmentDirection {
    Add,
    Subtract,
}

impl AdjustmentDirection {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        AdjustmentDirection::from_str(raw.trim()).map_err(|_| {
            ServiceError::ValidationError(format!(
                "Unknown adjustment direction '{}'. Allowed: add, subtract",
                raw
            ))
        })
    }

    /// Signed ledger delta for `quantity` units in this direction.
    pub fn signed(self, quantity: i32) -> i32 {
        match self {
            AdjustmentDirection::Add => quantity,
            AdjustmentDirection::Subtract => -quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateAdjustmentCommand {
    pub variant_id: Uuid,
    pub branch_id: Uuid,
    pub direction: AdjustmentDirection,
    #[validate(range(min = 1, message = "Adjustment quantity must be positive"))]
    pub quantity: i32,
    /// One of the closed reason codes, parsed case-insensitively
    #[validate(length(min = 1, max = 32))]
    pub reason_code: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub actor_id: Uuid,
}

/// Physical count replacing the ledger quantity outright.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordCountCommand {
    pub variant_id: Uuid,
    pub branch_id: Uuid,
    #[validate(range(min = 0, message = "Counted quantity cannot be negative"))]
    pub counted_quantity: i32,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub actor_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentOutcome {
    pub adjustment: stock_adjustment::Model,
    pub new_quantity: i32,
}

/// Records every non-transfer quantity change together with its audit entry.
pub struct InventoryAdjustmentService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl InventoryAdjustmentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Adds or removes units and writes the matching audit entry in the same
    /// transaction. Nothing is written when the ledger would go negative.
    #[instrument(skip(self, command), fields(variant_id = %command.variant_id, branch_id = %command.branch_id))]
    pub async fn create_adjustment(
        &self,
        command: CreateAdjustmentCommand,
    ) -> Result<AdjustmentOutcome, ServiceError> {
        let result = self.try_create_adjustment(command).await;
        if let Err(e) = &result {
            metrics::record_failure("create_adjustment", e);
            warn!(error = %e, "Stock adjustment rejected");
        }
        result
    }

    async fn try_create_adjustment(
        &self,
        command: CreateAdjustmentCommand,
    ) -> Result<AdjustmentOutcome, ServiceError> {
        command.validate()?;
        let reason = command
            .reason_code
            .as_deref()
            .map(AdjustmentReason::parse)
            .transpose()?;
        let delta = command.direction.signed(command.quantity);

        let uow = UnitOfWork::begin(&*self.db_pool).await?;
        let result = record_delta(&uow, &command, delta, reason).await;
        let adjustment = uow.finish(result).await?;

        self.after_commit(&adjustment).await;

        let new_quantity = adjustment.new_qty;
        info!(
            adjustment_id = %adjustment.id,
            direction = %command.direction,
            quantity = command.quantity,
            new_quantity,
            "Stock adjustment recorded"
        );
        Ok(AdjustmentOutcome {
            adjustment,
            new_quantity,
        })
    }

    /// Replaces the ledger quantity with a physical count. Always writes an
    /// audit entry with reason COUNT_CORRECTION, even when nothing changed.
    #[instrument(skip(self, command), fields(variant_id = %command.variant_id, branch_id = %command.branch_id))]
    pub async fn record_count(
        &self,
        command: RecordCountCommand,
    ) -> Result<AdjustmentOutcome, ServiceError> {
        let result = self.try_record_count(command).await;
        if let Err(e) = &result {
            metrics::record_failure("record_count", e);
            warn!(error = %e, "Stock count rejected");
        }
        result
    }

    async fn try_record_count(
        &self,
        command: RecordCountCommand,
    ) -> Result<AdjustmentOutcome, ServiceError> {
        command.validate()?;

        let uow = UnitOfWork::begin(&*self.db_pool).await?;
        let result = record_absolute(&uow, &command).await;
        let adjustment = uow.finish(result).await?;

        self.after_commit(&adjustment).await;

        info!(
            adjustment_id = %adjustment.id,
            previous_quantity = adjustment.previous_qty,
            counted_quantity = adjustment.new_qty,
            "Stock count recorded"
        );
        let new_quantity = adjustment.new_qty;
        Ok(AdjustmentOutcome {
            adjustment,
            new_quantity,
        })
    }

    async fn after_commit(&self, adjustment: &stock_adjustment::Model) {
        metrics::record_adjustment(adjustment.reason);

        self.event_sender
            .publish(Event::StockAdjusted {
                adjustment_id: adjustment.id,
                variant_id: adjustment.variant_id,
                branch_id: adjustment.branch_id,
                previous_quantity: adjustment.previous_qty,
                new_quantity: adjustment.new_qty,
                reason: adjustment.reason,
                actor_id: adjustment.actor_id,
            })
            .await;

        publish_low_stock(
            &self.db_pool,
            &self.event_sender,
            &[(adjustment.variant_id, adjustment.branch_id)],
        )
        .await;
    }

    /// Allocates a zero-quantity ledger row for a variant at a branch. Calling
    /// it again for the same pair returns the existing row untouched.
    #[instrument(skip(self))]
    pub async fn register_stock(
        &self,
        variant_id: Uuid,
        branch_id: Uuid,
        unit_price: Decimal,
    ) -> Result<stock::Model, ServiceError> {
        if unit_price.is_sign_negative() {
            return Err(ServiceError::ValidationError(
                "Unit price cannot be negative".to_string(),
            ));
        }

        let uow = UnitOfWork::begin(&*self.db_pool).await?;
        let result = stock_ledger::ensure_exists(&uow, variant_id, branch_id, unit_price).await;
        let (row, created) = uow.finish(result).await?;

        if created {
            info!(variant_id = %variant_id, branch_id = %branch_id, "Stock registered");
        }
        Ok(row)
    }

    pub async fn get_stock(
        &self,
        variant_id: Uuid,
        branch_id: Uuid,
    ) -> Result<stock::Model, ServiceError> {
        stock_ledger::find(&*self.db_pool, variant_id, branch_id)
            .await?
            .ok_or_else(|| stock_ledger::not_found(variant_id, branch_id))
    }

    pub async fn get_quantity(&self, variant_id: Uuid, branch_id: Uuid) -> Result<i32, ServiceError> {
        stock_ledger::get_quantity(&*self.db_pool, variant_id, branch_id).await
    }

    pub async fn list_branch_stock(&self, branch_id: Uuid) -> Result<Vec<stock::Model>, ServiceError> {
        stock_ledger::list_for_branch(&*self.db_pool, branch_id).await
    }

    /// Audit history, newest first.
    pub async fn list_adjustments(
        &self,
        filter: AdjustmentFilter,
    ) -> Result<Vec<stock_adjustment::Model>, ServiceError> {
        adjustment_repository::list(&*self.db_pool, &filter).await
    }
}

async fn record_delta(
    uow: &UnitOfWork,
    command: &CreateAdjustmentCommand,
    delta: i32,
    reason: Option<AdjustmentReason>,
) -> Result<stock_adjustment::Model, ServiceError> {
    let change =
        stock_ledger::apply_delta(uow, command.variant_id, command.branch_id, delta).await?;
    write_audit(
        uow,
        command.variant_id,
        command.branch_id,
        change,
        reason,
        command.notes.clone(),
        command.actor_id,
    )
    .await
}

async fn record_absolute(
    uow: &UnitOfWork,
    command: &RecordCountCommand,
) -> Result<stock_adjustment::Model, ServiceError> {
    let change = stock_ledger::set_quantity(
        uow,
        command.variant_id,
        command.branch_id,
        command.counted_quantity,
    )
    .await?;
    write_audit(
        uow,
        command.variant_id,
        command.branch_id,
        change,
        Some(AdjustmentReason::CountCorrection),
        command.notes.clone(),
        command.actor_id,
    )
    .await
}

async fn write_audit(
    uow: &UnitOfWork,
    variant_id: Uuid,
    branch_id: Uuid,
    change: QuantityChange,
    reason: Option<AdjustmentReason>,
    notes: Option<String>,
    actor_id: Uuid,
) -> Result<stock_adjustment::Model, ServiceError> {
    adjustment_repository::insert(
        uow,
        NewAdjustment {
            variant_id,
            branch_id,
            change,
            reason,
            notes,
            actor_id,
        },
    )
    .await
}
