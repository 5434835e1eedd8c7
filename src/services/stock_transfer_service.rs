use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{Actor, TransferPolicy},
    config::AppConfig,
    db::{DbPool, UnitOfWork},
    entities::stock_transfer::{self, TransferStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    repositories::{
        stock_ledger::{self, QuantityChange},
        transfer_repository::{self, NewTransfer, TransferFilter},
    },
    services::{
        stock_alert_service::publish_low_stock,
        transfer_code::{RandomTransferCode, TransferCodeGenerator},
    },
};

const MAX_NOTES_LEN: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTransferCommand {
    pub variant_id: Uuid,
    pub from_branch_id: Uuid,
    pub to_branch_id: Uuid,
    #[validate(range(min = 1, message = "Transfer quantity must be at least 1"))]
    pub quantity: i32,
    pub requested_by: Actor,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Transfer code format and retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSettings {
    pub code_prefix: String,
    pub max_code_attempts: u32,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            code_prefix: "TRF".to_string(),
            max_code_attempts: 5,
        }
    }
}

impl From<&AppConfig> for TransferSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            code_prefix: cfg.transfer_code_prefix.clone(),
            max_code_attempts: cfg.transfer_code_max_attempts,
        }
    }
}

/// Both ledger legs of a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Movement {
    source: QuantityChange,
    destination: QuantityChange,
}

/// Inter-branch transfers: PENDING until approved or rejected, or COMPLETED
/// immediately when requested by an elevated role.
pub struct StockTransferService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    policy: Arc<dyn TransferPolicy>,
    code_generator: Arc<dyn TransferCodeGenerator>,
    settings: TransferSettings,
}

impl StockTransferService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        policy: Arc<dyn TransferPolicy>,
        settings: TransferSettings,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            policy,
            code_generator: Arc::new(RandomTransferCode),
            settings,
        }
    }

    /// Replaces the default random code generator.
    pub fn with_code_generator(mut self, generator: Arc<dyn TransferCodeGenerator>) -> Self {
        self.code_generator = generator;
        self
    }

    /// Requests a transfer. Elevated requesters complete it in the same
    /// transaction; everyone else leaves it PENDING with no ledger effect.
    #[instrument(skip(self, command), fields(variant_id = %command.variant_id, from = %command.from_branch_id, to = %command.to_branch_id))]
    pub async fn create_transfer(
        &self,
        command: CreateTransferCommand,
    ) -> Result<stock_transfer::Model, ServiceError> {
        let result = self.try_create_transfer(command).await;
        if let Err(e) = &result {
            metrics::record_failure("create_transfer", e);
            warn!(error = %e, "Transfer request rejected");
        }
        result
    }

    async fn try_create_transfer(
        &self,
        command: CreateTransferCommand,
    ) -> Result<stock_transfer::Model, ServiceError> {
        command.validate()?;
        if command.from_branch_id == command.to_branch_id {
            return Err(ServiceError::ValidationError(
                "Source and destination branches must differ".to_string(),
            ));
        }

        let available = stock_ledger::get_quantity(
            &*self.db_pool,
            command.variant_id,
            command.from_branch_id,
        )
        .await?;
        if available < command.quantity {
            return Err(ServiceError::insufficient_stock(
                command.variant_id,
                command.from_branch_id,
                available,
                command.quantity,
            ));
        }

        let auto_approve = self.policy.can_auto_approve(&command.requested_by.role);

        let uow = UnitOfWork::begin(&*self.db_pool).await?;
        let result = self.insert_transfer(&uow, &command, auto_approve).await;
        let (transfer, movement) = uow.finish(result).await?;

        metrics::record_transfer(transfer.status);
        info!(
            transfer_id = %transfer.id,
            code = %transfer.code,
            status = %transfer.status,
            quantity = transfer.quantity,
            "Transfer created"
        );

        if let Some(movement) = movement {
            self.publish_movement(&transfer, movement).await;
        }
        Ok(transfer)
    }

    async fn insert_transfer(
        &self,
        uow: &UnitOfWork,
        command: &CreateTransferCommand,
        auto_approve: bool,
    ) -> Result<(stock_transfer::Model, Option<Movement>), ServiceError> {
        let movement = if auto_approve {
            Some(
                move_stock(
                    uow,
                    command.variant_id,
                    command.from_branch_id,
                    command.to_branch_id,
                    command.quantity,
                )
                .await?,
            )
        } else {
            None
        };

        let new = NewTransfer {
            variant_id: command.variant_id,
            from_branch_id: command.from_branch_id,
            to_branch_id: command.to_branch_id,
            quantity: command.quantity,
            status: if auto_approve {
                TransferStatus::Completed
            } else {
                TransferStatus::Pending
            },
            requested_by: command.requested_by.id,
            resolved_by: auto_approve.then_some(command.requested_by.id),
            notes: command.notes.clone(),
        };

        let transfer = transfer_repository::insert_with_unique_code(
            uow,
            new,
            self.code_generator.as_ref(),
            &self.settings.code_prefix,
            self.settings.max_code_attempts,
        )
        .await?;

        Ok((transfer, movement))
    }

    /// Completes a PENDING transfer, moving the stock. If the source no longer
    /// holds enough units the transfer stays PENDING.
    #[instrument(skip(self, approver), fields(approver_id = %approver.id, role = %approver.role))]
    pub async fn approve_transfer(
        &self,
        transfer_id: Uuid,
        approver: &Actor,
    ) -> Result<stock_transfer::Model, ServiceError> {
        let result = self.try_approve_transfer(transfer_id, approver).await;
        if let Err(e) = &result {
            metrics::record_failure("approve_transfer", e);
            warn!(error = %e, "Transfer approval rejected");
        }
        result
    }

    async fn try_approve_transfer(
        &self,
        transfer_id: Uuid,
        approver: &Actor,
    ) -> Result<stock_transfer::Model, ServiceError> {
        if !self.policy.can_approve(&approver.role) {
            return Err(ServiceError::Forbidden(format!(
                "Role '{}' cannot approve transfers",
                approver.role
            )));
        }

        let uow = UnitOfWork::begin(&*self.db_pool).await?;
        let result = complete_pending(&uow, transfer_id, approver.id).await;
        let (transfer, movement) = uow.finish(result).await?;

        metrics::record_transfer(TransferStatus::Completed);
        info!(transfer_id = %transfer.id, code = %transfer.code, "Transfer approved");

        self.publish_movement(&transfer, movement).await;
        Ok(transfer)
    }

    /// Cancels a PENDING transfer. Elevated roles may cancel any request;
    /// other actors only their own.
    #[instrument(skip(self, actor, reason), fields(actor_id = %actor.id, role = %actor.role))]
    pub async fn reject_transfer(
        &self,
        transfer_id: Uuid,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<stock_transfer::Model, ServiceError> {
        let result = self.try_reject_transfer(transfer_id, actor, reason).await;
        if let Err(e) = &result {
            metrics::record_failure("reject_transfer", e);
            warn!(error = %e, "Transfer rejection refused");
        }
        result
    }

    async fn try_reject_transfer(
        &self,
        transfer_id: Uuid,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<stock_transfer::Model, ServiceError> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if reason.as_ref().map_or(false, |r| r.len() > MAX_NOTES_LEN) {
            return Err(ServiceError::ValidationError(format!(
                "Rejection reason must be at most {} characters",
                MAX_NOTES_LEN
            )));
        }

        let can_cancel_others = self.policy.can_cancel_others(&actor.role);

        let uow = UnitOfWork::begin(&*self.db_pool).await?;
        let result = cancel_pending(
            &uow,
            transfer_id,
            actor,
            can_cancel_others,
            reason.as_deref(),
        )
        .await;
        let transfer = uow.finish(result).await?;

        metrics::record_transfer(TransferStatus::Cancelled);
        info!(transfer_id = %transfer.id, code = %transfer.code, "Transfer rejected");

        self.event_sender
            .publish(Event::TransferCancelled {
                transfer_id: transfer.id,
                code: transfer.code.clone(),
                cancelled_by: actor.id,
                reason,
            })
            .await;
        Ok(transfer)
    }

    pub async fn get_transfer(
        &self,
        transfer_id: Uuid,
    ) -> Result<stock_transfer::Model, ServiceError> {
        transfer_repository::find_by_id(&*self.db_pool, transfer_id)
            .await?
            .ok_or_else(|| transfer_not_found(transfer_id))
    }

    pub async fn get_transfer_by_code(
        &self,
        code: &str,
    ) -> Result<stock_transfer::Model, ServiceError> {
        transfer_repository::find_by_code(&*self.db_pool, code)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Transfer {} not found", code)))
    }

    /// Transfers matching `filter`, newest first.
    pub async fn list_transfers(
        &self,
        filter: TransferFilter,
    ) -> Result<Vec<stock_transfer::Model>, ServiceError> {
        transfer_repository::list(&*self.db_pool, &filter).await
    }

    async fn publish_movement(&self, transfer: &stock_transfer::Model, movement: Movement) {
        self.event_sender
            .publish(Event::StockTransferred {
                transfer_id: transfer.id,
                code: transfer.code.clone(),
                variant_id: transfer.variant_id,
                from_branch_id: transfer.from_branch_id,
                to_branch_id: transfer.to_branch_id,
                quantity: transfer.quantity,
                source_quantity: movement.source.current,
                destination_quantity: movement.destination.current,
            })
            .await;

        publish_low_stock(
            &self.db_pool,
            &self.event_sender,
            &[
                (transfer.variant_id, transfer.from_branch_id),
                (transfer.variant_id, transfer.to_branch_id),
            ],
        )
        .await;
    }
}

fn transfer_not_found(transfer_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Transfer {} not found", transfer_id))
}

fn require_pending(transfer: &stock_transfer::Model) -> Result<(), ServiceError> {
    if transfer.status == TransferStatus::Pending {
        Ok(())
    } else {
        Err(ServiceError::InvalidState {
            transfer_id: transfer.id,
            current: transfer.status,
            expected: TransferStatus::Pending,
        })
    }
}

/// Reports the state that beat us to a guarded status update.
async fn lost_race(uow: &UnitOfWork, transfer_id: Uuid) -> ServiceError {
    match transfer_repository::find_by_id(&**uow, transfer_id).await {
        Ok(Some(current)) => ServiceError::InvalidState {
            transfer_id,
            current: current.status,
            expected: TransferStatus::Pending,
        },
        Ok(None) => transfer_not_found(transfer_id),
        Err(e) => e,
    }
}

/// Debits the source and credits the destination, creating the destination
/// row at the source's unit price when the branch never held the variant.
async fn move_stock(
    uow: &UnitOfWork,
    variant_id: Uuid,
    from_branch_id: Uuid,
    to_branch_id: Uuid,
    quantity: i32,
) -> Result<Movement, ServiceError> {
    let (source_row, destination_row) =
        stock_ledger::lock_pair(uow, variant_id, from_branch_id, to_branch_id).await?;
    let source_row =
        source_row.ok_or_else(|| stock_ledger::not_found(variant_id, from_branch_id))?;

    let source = stock_ledger::apply_delta(uow, variant_id, from_branch_id, -quantity).await?;
    if destination_row.is_none() {
        stock_ledger::ensure_exists(uow, variant_id, to_branch_id, source_row.unit_price).await?;
    }
    let destination = stock_ledger::apply_delta(uow, variant_id, to_branch_id, quantity).await?;

    Ok(Movement {
        source,
        destination,
    })
}

async fn complete_pending(
    uow: &UnitOfWork,
    transfer_id: Uuid,
    approver_id: Uuid,
) -> Result<(stock_transfer::Model, Movement), ServiceError> {
    let transfer = transfer_repository::lock_by_id(uow, transfer_id)
        .await?
        .ok_or_else(|| transfer_not_found(transfer_id))?;
    require_pending(&transfer)?;

    let claimed = transfer_repository::resolve_pending(
        uow,
        transfer_id,
        TransferStatus::Completed,
        approver_id,
        None,
    )
    .await?;
    if !claimed {
        return Err(lost_race(uow, transfer_id).await);
    }

    let movement = move_stock(
        uow,
        transfer.variant_id,
        transfer.from_branch_id,
        transfer.to_branch_id,
        transfer.quantity,
    )
    .await?;

    let completed = transfer_repository::find_by_id(&**uow, transfer_id)
        .await?
        .ok_or_else(|| transfer_not_found(transfer_id))?;
    Ok((completed, movement))
}

async fn cancel_pending(
    uow: &UnitOfWork,
    transfer_id: Uuid,
    actor: &Actor,
    can_cancel_others: bool,
    reason: Option<&str>,
) -> Result<stock_transfer::Model, ServiceError> {
    let transfer = transfer_repository::lock_by_id(uow, transfer_id)
        .await?
        .ok_or_else(|| transfer_not_found(transfer_id))?;

    if !can_cancel_others && transfer.requested_by != actor.id {
        return Err(ServiceError::Forbidden(format!(
            "Role '{}' can only cancel its own transfer requests",
            actor.role
        )));
    }
    require_pending(&transfer)?;

    let notes = reason.map(|reason| append_rejection(transfer.notes.as_deref(), reason));
    let claimed = transfer_repository::resolve_pending(
        uow,
        transfer_id,
        TransferStatus::Cancelled,
        actor.id,
        notes,
    )
    .await?;
    if !claimed {
        return Err(lost_race(uow, transfer_id).await);
    }

    transfer_repository::find_by_id(&**uow, transfer_id)
        .await?
        .ok_or_else(|| transfer_not_found(transfer_id))
}

fn append_rejection(existing: Option<&str>, reason: &str) -> String {
    match existing.map(str::trim).filter(|n| !n.is_empty()) {
        Some(notes) => format!("{}\nRejected: {}", notes, reason),
        None => format!("Rejected: {}", reason),
    }
}
