// Inventory core services
pub mod inventory_adjustment_service;
pub mod stock_alert_service;
pub mod stock_transfer_service;

// Transfer code generation
pub mod transfer_code;

use std::sync::Arc;

use crate::{
    auth::{RbacTransferPolicy, TransferPolicy},
    config::AppConfig,
    db::DbPool,
    events::EventSender,
};

use inventory_adjustment_service::InventoryAdjustmentService;
use stock_alert_service::StockAlertService;
use stock_transfer_service::{StockTransferService, TransferSettings};

/// The three inventory services wired to one pool, event channel and policy.
pub struct InventoryCore {
    pub adjustments: InventoryAdjustmentService,
    pub transfers: StockTransferService,
    pub alerts: StockAlertService,
}

impl InventoryCore {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        policy: Arc<dyn TransferPolicy>,
        settings: TransferSettings,
    ) -> Self {
        Self {
            adjustments: InventoryAdjustmentService::new(db_pool.clone(), event_sender.clone()),
            transfers: StockTransferService::new(
                db_pool.clone(),
                event_sender,
                policy,
                settings,
            ),
            alerts: StockAlertService::new(db_pool),
        }
    }

    /// Builds the services with the role policy and transfer settings taken
    /// from configuration.
    pub fn from_config(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
    ) -> Self {
        Self::new(
            db_pool,
            event_sender,
            Arc::new(RbacTransferPolicy::from_config(config)),
            TransferSettings::from(config),
        )
    }
}
