#![allow(dead_code)]

use std::sync::Arc;

use branch_inventory::{
    auth::{Actor, RbacTransferPolicy},
    config::AppConfig,
    db::{self, DbPool},
    entities::stock,
    events::{Event, EventSender},
    services::{
        inventory_adjustment_service::{
            AdjustmentDirection, CreateAdjustmentCommand, InventoryAdjustmentService,
        },
        stock_alert_service::StockAlertService,
        stock_transfer_service::{StockTransferService, TransferSettings},
        transfer_code::TransferCodeGenerator,
        InventoryCore,
    },
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const DEFAULT_UNIT_PRICE: Decimal = dec!(12.50);

/// Inventory services backed by a private SQLite database.
pub struct TestInventory {
    pub core: Arc<InventoryCore>,
    pub pool: Arc<DbPool>,
    events: mpsc::Receiver<Event>,
    _dir: Option<TempDir>,
}

impl TestInventory {
    pub async fn new() -> Self {
        Self::build(in_memory_config(), None, None).await
    }

    /// Same as `new` but transfer codes come from `generator`.
    pub async fn with_code_generator(generator: Arc<dyn TransferCodeGenerator>) -> Self {
        Self::build(in_memory_config(), None, Some(generator)).await
    }

    /// A database file in a temporary directory shared by `connections`
    /// pooled connections, so concurrent units of work really overlap.
    pub async fn file_backed(connections: u32) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("inventory.db").display());

        let mut cfg = AppConfig::new(url, "test");
        cfg.auto_migrate = true;
        cfg.db_max_connections = connections;
        cfg.db_min_connections = 1;
        cfg.db_acquire_timeout_secs = 30;

        Self::build(cfg, Some(dir), None).await
    }

    async fn build(
        cfg: AppConfig,
        dir: Option<TempDir>,
        generator: Option<Arc<dyn TransferCodeGenerator>>,
    ) -> Self {

        let pool = Arc::new(
            db::establish_connection_from_app_config(&cfg)
                .await
                .expect("failed to create test database"),
        );

        let (sender, events) = EventSender::channel(4096);
        let sender = Arc::new(sender);

        let mut transfers = StockTransferService::new(
            pool.clone(),
            sender.clone(),
            Arc::new(RbacTransferPolicy::from_config(&cfg)),
            TransferSettings::from(&cfg),
        );
        if let Some(generator) = generator {
            transfers = transfers.with_code_generator(generator);
        }

        let core = InventoryCore {
            adjustments: InventoryAdjustmentService::new(pool.clone(), sender),
            transfers,
            alerts: StockAlertService::new(pool.clone()),
        };

        Self {
            core: Arc::new(core),
            pool,
            events,
            _dir: dir,
        }
    }

    /// Registers the pair at the default unit price and restocks it to `quantity`.
    pub async fn seed(&self, variant_id: Uuid, branch_id: Uuid, quantity: i32) -> stock::Model {
        self.seed_priced(variant_id, branch_id, quantity, DEFAULT_UNIT_PRICE)
            .await
    }

    pub async fn seed_priced(
        &self,
        variant_id: Uuid,
        branch_id: Uuid,
        quantity: i32,
        unit_price: Decimal,
    ) -> stock::Model {
        self.core
            .adjustments
            .register_stock(variant_id, branch_id, unit_price)
            .await
            .expect("register stock");
        if quantity > 0 {
            self.core
                .adjustments
                .create_adjustment(add(variant_id, branch_id, quantity, Some("RESTOCK")))
                .await
                .expect("seed restock");
        }
        self.core
            .adjustments
            .get_stock(variant_id, branch_id)
            .await
            .expect("seeded stock")
    }

    pub async fn quantity(&self, variant_id: Uuid, branch_id: Uuid) -> i32 {
        self.core
            .adjustments
            .get_quantity(variant_id, branch_id)
            .await
            .expect("quantity")
    }

    /// Events published so far, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

pub fn add(
    variant_id: Uuid,
    branch_id: Uuid,
    quantity: i32,
    reason_code: Option<&str>,
) -> CreateAdjustmentCommand {
    adjustment(variant_id, branch_id, AdjustmentDirection::Add, quantity, reason_code)
}

pub fn subtract(
    variant_id: Uuid,
    branch_id: Uuid,
    quantity: i32,
    reason_code: Option<&str>,
) -> CreateAdjustmentCommand {
    adjustment(
        variant_id,
        branch_id,
        AdjustmentDirection::Subtract,
        quantity,
        reason_code,
    )
}

fn adjustment(
    variant_id: Uuid,
    branch_id: Uuid,
    direction: AdjustmentDirection,
    quantity: i32,
    reason_code: Option<&str>,
) -> CreateAdjustmentCommand {
    CreateAdjustmentCommand {
        variant_id,
        branch_id,
        direction,
        quantity,
        reason_code: reason_code.map(str::to_string),
        notes: None,
        actor_id: Uuid::new_v4(),
    }
}

pub fn actor(role: &str) -> Actor {
    Actor::new(Uuid::new_v4(), role)
}

pub fn owner() -> Actor {
    actor("owner")
}

pub fn manager() -> Actor {
    actor("manager")
}

pub fn admin() -> Actor {
    actor("admin")
}

pub fn staff() -> Actor {
    actor("staff")
}

// One connection keeps every query on the same in-memory database.
fn in_memory_config() -> AppConfig {
    let mut cfg = AppConfig::new("sqlite::memory:", "test");
    cfg.auto_migrate = true;
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg.db_acquire_timeout_secs = 30;
    cfg
}
