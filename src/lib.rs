//! Branch Inventory Library
//!
//! Transactional inventory core for multi-branch retail: a per-branch stock
//! ledger, an append-only adjustment audit trail, role-gated inter-branch
//! transfers and read-time low-stock evaluation.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod migrator;
pub mod repositories;
pub mod services;

use std::sync::Arc;
use tokio::sync::mpsc;

pub use auth::{Actor, Role, TransferPolicy};
pub use errors::ServiceError;
pub use services::InventoryCore;

/// Connects to the configured database (migrating it when `auto_migrate` is
/// set) and wires the inventory services. The returned receiver yields the
/// domain events published after each commit.
pub async fn bootstrap(
    config: &config::AppConfig,
) -> Result<(InventoryCore, mpsc::Receiver<events::Event>), ServiceError> {
    let pool = db::establish_connection_from_app_config(config).await?;
    let (sender, receiver) = events::EventSender::channel(config.event_channel_capacity);
    let core = InventoryCore::from_config(Arc::new(pool), Arc::new(sender), config);
    Ok((core, receiver))
}
