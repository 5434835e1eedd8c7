//! Data access for the inventory tables.
//!
//! Reads accept any connection. Writes require a [`UnitOfWork`] so they
//! always share a transaction with the rest of their operation.
//!
//! [`UnitOfWork`]: crate::db::UnitOfWork

pub mod adjustment_repository;
pub mod alert_repository;
pub mod stock_ledger;
pub mod transfer_repository;
