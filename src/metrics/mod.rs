/*!
 * # Metrics Module
 *
 * Process-wide Prometheus counters for inventory operations. The outer
 * service is expected to expose `gather_text()` on its metrics endpoint.
 */

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

use crate::entities::stock_adjustment::AdjustmentReason;
use crate::entities::stock_transfer::TransferStatus;
use crate::errors::ServiceError;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    static ref STOCK_ADJUSTMENTS: IntCounterVec = register(
        IntCounterVec::new(
            Opts::new("stock_adjustments_total", "Total number of recorded stock adjustments"),
            &["reason"]
        )
        .expect("metric can be created")
    );
    static ref STOCK_TRANSFERS: IntCounterVec = register(
        IntCounterVec::new(
            Opts::new("stock_transfers_total", "Total number of transfer state changes"),
            &["status"]
        )
        .expect("metric can be created")
    );
    static ref INVENTORY_OPERATION_FAILURES: IntCounterVec = register(
        IntCounterVec::new(
            Opts::new(
                "inventory_operation_failures_total",
                "Total number of rejected or failed inventory operations"
            ),
            &["operation", "error_type"]
        )
        .expect("metric can be created")
    );
}

fn register(counter: IntCounterVec) -> IntCounterVec {
    if let Err(e) = REGISTRY.register(Box::new(counter.clone())) {
        error!("Failed to register metric: {}", e);
    }
    counter
}

pub fn record_adjustment(reason: Option<AdjustmentReason>) {
    let label = reason.map(|r| r.to_string()).unwrap_or_else(|| "NONE".to_string());
    STOCK_ADJUSTMENTS.with_label_values(&[label.as_str()]).inc();
}

pub fn record_transfer(status: TransferStatus) {
    STOCK_TRANSFERS
        .with_label_values(&[status.to_string().as_str()])
        .inc();
}

pub fn record_failure(operation: &str, err: &ServiceError) {
    INVENTORY_OPERATION_FAILURES
        .with_label_values(&[operation, err.code()])
        .inc();
}

pub fn failure_count(operation: &str, error_type: &str) -> u64 {
    INVENTORY_OPERATION_FAILURES
        .with_label_values(&[operation, error_type])
        .get()
}

/// Renders every registered metric in the Prometheus text format.
pub fn gather_text() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_text_output() {
        record_transfer(TransferStatus::Pending);
        record_failure("create_adjustment", &ServiceError::Conflict("x".into()));
        assert!(failure_count("create_adjustment", "conflict") >= 1);

        let text = gather_text().unwrap();
        assert!(text.contains("stock_transfers_total"));
        assert!(text.contains("inventory_operation_failures_total"));
    }
}
