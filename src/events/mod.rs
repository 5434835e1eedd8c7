use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::entities::stock_adjustment::AdjustmentReason;

/// Publishes domain events after the owning transaction has committed.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with the receiving half of a bounded channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event for an already committed change. Delivery failures are
    /// logged and swallowed because the change itself cannot be undone.
    pub async fn publish(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "Domain event was not delivered");
        }
    }
}

/// Events emitted by the inventory core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    StockAdjusted {
        adjustment_id: Uuid,
        variant_id: Uuid,
        branch_id: Uuid,
        previous_quantity: i32,
        new_quantity: i32,
        reason: Option<AdjustmentReason>,
        actor_id: Uuid,
    },
    StockTransferred {
        transfer_id: Uuid,
        code: String,
        variant_id: Uuid,
        from_branch_id: Uuid,
        to_branch_id: Uuid,
        quantity: i32,
        source_quantity: i32,
        destination_quantity: i32,
    },
    TransferCancelled {
        transfer_id: Uuid,
        code: String,
        cancelled_by: Uuid,
        reason: Option<String>,
    },
    LowStockDetected {
        variant_id: Uuid,
        branch_id: Uuid,
        quantity: i32,
        min_qty: i32,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::StockAdjusted { .. } => "stock_adjusted",
            Event::StockTransferred { .. } => "stock_transferred",
            Event::TransferCancelled { .. } => "transfer_cancelled",
            Event::LowStockDetected { .. } => "low_stock_detected",
        }
    }
}

// Handlers implementing this trait process events asynchronously.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &Event) -> Result<(), String>;
}

/// Writes every event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn handle_event(&self, event: &Event) -> Result<(), String> {
        match event {
            Event::StockAdjusted {
                variant_id,
                branch_id,
                previous_quantity,
                new_quantity,
                reason,
                ..
            } => {
                info!(
                    variant_id = %variant_id,
                    branch_id = %branch_id,
                    previous_quantity,
                    new_quantity,
                    reason = ?reason,
                    "Stock adjusted"
                );
            }
            Event::StockTransferred {
                code,
                variant_id,
                from_branch_id,
                to_branch_id,
                quantity,
                ..
            } => {
                info!(
                    code = %code,
                    variant_id = %variant_id,
                    from_branch_id = %from_branch_id,
                    to_branch_id = %to_branch_id,
                    quantity,
                    "Stock transferred"
                );
            }
            Event::TransferCancelled { code, reason, .. } => {
                info!(code = %code, reason = ?reason, "Transfer cancelled");
            }
            Event::LowStockDetected {
                variant_id,
                branch_id,
                quantity,
                min_qty,
            } => {
                warn!(
                    variant_id = %variant_id,
                    branch_id = %branch_id,
                    quantity,
                    min_qty,
                    "Low stock detected"
                );
            }
        }
        Ok(())
    }
}

/// Drains the channel into the logging handler until every sender is dropped.
pub async fn process_events(rx: mpsc::Receiver<Event>) {
    process_events_with(rx, LoggingEventHandler).await
}

/// Drains the channel into `handler` until every sender is dropped.
pub async fn process_events_with<H: EventHandler>(mut rx: mpsc::Receiver<Event>, handler: H) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        if let Err(e) = handler.handle_event(&event).await {
            error!(event = event.name(), error = %e, "Failed to handle event");
        }
    }

    info!("Event processing loop stopped");
}
