mod common;

use assert_matches::assert_matches;
use branch_inventory::{
    entities::stock_adjustment::AdjustmentReason,
    errors::ServiceError,
    events::Event,
    repositories::adjustment_repository::AdjustmentFilter,
    services::inventory_adjustment_service::RecordCountCommand,
};
use common::{add, subtract, TestInventory, DEFAULT_UNIT_PRICE};
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn subtract_beyond_available_leaves_ledger_and_audit_untouched() {
    let app = TestInventory::new().await;
    let (variant, branch) = (Uuid::new_v4(), Uuid::new_v4());
    app.seed(variant, branch, 10).await;

    let err = app
        .core
        .adjustments
        .create_adjustment(subtract(variant, branch, 15, Some("DAMAGED")))
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ServiceError::InsufficientStock {
            available: 10,
            requested: 15,
            ..
        }
    );
    assert_eq!(app.quantity(variant, branch).await, 10);

    let history = app
        .core
        .adjustments
        .list_adjustments(AdjustmentFilter {
            variant_id: Some(variant),
            branch_id: Some(branch),
            limit: None,
        })
        .await
        .unwrap();
    // Only the seeding restock exists
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].reason, Some(AdjustmentReason::Restock));
}

#[tokio::test]
async fn adjustment_writes_ledger_and_audit_together() {
    let mut app = TestInventory::new().await;
    let (variant, branch) = (Uuid::new_v4(), Uuid::new_v4());
    app.seed(variant, branch, 10).await;
    app.drain_events();

    let outcome = app
        .core
        .adjustments
        .create_adjustment(subtract(variant, branch, 4, Some("damaged")))
        .await
        .unwrap();

    assert_eq!(outcome.new_quantity, 6);
    assert_eq!(outcome.adjustment.previous_qty, 10);
    assert_eq!(outcome.adjustment.new_qty, 6);
    assert_eq!(outcome.adjustment.difference, -4);
    assert_eq!(outcome.adjustment.reason, Some(AdjustmentReason::Damaged));
    assert_eq!(app.quantity(variant, branch).await, 6);

    let events = app.drain_events();
    assert_matches!(
        events.as_slice(),
        [Event::StockAdjusted {
            previous_quantity: 10,
            new_quantity: 6,
            reason: Some(AdjustmentReason::Damaged),
            ..
        }]
    );
}

#[tokio::test]
async fn add_then_subtract_restores_quantity() {
    let app = TestInventory::new().await;
    let (variant, branch) = (Uuid::new_v4(), Uuid::new_v4());
    app.seed(variant, branch, 7).await;

    app.core
        .adjustments
        .create_adjustment(add(variant, branch, 5, Some("RETURNED")))
        .await
        .unwrap();
    app.core
        .adjustments
        .create_adjustment(subtract(variant, branch, 5, Some("OTHER")))
        .await
        .unwrap();

    assert_eq!(app.quantity(variant, branch).await, 7);
}

#[tokio::test]
async fn subtracting_everything_reaches_zero() {
    let app = TestInventory::new().await;
    let (variant, branch) = (Uuid::new_v4(), Uuid::new_v4());
    app.seed(variant, branch, 3).await;

    let outcome = app
        .core
        .adjustments
        .create_adjustment(subtract(variant, branch, 3, None))
        .await
        .unwrap();

    assert_eq!(outcome.new_quantity, 0);
    assert_eq!(outcome.adjustment.reason, None);
}

#[tokio::test]
async fn unknown_reason_code_is_rejected_before_any_write() {
    let app = TestInventory::new().await;
    let (variant, branch) = (Uuid::new_v4(), Uuid::new_v4());
    app.seed(variant, branch, 10).await;

    let err = app
        .core
        .adjustments
        .create_adjustment(add(variant, branch, 1, Some("GIFTED")))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(app.quantity(variant, branch).await, 10);
}

#[tokio::test]
async fn zero_quantity_adjustment_is_rejected() {
    let app = TestInventory::new().await;
    let (variant, branch) = (Uuid::new_v4(), Uuid::new_v4());
    app.seed(variant, branch, 10).await;

    let err = app
        .core
        .adjustments
        .create_adjustment(add(variant, branch, 0, None))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn adjusting_an_unregistered_pair_is_not_found() {
    let app = TestInventory::new().await;

    let err = app
        .core
        .adjustments
        .create_adjustment(add(Uuid::new_v4(), Uuid::new_v4(), 1, None))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn missing_pair_reads_and_writes_report_the_same_message() {
    let app = TestInventory::new().await;
    let (variant, branch) = (Uuid::new_v4(), Uuid::new_v4());

    let read = app
        .core
        .adjustments
        .get_stock(variant, branch)
        .await
        .unwrap_err();
    let write = app
        .core
        .adjustments
        .create_adjustment(subtract(variant, branch, 1, None))
        .await
        .unwrap_err();

    let expected = format!("No stock for variant {} at branch {}", variant, branch);
    assert_matches!(read, ServiceError::NotFound(ref msg) if *msg == expected);
    assert_matches!(write, ServiceError::NotFound(ref msg) if *msg == expected);
}

#[tokio::test]
async fn record_count_overwrites_quantity_with_count_correction() {
    let app = TestInventory::new().await;
    let (variant, branch) = (Uuid::new_v4(), Uuid::new_v4());
    app.seed(variant, branch, 10).await;

    let outcome = app
        .core
        .adjustments
        .record_count(RecordCountCommand {
            variant_id: variant,
            branch_id: branch,
            counted_quantity: 8,
            notes: Some("cycle count".to_string()),
            actor_id: Uuid::new_v4(),
        })
        .await
        .unwrap();

    assert_eq!(outcome.new_quantity, 8);
    assert_eq!(outcome.adjustment.previous_qty, 10);
    assert_eq!(outcome.adjustment.difference, -2);
    assert_eq!(
        outcome.adjustment.reason,
        Some(AdjustmentReason::CountCorrection)
    );
    assert_eq!(outcome.adjustment.notes.as_deref(), Some("cycle count"));
    assert_eq!(app.quantity(variant, branch).await, 8);
}

#[tokio::test]
async fn unchanged_count_is_still_audited() {
    let app = TestInventory::new().await;
    let (variant, branch) = (Uuid::new_v4(), Uuid::new_v4());
    app.seed(variant, branch, 5).await;

    let outcome = app
        .core
        .adjustments
        .record_count(RecordCountCommand {
            variant_id: variant,
            branch_id: branch,
            counted_quantity: 5,
            notes: None,
            actor_id: Uuid::new_v4(),
        })
        .await
        .unwrap();

    assert_eq!(outcome.adjustment.difference, 0);
    let history = app
        .core
        .adjustments
        .list_adjustments(AdjustmentFilter {
            variant_id: Some(variant),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn register_stock_is_idempotent() {
    let app = TestInventory::new().await;
    let (variant, branch) = (Uuid::new_v4(), Uuid::new_v4());

    let first = app
        .core
        .adjustments
        .register_stock(variant, branch, DEFAULT_UNIT_PRICE)
        .await
        .unwrap();
    let second = app
        .core
        .adjustments
        .register_stock(variant, branch, dec!(99))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.quantity, 0);
    assert_eq!(second.unit_price, DEFAULT_UNIT_PRICE);
}

#[tokio::test]
async fn branch_listing_only_returns_that_branch() {
    let app = TestInventory::new().await;
    let (branch_a, branch_b) = (Uuid::new_v4(), Uuid::new_v4());
    app.seed(Uuid::new_v4(), branch_a, 1).await;
    app.seed(Uuid::new_v4(), branch_a, 2).await;
    app.seed(Uuid::new_v4(), branch_b, 3).await;

    let rows = app.core.adjustments.list_branch_stock(branch_a).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.branch_id == branch_a));
}
