//! Property-based tests for the inventory core.
//!
//! Pure helpers get wide input coverage; the ledger property replays random
//! adjustment sequences against a fresh database and a simple in-memory model.

mod common;

use branch_inventory::{
    auth::{rbac::check_permission, Role},
    entities::stock_adjustment::AdjustmentReason,
    errors::ServiceError,
    services::transfer_code::format_code,
};
use chrono::NaiveDate;
use common::{add, subtract, TestInventory};
use proptest::prelude::*;
use uuid::Uuid;

const REASON_CODES: [&str; 7] = [
    "RESTOCK",
    "DAMAGED",
    "LOST",
    "EXPIRED",
    "RETURNED",
    "COUNT_CORRECTION",
    "OTHER",
];

fn mixed_case(raw: &str, mask: u64) -> String {
    raw.chars()
        .enumerate()
        .map(|(i, c)| {
            if mask & (1 << (i % 64)) != 0 {
                c.to_ascii_lowercase()
            } else {
                c
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Add(i32),
    Subtract(i32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![(1i32..20).prop_map(Op::Add), (1i32..20).prop_map(Op::Subtract)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn known_reason_codes_parse_in_any_case(index in 0usize..REASON_CODES.len(), mask in any::<u64>()) {
        let raw = mixed_case(REASON_CODES[index], mask);
        let parsed = AdjustmentReason::parse(&raw);
        prop_assert!(parsed.is_ok(), "Reason code rejected: {}", raw);
        prop_assert_eq!(parsed.unwrap().to_string(), REASON_CODES[index]);
    }

    #[test]
    fn unknown_reason_codes_are_validation_errors(raw in "[a-z]{3,12}") {
        prop_assume!(!REASON_CODES.iter().any(|code| code.eq_ignore_ascii_case(&raw)));
        let result = AdjustmentReason::parse(&raw);
        prop_assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }

    #[test]
    fn transfer_codes_have_fixed_shape(
        prefix in "[A-Z0-9]{1,8}",
        suffix in any::<u16>(),
        days in 0i64..20_000,
    ) {
        let date = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap() + chrono::Duration::days(days);
        let code = format_code(&prefix, date, suffix);
        let parts: Vec<&str> = code.rsplitn(3, '-').collect();
        prop_assert_eq!(parts.len(), 3);
        prop_assert_eq!(parts[0].len(), 4);
        prop_assert_eq!(parts[1].len(), 8);
        prop_assert_eq!(parts[2], prefix.as_str());
    }

    #[test]
    fn role_normalization_is_idempotent(name in "[ ]{0,2}[A-Za-z]{1,12}[ ]{0,2}") {
        let once = Role::new(&name);
        let twice = Role::new(once.as_str());
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.as_str(), name.trim().to_ascii_lowercase());
    }

    #[test]
    fn resource_wildcard_grants_every_action(resource in "[a-z]{3,10}", action in "[a-z_]{3,12}") {
        let required = format!("{}:{}", resource, action);
        let granted = format!("{}:*", resource);
        prop_assert!(check_permission(&granted, &required));
        let other = format!("{}x:*", resource);
        prop_assert!(!check_permission(&other, &required));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn ledger_matches_model_and_never_goes_negative(
        initial in 0i32..30,
        ops in prop::collection::vec(op_strategy(), 1..12),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (expected, actual) = runtime.block_on(async {
            let app = TestInventory::new().await;
            let (variant, branch) = (Uuid::new_v4(), Uuid::new_v4());
            app.seed(variant, branch, initial).await;

            let mut model = initial;
            for op in &ops {
                match *op {
                    Op::Add(n) => {
                        app.core.adjustments.create_adjustment(add(variant, branch, n, None)).await.unwrap();
                        model += n;
                    }
                    Op::Subtract(n) => {
                        let result = app
                            .core
                            .adjustments
                            .create_adjustment(subtract(variant, branch, n, None))
                            .await;
                        if n <= model {
                            assert_eq!(result.unwrap().new_quantity, model - n);
                            model -= n;
                        } else {
                            assert!(matches!(result, Err(ServiceError::InsufficientStock { .. })));
                        }
                    }
                }
            }
            (model, app.quantity(variant, branch).await)
        });

        prop_assert!(actual >= 0);
        prop_assert_eq!(expected, actual);
    }
}
