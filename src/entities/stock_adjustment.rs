use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::ServiceError;

/// Closed set of reasons a non-transfer quantity change may carry.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AdjustmentReason {
    #[sea_orm(string_value = "RESTOCK")]
    Restock,
    #[sea_orm(string_value = "DAMAGED")]
    Damaged,
    #[sea_orm(string_value = "LOST")]
    Lost,
    #[sea_orm(string_value = "EXPIRED")]
    Expired,
    #[sea_orm(string_value = "RETURNED")]
    Returned,
    #[sea_orm(string_value = "COUNT_CORRECTION")]
    CountCorrection,
    #[sea_orm(string_value = "OTHER")]
    Other,
}

impl AdjustmentReason {
    /// Parses a caller-supplied reason code. Spaces and hyphens are treated as
    /// underscores; anything outside the closed set is rejected.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let normalized = raw.trim().replace([' ', '-'], "_");
        AdjustmentReason::from_str(&normalized).map_err(|_| {
            ServiceError::ValidationError(format!(
                "Unknown adjustment reason '{}'. Allowed: RESTOCK, DAMAGED, LOST, EXPIRED, RETURNED, COUNT_CORRECTION, OTHER",
                raw
            ))
        })
    }
}

/// Immutable audit entry for a non-transfer ledger change.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_adjustments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,
    #[sea_orm(column_type = "Uuid")]
    pub variant_id: Uuid,
    #[sea_orm(column_type = "Uuid")]
    pub branch_id: Uuid,
    pub previous_qty: i32,
    pub new_qty: i32,
    pub difference: i32,
    pub reason: Option<AdjustmentReason>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    #[sea_orm(column_type = "Uuid")]
    pub actor_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case("RESTOCK", AdjustmentReason::Restock)]
    #[case("damaged", AdjustmentReason::Damaged)]
    #[case(" Lost ", AdjustmentReason::Lost)]
    #[case("count correction", AdjustmentReason::CountCorrection)]
    #[case("count-correction", AdjustmentReason::CountCorrection)]
    #[case("Other", AdjustmentReason::Other)]
    fn parses_known_reasons(#[case] raw: &str, #[case] expected: AdjustmentReason) {
        assert_eq!(AdjustmentReason::parse(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("stolen")]
    #[case("misc")]
    fn rejects_unknown_reasons(#[case] raw: &str) {
        assert_matches!(
            AdjustmentReason::parse(raw),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn display_matches_stored_value() {
        assert_eq!(AdjustmentReason::CountCorrection.to_string(), "COUNT_CORRECTION");
        assert_eq!(
            AdjustmentReason::CountCorrection.to_value(),
            "COUNT_CORRECTION".to_string()
        );
    }
}
