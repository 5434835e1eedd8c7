use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_stocks_table::Migration),
            Box::new(m20240301_000002_create_stock_adjustments_table::Migration),
            Box::new(m20240301_000003_create_stock_transfers_table::Migration),
            Box::new(m20240301_000004_create_stock_alerts_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_stocks_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_stocks_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Stocks::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Stocks::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Stocks::VariantId).uuid().not_null())
                        .col(ColumnDef::new(Stocks::BranchId).uuid().not_null())
                        .col(
                            ColumnDef::new(Stocks::Quantity)
                                .integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(Stocks::Quantity).gte(0)),
                        )
                        .col(
                            ColumnDef::new(Stocks::UnitPrice)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Stocks::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Stocks::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Stocks::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .unique()
                        .name("uq_stocks_variant_branch")
                        .table(Stocks::Table)
                        .col(Stocks::VariantId)
                        .col(Stocks::BranchId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stocks_branch_id")
                        .table(Stocks::Table)
                        .col(Stocks::BranchId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Stocks::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Stocks {
        Table,
        Id,
        VariantId,
        BranchId,
        Quantity,
        UnitPrice,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_stock_adjustments_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_stock_adjustments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockAdjustments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockAdjustments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAdjustments::VariantId).uuid().not_null())
                        .col(ColumnDef::new(StockAdjustments::BranchId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockAdjustments::PreviousQty)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAdjustments::NewQty).integer().not_null())
                        .col(
                            ColumnDef::new(StockAdjustments::Difference)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAdjustments::Reason).string_len(32).null())
                        .col(ColumnDef::new(StockAdjustments::Notes).text().null())
                        .col(ColumnDef::new(StockAdjustments::ActorId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockAdjustments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_adjustments_variant_branch")
                        .table(StockAdjustments::Table)
                        .col(StockAdjustments::VariantId)
                        .col(StockAdjustments::BranchId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockAdjustments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockAdjustments {
        Table,
        Id,
        VariantId,
        BranchId,
        PreviousQty,
        NewQty,
        Difference,
        Reason,
        Notes,
        ActorId,
        CreatedAt,
    }
}

mod m20240301_000003_create_stock_transfers_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_stock_transfers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockTransfers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTransfers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransfers::Code)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(StockTransfers::VariantId).uuid().not_null())
                        .col(ColumnDef::new(StockTransfers::FromBranchId).uuid().not_null())
                        .col(ColumnDef::new(StockTransfers::ToBranchId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockTransfers::Quantity)
                                .integer()
                                .not_null()
                                .check(Expr::col(StockTransfers::Quantity).gt(0)),
                        )
                        .col(ColumnDef::new(StockTransfers::Status).string_len(16).not_null())
                        .col(ColumnDef::new(StockTransfers::RequestedBy).uuid().not_null())
                        .col(ColumnDef::new(StockTransfers::ResolvedBy).uuid().null())
                        .col(
                            ColumnDef::new(StockTransfers::ResolvedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(StockTransfers::Notes).text().null())
                        .col(
                            ColumnDef::new(StockTransfers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransfers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_transfers_status")
                        .table(StockTransfers::Table)
                        .col(StockTransfers::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_transfers_from_branch")
                        .table(StockTransfers::Table)
                        .col(StockTransfers::FromBranchId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_transfers_to_branch")
                        .table(StockTransfers::Table)
                        .col(StockTransfers::ToBranchId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockTransfers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockTransfers {
        Table,
        Id,
        Code,
        VariantId,
        FromBranchId,
        ToBranchId,
        Quantity,
        Status,
        RequestedBy,
        ResolvedBy,
        ResolvedAt,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000004_create_stock_alerts_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_stock_alerts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockAlerts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockAlerts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAlerts::VariantId).uuid().not_null())
                        .col(ColumnDef::new(StockAlerts::BranchId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockAlerts::MinQty)
                                .integer()
                                .not_null()
                                .check(Expr::col(StockAlerts::MinQty).gte(0)),
                        )
                        .col(
                            ColumnDef::new(StockAlerts::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(StockAlerts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAlerts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .unique()
                        .name("uq_stock_alerts_variant_branch")
                        .table(StockAlerts::Table)
                        .col(StockAlerts::VariantId)
                        .col(StockAlerts::BranchId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockAlerts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockAlerts {
        Table,
        Id,
        VariantId,
        BranchId,
        MinQty,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}
