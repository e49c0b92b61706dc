use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250110_000001_create_sessions_table::Migration),
            Box::new(m20250110_000002_create_orders_table::Migration),
            Box::new(m20250110_000003_create_payments_table::Migration),
            Box::new(m20250110_000004_create_print_jobs_table::Migration),
            Box::new(m20250110_000005_create_webhook_logs_table::Migration),
        ]
    }
}

mod m20250110_000001_create_sessions_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250110_000001_create_sessions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sessions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sessions::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Sessions::Phone).string().not_null())
                        .col(ColumnDef::new(Sessions::State).string().not_null())
                        .col(ColumnDef::new(Sessions::DraftOrderId).uuid().null())
                        .col(ColumnDef::new(Sessions::TempFileUrl).text().null())
                        .col(ColumnDef::new(Sessions::TempFileName).string().null())
                        .col(ColumnDef::new(Sessions::TempFileMediaId).string().null())
                        .col(ColumnDef::new(Sessions::TempPrintType).string().null())
                        .col(ColumnDef::new(Sessions::LastActivity).timestamp().not_null())
                        .col(ColumnDef::new(Sessions::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_sessions_phone")
                        .table(Sessions::Table)
                        .col(Sessions::Phone)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Sessions::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Sessions {
        Table,
        Id,
        Phone,
        State,
        DraftOrderId,
        TempFileUrl,
        TempFileName,
        TempFileMediaId,
        TempPrintType,
        LastActivity,
        CreatedAt,
    }
}

mod m20250110_000002_create_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250110_000002_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::CustomerPhone).string().not_null())
                        .col(ColumnDef::new(Orders::FileName).string().null())
                        .col(ColumnDef::new(Orders::FileUrl).text().null())
                        .col(ColumnDef::new(Orders::FileHash).string().null())
                        .col(
                            ColumnDef::new(Orders::PageCount)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(ColumnDef::new(Orders::PrintType).string().null())
                        .col(ColumnDef::new(Orders::Copies).integer().not_null().default(1))
                        .col(ColumnDef::new(Orders::Amount).decimal().not_null().default(0))
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::PaymentLinkId).string().null())
                        .col(ColumnDef::new(Orders::PaymentLinkUrl).text().null())
                        .col(ColumnDef::new(Orders::ShopId).uuid().null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_customer_phone")
                        .table(Orders::Table)
                        .col(Orders::CustomerPhone)
                        .to_owned(),
                )
                .await?;

            // Payment confirmations join on this key, so it must be unique.
            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_payment_link_id")
                        .table(Orders::Table)
                        .col(Orders::PaymentLinkId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Orders {
        Table,
        Id,
        CustomerPhone,
        FileName,
        FileUrl,
        FileHash,
        PageCount,
        PrintType,
        Copies,
        Amount,
        Status,
        PaymentLinkId,
        PaymentLinkUrl,
        ShopId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250110_000003_create_payments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250110_000003_create_payments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Payments::OrderId).uuid().not_null())
                        .col(ColumnDef::new(Payments::PaymentLinkId).string().not_null())
                        .col(ColumnDef::new(Payments::ProviderReference).string().null())
                        .col(ColumnDef::new(Payments::Status).string().not_null())
                        .col(ColumnDef::new(Payments::Amount).decimal().not_null())
                        .col(ColumnDef::new(Payments::PaidAt).timestamp().null())
                        .col(ColumnDef::new(Payments::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_payments_order_id")
                        .table(Payments::Table)
                        .col(Payments::OrderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Payments {
        Table,
        Id,
        OrderId,
        PaymentLinkId,
        ProviderReference,
        Status,
        Amount,
        PaidAt,
        CreatedAt,
    }
}

mod m20250110_000004_create_print_jobs_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250110_000004_create_print_jobs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PrintJobs::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(PrintJobs::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(PrintJobs::OrderId).uuid().not_null())
                        .col(ColumnDef::new(PrintJobs::ShopId).uuid().null())
                        .col(ColumnDef::new(PrintJobs::PrinterName).string().null())
                        .col(ColumnDef::new(PrintJobs::Status).string().not_null())
                        .col(
                            ColumnDef::new(PrintJobs::RetryCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PrintJobs::MaxRetries)
                                .integer()
                                .not_null()
                                .default(3),
                        )
                        .col(ColumnDef::new(PrintJobs::LastError).text().null())
                        .col(ColumnDef::new(PrintJobs::PrintedAt).timestamp().null())
                        .col(ColumnDef::new(PrintJobs::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(PrintJobs::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            // Duplicate webhook deliveries must not create a second job.
            manager
                .create_index(
                    Index::create()
                        .name("idx_print_jobs_order_id")
                        .table(PrintJobs::Table)
                        .col(PrintJobs::OrderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_print_jobs_status")
                        .table(PrintJobs::Table)
                        .col(PrintJobs::Status)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PrintJobs::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum PrintJobs {
        Table,
        Id,
        OrderId,
        ShopId,
        PrinterName,
        Status,
        RetryCount,
        MaxRetries,
        LastError,
        PrintedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250110_000005_create_webhook_logs_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250110_000005_create_webhook_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WebhookLogs::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(WebhookLogs::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(WebhookLogs::EventId).string().not_null())
                        .col(ColumnDef::new(WebhookLogs::EventType).string().not_null())
                        .col(ColumnDef::new(WebhookLogs::Provider).string().not_null())
                        .col(ColumnDef::new(WebhookLogs::PayloadHash).string().not_null())
                        .col(ColumnDef::new(WebhookLogs::ProcessedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            // The uniqueness constraint is the idempotency mechanism itself,
            // not an optimization; see services::payments.
            manager
                .create_index(
                    Index::create()
                        .name("idx_webhook_logs_event_id")
                        .table(WebhookLogs::Table)
                        .col(WebhookLogs::EventId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WebhookLogs::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum WebhookLogs {
        Table,
        Id,
        EventId,
        EventType,
        Provider,
        PayloadHash,
        ProcessedAt,
    }
}
