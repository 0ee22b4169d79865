use sea_orm_migration::prelude::*;

use crate::WasmEvents;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PendingWebhooks::Table)
                    .col(
                        ColumnDef::new(PendingWebhooks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PendingWebhooks::EventId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PendingWebhooks::Endpoint)
                            .json()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PendingWebhooks::Value).json().not_null())
                    .col(
                        ColumnDef::new(PendingWebhooks::Failures)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(PendingWebhooks::LastAttemptedAt).big_integer())
                    .foreign_key(
                        ForeignKey::create()
                            .from(PendingWebhooks::Table, PendingWebhooks::EventId)
                            .to(WasmEvents::Table, WasmEvents::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PendingWebhooks::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum PendingWebhooks {
    Table,
    Id,
    EventId,
    Endpoint,
    Value,
    Failures,
    LastAttemptedAt,
}
