use sea_orm_migration::prelude::*;

use crate::Contracts;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WasmEventTransformations::Table)
                    .col(
                        ColumnDef::new(WasmEventTransformations::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WasmEventTransformations::BlockHeight)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WasmEventTransformations::ContractAddress)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WasmEventTransformations::Name)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WasmEventTransformations::Value).json())
                    .foreign_key(
                        ForeignKey::create()
                            .from(
                                WasmEventTransformations::Table,
                                WasmEventTransformations::ContractAddress,
                            )
                            .to(Contracts::Table, Contracts::Address)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-wasm_event_transformations-block_contract_name")
                    .table(WasmEventTransformations::Table)
                    .col(WasmEventTransformations::BlockHeight)
                    .col(WasmEventTransformations::ContractAddress)
                    .col(WasmEventTransformations::Name)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WasmEventTransformations::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum WasmEventTransformations {
    Table,
    Id,
    BlockHeight,
    ContractAddress,
    Name,
    Value,
}
