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
                    .table(WasmEvents::Table)
                    .col(
                        ColumnDef::new(WasmEvents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WasmEvents::BlockHeight)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WasmEvents::ContractAddress)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WasmEvents::Key).string().not_null())
                    .col(ColumnDef::new(WasmEvents::Value).string())
                    .col(ColumnDef::new(WasmEvents::ValueJson).json())
                    .col(
                        ColumnDef::new(WasmEvents::Delete)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(WasmEvents::BlockTimeUnixMs)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(WasmEvents::Table, WasmEvents::ContractAddress)
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
                    .name("idx-wasm_events-block_contract_key")
                    .table(WasmEvents::Table)
                    .col(WasmEvents::BlockHeight)
                    .col(WasmEvents::ContractAddress)
                    .col(WasmEvents::Key)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-wasm_events-contract_key_block")
                    .table(WasmEvents::Table)
                    .col(WasmEvents::ContractAddress)
                    .col(WasmEvents::Key)
                    .col(WasmEvents::BlockHeight)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WasmEvents::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub(crate) enum WasmEvents {
    Table,
    Id,
    BlockHeight,
    ContractAddress,
    Key,
    Value,
    ValueJson,
    Delete,
    BlockTimeUnixMs,
}
