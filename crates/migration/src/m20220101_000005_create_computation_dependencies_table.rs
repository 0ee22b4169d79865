use sea_orm_migration::prelude::*;

use crate::Computations;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ComputationDependencies::Table)
                    .col(
                        ColumnDef::new(ComputationDependencies::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ComputationDependencies::ComputationId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ComputationDependencies::Contract)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ComputationDependencies::KeyOrPrefix)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ComputationDependencies::IsPrefix)
                            .boolean()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(
                                ComputationDependencies::Table,
                                ComputationDependencies::ComputationId,
                            )
                            .to(Computations::Table, Computations::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-computation_dependencies-contract_key")
                    .table(ComputationDependencies::Table)
                    .col(ComputationDependencies::Contract)
                    .col(ComputationDependencies::KeyOrPrefix)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ComputationDependencies::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum ComputationDependencies {
    Table,
    Id,
    ComputationId,
    Contract,
    KeyOrPrefix,
    IsPrefix,
}
