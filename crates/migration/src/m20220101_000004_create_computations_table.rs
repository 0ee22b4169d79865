use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Computations::Table)
                    .col(
                        ColumnDef::new(Computations::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Computations::Formula).string().not_null())
                    .col(
                        ColumnDef::new(Computations::TargetContract)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Computations::Args).string().not_null())
                    .col(
                        ColumnDef::new(Computations::BlockHeightValid)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Computations::BlockHeightLatest)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Computations::Output).json())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-computations-identity")
                    .table(Computations::Table)
                    .col(Computations::Formula)
                    .col(Computations::TargetContract)
                    .col(Computations::Args)
                    .col(Computations::BlockHeightValid)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Computations::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub(crate) enum Computations {
    Table,
    Id,
    Formula,
    TargetContract,
    Args,
    BlockHeightValid,
    BlockHeightLatest,
    Output,
}
