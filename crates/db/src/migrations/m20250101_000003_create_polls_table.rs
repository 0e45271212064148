//! Create polls table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Polls::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Polls::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Polls::PollDate).date().not_null())
                    .col(ColumnDef::new(Polls::Deadline).time().not_null().default("11:00:00"))
                    .col(ColumnDef::new(Polls::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(Polls::Title).string_len(120))
                    .col(
                        ColumnDef::new(Polls::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Polls::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: poll_date (today's poll lookup)
        manager
            .create_index(
                Index::create()
                    .name("idx_polls_poll_date")
                    .table(Polls::Table)
                    .col(Polls::PollDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Polls::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Polls {
    Table,
    Id,
    PollDate,
    Deadline,
    IsActive,
    Title,
    CreatedAt,
    UpdatedAt,
}
