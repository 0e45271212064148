//! Create poll_options table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PollOptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollOptions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PollOptions::PollId).big_integer().not_null())
                    .col(ColumnDef::new(PollOptions::Name).string_len(120).not_null())
                    .col(ColumnDef::new(PollOptions::Description).string_len(255))
                    .col(ColumnDef::new(PollOptions::VoteCount).integer().not_null().default(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_options_poll")
                            .from(PollOptions::Table, PollOptions::PollId)
                            .to(Polls::Table, Polls::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_poll_options_poll_id")
                    .table(PollOptions::Table)
                    .col(PollOptions::PollId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PollOptions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PollOptions {
    Table,
    Id,
    PollId,
    Name,
    Description,
    VoteCount,
}

#[derive(Iden)]
enum Polls {
    Table,
    Id,
}
