//! Create user_day_statuses table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserDayStatuses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserDayStatuses::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserDayStatuses::UserId).big_integer().not_null())
                    .col(ColumnDef::new(UserDayStatuses::IsoWeek).string_len(8).not_null())
                    .col(ColumnDef::new(UserDayStatuses::Weekday).small_integer().not_null())
                    .col(ColumnDef::new(UserDayStatuses::Status).string_len(16))
                    .col(ColumnDef::new(UserDayStatuses::ArrivalTime).time())
                    .col(ColumnDef::new(UserDayStatuses::Location).string_len(120))
                    .col(
                        ColumnDef::new(UserDayStatuses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(UserDayStatuses::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_day_statuses_user")
                            .from(UserDayStatuses::Table, UserDayStatuses::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per (user, week, day); the upsert conflicts on this
        manager
            .create_index(
                Index::create()
                    .name("idx_user_day_statuses_user_week_day")
                    .table(UserDayStatuses::Table)
                    .col(UserDayStatuses::UserId)
                    .col(UserDayStatuses::IsoWeek)
                    .col(UserDayStatuses::Weekday)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: iso_week (board snapshot)
        manager
            .create_index(
                Index::create()
                    .name("idx_user_day_statuses_iso_week")
                    .table(UserDayStatuses::Table)
                    .col(UserDayStatuses::IsoWeek)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserDayStatuses::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum UserDayStatuses {
    Table,
    Id,
    UserId,
    IsoWeek,
    Weekday,
    Status,
    ArrivalTime,
    Location,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
