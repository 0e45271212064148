//! Per-user, per-weekday lunch status.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What a user does for lunch on a given day.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum LunchStatus {
    /// Brings food from home.
    #[sea_orm(string_value = "Lunchbox")]
    Lunchbox,
    /// Buys lunch out.
    #[sea_orm(string_value = "Buying")]
    Buying,
    /// Stays home.
    #[sea_orm(string_value = "Home")]
    Home,
}

impl From<LunchStatus> for lunchsync_common::LunchStatus {
    fn from(value: LunchStatus) -> Self {
        match value {
            LunchStatus::Lunchbox => Self::Lunchbox,
            LunchStatus::Buying => Self::Buying,
            LunchStatus::Home => Self::Home,
        }
    }
}

impl From<lunchsync_common::LunchStatus> for LunchStatus {
    fn from(value: lunchsync_common::LunchStatus) -> Self {
        match value {
            lunchsync_common::LunchStatus::Lunchbox => Self::Lunchbox,
            lunchsync_common::LunchStatus::Buying => Self::Buying,
            lunchsync_common::LunchStatus::Home => Self::Home,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_day_statuses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Declaring user; the only one allowed to write this row
    #[sea_orm(indexed)]
    pub user_id: i64,

    /// ISO week key, `YYYY-Www`
    #[sea_orm(indexed)]
    pub iso_week: String,

    /// 1 (Monday) to 5 (Friday)
    pub weekday: i16,

    #[sea_orm(nullable)]
    pub status: Option<LunchStatus>,

    #[sea_orm(nullable)]
    pub arrival_time: Option<Time>,

    #[sea_orm(nullable)]
    pub location: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
