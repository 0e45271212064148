//! Week chat message entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Discriminates how `body` / `payload` are used.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum ChatMessageKind {
    /// Free text in `body`.
    #[sea_orm(string_value = "text")]
    Text,
    /// Poll announcement in `payload`.
    #[sea_orm(string_value = "poll")]
    Poll,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chat_messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(indexed)]
    pub user_id: i64,

    #[sea_orm(indexed)]
    pub iso_week: String,

    #[sea_orm(column_name = "type")]
    pub kind: ChatMessageKind,

    /// Poll snapshot (`poll_id`, `title`, `options`) for poll messages
    #[sea_orm(column_type = "Json", nullable)]
    pub payload: Option<JsonValue>,

    #[sea_orm(column_type = "Text", nullable)]
    pub body: Option<String>,

    pub created_at: DateTimeWithTimeZone,
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
