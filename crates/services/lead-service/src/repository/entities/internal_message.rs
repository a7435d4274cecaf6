//! Internal message database entity for SeaORM.

use sea_orm::entity::prelude::*;
use sea_orm::Set;

use domain::InternalMessage;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "internal_messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub lead_id: Uuid,
    pub author_id: Uuid,
    pub subject: String,
    #[sea_orm(column_type = "Text")]
    pub body_plain: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub body_rich: Option<String>,
    pub important: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::lead::Entity",
        from = "Column::LeadId",
        to = "super::lead::Column::Id",
        on_delete = "Cascade"
    )]
    Lead,
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for InternalMessage {
    fn from(model: Model) -> Self {
        InternalMessage {
            id: model.id,
            lead_id: model.lead_id,
            author_id: model.author_id,
            subject: model.subject,
            body_plain: model.body_plain,
            body_rich: model.body_rich,
            important: model.important,
            created_at: model.created_at,
        }
    }
}

impl From<&InternalMessage> for ActiveModel {
    fn from(message: &InternalMessage) -> Self {
        ActiveModel {
            id: Set(message.id),
            lead_id: Set(message.lead_id),
            author_id: Set(message.author_id),
            subject: Set(message.subject.clone()),
            body_plain: Set(message.body_plain.clone()),
            body_rich: Set(message.body_rich.clone()),
            important: Set(message.important),
            created_at: Set(message.created_at),
        }
    }
}
