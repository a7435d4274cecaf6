//! Email database entity for SeaORM.

use sea_orm::entity::prelude::*;
use sea_orm::Set;

use common::AppError;
use domain::Email;

use super::corrupt_row;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "emails")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub lead_id: Uuid,
    pub direction: String,
    pub sender_id: Option<Uuid>,
    /// Recipient for outbound mail, sender for inbound mail
    pub counterpart: String,
    pub subject: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub delivery_status: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub diagnostic: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
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

impl Related<super::lead::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lead.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Email {
    type Error = AppError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let corrupt = |err| corrupt_row("emails", err);

        Ok(Email {
            id: model.id,
            lead_id: model.lead_id,
            direction: model.direction.parse().map_err(corrupt)?,
            sender_id: model.sender_id,
            counterpart: model.counterpart,
            subject: model.subject,
            body: model.body,
            delivery_status: model.delivery_status.parse().map_err(corrupt)?,
            diagnostic: model.diagnostic,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl From<&Email> for ActiveModel {
    fn from(email: &Email) -> Self {
        ActiveModel {
            id: Set(email.id),
            lead_id: Set(email.lead_id),
            direction: Set(email.direction.as_str().to_string()),
            sender_id: Set(email.sender_id),
            counterpart: Set(email.counterpart.clone()),
            subject: Set(email.subject.clone()),
            body: Set(email.body.clone()),
            delivery_status: Set(email.delivery_status.as_str().to_string()),
            diagnostic: Set(email.diagnostic.clone()),
            created_at: Set(email.created_at),
            updated_at: Set(email.updated_at),
        }
    }
}
