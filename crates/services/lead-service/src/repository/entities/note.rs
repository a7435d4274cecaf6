//! Note database entity for SeaORM.

use sea_orm::entity::prelude::*;
use sea_orm::Set;

use domain::Note;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub lead_id: Uuid,
    /// NULL for system-authored notes
    pub author_id: Option<Uuid>,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub pinned: bool,
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

impl From<Model> for Note {
    fn from(model: Model) -> Self {
        Note {
            id: model.id,
            lead_id: model.lead_id,
            author_id: model.author_id,
            body: model.body,
            pinned: model.pinned,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<&Note> for ActiveModel {
    fn from(note: &Note) -> Self {
        ActiveModel {
            id: Set(note.id),
            lead_id: Set(note.lead_id),
            author_id: Set(note.author_id),
            body: Set(note.body.clone()),
            pinned: Set(note.pinned),
            created_at: Set(note.created_at),
            updated_at: Set(note.updated_at),
        }
    }
}
