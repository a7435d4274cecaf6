//! File attachment database entity for SeaORM.
//!
//! Only metadata lives here; the bytes sit in object storage under
//! `storage_key`.

use sea_orm::entity::prelude::*;
use sea_orm::Set;

use domain::FileAttachment;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "file_attachments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub lead_id: Uuid,
    pub uploader_id: Uuid,
    pub file_name: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub storage_key: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
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

impl From<Model> for FileAttachment {
    fn from(model: Model) -> Self {
        FileAttachment {
            id: model.id,
            lead_id: model.lead_id,
            uploader_id: model.uploader_id,
            file_name: model.file_name,
            size_bytes: model.size_bytes,
            content_type: model.content_type,
            storage_key: model.storage_key,
            description: model.description,
            created_at: model.created_at,
        }
    }
}

impl From<&FileAttachment> for ActiveModel {
    fn from(file: &FileAttachment) -> Self {
        ActiveModel {
            id: Set(file.id),
            lead_id: Set(file.lead_id),
            uploader_id: Set(file.uploader_id),
            file_name: Set(file.file_name.clone()),
            size_bytes: Set(file.size_bytes),
            content_type: Set(file.content_type.clone()),
            storage_key: Set(file.storage_key.clone()),
            description: Set(file.description.clone()),
            created_at: Set(file.created_at),
        }
    }
}
