//! Per-channel repositories for the communication thread.
//!
//! The four channels are stored and queried independently; the aggregator
//! merges them at read time. Listing is always per lead, oldest first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use super::entities::{email, file_attachment, internal_message, note};
use common::{AppError, AppResult};
use domain::{DeliveryStatus, Email, FileAttachment, InternalMessage, Note};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait NoteRepository: Send + Sync {
    async fn append(&self, note: Note) -> AppResult<Note>;

    async fn list_for_lead(&self, lead_id: Uuid) -> AppResult<Vec<Note>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Note>>;

    /// Replace the body only; the pin state is left as stored.
    async fn update_body(&self, id: Uuid, body: String, at: DateTime<Utc>) -> AppResult<Note>;

    /// Change the pin state only; the body is left as stored.
    async fn set_pinned(&self, id: Uuid, pinned: bool, at: DateTime<Utc>) -> AppResult<Note>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append(&self, message: InternalMessage) -> AppResult<InternalMessage>;

    async fn list_for_lead(&self, lead_id: Uuid) -> AppResult<Vec<InternalMessage>>;
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait EmailRepository: Send + Sync {
    async fn append(&self, email: Email) -> AppResult<Email>;

    async fn list_for_lead(&self, lead_id: Uuid) -> AppResult<Vec<Email>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Email>>;

    /// Move the delivery status forward. Returns `None` when the stored
    /// status may not become `status` (late or out-of-order callback).
    async fn advance_delivery(
        &self,
        id: Uuid,
        status: DeliveryStatus,
        diagnostic: Option<String>,
    ) -> AppResult<Option<Email>>;
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn append(&self, file: FileAttachment) -> AppResult<FileAttachment>;

    async fn list_for_lead(&self, lead_id: Uuid) -> AppResult<Vec<FileAttachment>>;
}

/// PostgreSQL implementation of the four channel repositories
pub struct CommunicationStore {
    db: DatabaseConnection,
}

impl CommunicationStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// `UPDATE notes SET <column> = <value>, updated_at = <at>`: concurrent
    /// edits of other columns are never overwritten.
    async fn update_column(
        &self,
        id: Uuid,
        column: note::Column,
        value: SimpleExpr,
        at: DateTime<Utc>,
    ) -> AppResult<Note> {
        let result = note::Entity::update_many()
            .col_expr(column, value)
            .col_expr(note::Column::UpdatedAt, Expr::value(at))
            .filter(note::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        note::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Note::from)
            .ok_or(AppError::NotFound)
    }
}

#[async_trait]
impl NoteRepository for CommunicationStore {
    async fn append(&self, note: Note) -> AppResult<Note> {
        let model = note::ActiveModel::from(&note).insert(&self.db).await?;
        Ok(model.into())
    }

    async fn list_for_lead(&self, lead_id: Uuid) -> AppResult<Vec<Note>> {
        let models = note::Entity::find()
            .filter(note::Column::LeadId.eq(lead_id))
            .order_by_asc(note::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Note::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Note>> {
        let model = note::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Note::from))
    }

    async fn update_body(&self, id: Uuid, body: String, at: DateTime<Utc>) -> AppResult<Note> {
        self.update_column(id, note::Column::Body, Expr::value(body), at)
            .await
    }

    async fn set_pinned(&self, id: Uuid, pinned: bool, at: DateTime<Utc>) -> AppResult<Note> {
        self.update_column(id, note::Column::Pinned, Expr::value(pinned), at)
            .await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = note::Entity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }
}

#[async_trait]
impl MessageRepository for CommunicationStore {
    async fn append(&self, message: InternalMessage) -> AppResult<InternalMessage> {
        let model = internal_message::ActiveModel::from(&message)
            .insert(&self.db)
            .await?;
        Ok(model.into())
    }

    async fn list_for_lead(&self, lead_id: Uuid) -> AppResult<Vec<InternalMessage>> {
        let models = internal_message::Entity::find()
            .filter(internal_message::Column::LeadId.eq(lead_id))
            .order_by_asc(internal_message::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(InternalMessage::from).collect())
    }
}

#[async_trait]
impl EmailRepository for CommunicationStore {
    async fn append(&self, email: Email) -> AppResult<Email> {
        email::ActiveModel::from(&email)
            .insert(&self.db)
            .await?
            .try_into()
    }

    async fn list_for_lead(&self, lead_id: Uuid) -> AppResult<Vec<Email>> {
        email::Entity::find()
            .filter(email::Column::LeadId.eq(lead_id))
            .order_by_asc(email::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Email::try_from)
            .collect()
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Email>> {
        email::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Email::try_from)
            .transpose()
    }

    async fn advance_delivery(
        &self,
        id: Uuid,
        status: DeliveryStatus,
        diagnostic: Option<String>,
    ) -> AppResult<Option<Email>> {
        let txn = self.db.begin().await?;

        let current: Email = email::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?
            .try_into()?;

        if !current.delivery_status.can_become(status) {
            return Ok(None);
        }

        let mut active = email::ActiveModel::from(&current);
        active.delivery_status = Set(status.as_str().to_string());
        if diagnostic.is_some() {
            active.diagnostic = Set(diagnostic);
        }
        active.updated_at = Set(Utc::now());

        let updated: Email = active.update(&txn).await?.try_into()?;
        txn.commit().await?;
        Ok(Some(updated))
    }
}

#[async_trait]
impl FileRepository for CommunicationStore {
    async fn append(&self, file: FileAttachment) -> AppResult<FileAttachment> {
        let model = file_attachment::ActiveModel::from(&file)
            .insert(&self.db)
            .await?;
        Ok(model.into())
    }

    async fn list_for_lead(&self, lead_id: Uuid) -> AppResult<Vec<FileAttachment>> {
        let models = file_attachment::Entity::find()
            .filter(file_attachment::Column::LeadId.eq(lead_id))
            .order_by_asc(file_attachment::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(FileAttachment::from).collect())
    }
}
