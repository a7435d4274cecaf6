//! Migration: Create the four communication channel tables.
//!
//! Every row references its lead with `ON DELETE CASCADE`, so purging a
//! lead removes its whole thread.

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_staff_and_leads::Leads;

#[derive(DeriveMigrationName)]
pub struct Migration;

fn lead_reference<T: Iden + 'static>(table: T, column: T, name: &str) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .name(name)
        .from(table, column)
        .to(Leads::Table, Leads::Id)
        .on_delete(ForeignKeyAction::Cascade)
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Notes::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Notes::LeadId).uuid().not_null())
                    .col(ColumnDef::new(Notes::AuthorId).uuid().null())
                    .col(ColumnDef::new(Notes::Body).text().not_null())
                    .col(ColumnDef::new(Notes::Pinned).boolean().not_null().default(false))
                    .col(ColumnDef::new(Notes::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Notes::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(&mut lead_reference(Notes::Table, Notes::LeadId, "fk_notes_lead"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InternalMessages::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(InternalMessages::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(InternalMessages::LeadId).uuid().not_null())
                    .col(ColumnDef::new(InternalMessages::AuthorId).uuid().not_null())
                    .col(ColumnDef::new(InternalMessages::Subject).string().not_null())
                    .col(ColumnDef::new(InternalMessages::BodyPlain).text().not_null())
                    .col(ColumnDef::new(InternalMessages::BodyRich).text().null())
                    .col(
                        ColumnDef::new(InternalMessages::Important)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(InternalMessages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(&mut lead_reference(
                        InternalMessages::Table,
                        InternalMessages::LeadId,
                        "fk_internal_messages_lead",
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Emails::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Emails::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Emails::LeadId).uuid().not_null())
                    .col(ColumnDef::new(Emails::Direction).string().not_null())
                    .col(ColumnDef::new(Emails::SenderId).uuid().null())
                    .col(ColumnDef::new(Emails::Counterpart).string().not_null())
                    .col(ColumnDef::new(Emails::Subject).string().not_null())
                    .col(ColumnDef::new(Emails::Body).text().not_null())
                    .col(ColumnDef::new(Emails::DeliveryStatus).string().not_null())
                    .col(ColumnDef::new(Emails::Diagnostic).text().null())
                    .col(ColumnDef::new(Emails::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Emails::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(&mut lead_reference(Emails::Table, Emails::LeadId, "fk_emails_lead"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FileAttachments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(FileAttachments::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(FileAttachments::LeadId).uuid().not_null())
                    .col(ColumnDef::new(FileAttachments::UploaderId).uuid().not_null())
                    .col(ColumnDef::new(FileAttachments::FileName).string().not_null())
                    .col(ColumnDef::new(FileAttachments::SizeBytes).big_integer().not_null())
                    .col(ColumnDef::new(FileAttachments::ContentType).string().not_null())
                    .col(ColumnDef::new(FileAttachments::StorageKey).string().not_null())
                    .col(ColumnDef::new(FileAttachments::Description).text().null())
                    .col(
                        ColumnDef::new(FileAttachments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(&mut lead_reference(
                        FileAttachments::Table,
                        FileAttachments::LeadId,
                        "fk_file_attachments_lead",
                    ))
                    .to_owned(),
            )
            .await?;

        // Threads are read per lead in creation order
        for (name, table) in [
            ("idx_notes_lead_created", "notes"),
            ("idx_internal_messages_lead_created", "internal_messages"),
            ("idx_emails_lead_created", "emails"),
            ("idx_file_attachments_lead_created", "file_attachments"),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Alias::new(table))
                        .col(Alias::new("lead_id"))
                        .col(Alias::new("created_at"))
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FileAttachments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Emails::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InternalMessages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Notes::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Notes {
    Table,
    Id,
    LeadId,
    AuthorId,
    Body,
    Pinned,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum InternalMessages {
    Table,
    Id,
    LeadId,
    AuthorId,
    Subject,
    BodyPlain,
    BodyRich,
    Important,
    CreatedAt,
}

#[derive(Iden)]
enum Emails {
    Table,
    Id,
    LeadId,
    Direction,
    SenderId,
    Counterpart,
    Subject,
    Body,
    DeliveryStatus,
    Diagnostic,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum FileAttachments {
    Table,
    Id,
    LeadId,
    UploaderId,
    FileName,
    SizeBytes,
    ContentType,
    StorageKey,
    Description,
    CreatedAt,
}
