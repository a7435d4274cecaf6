//! Migration: Create the payment_sessions table.
//!
//! One row per checkout session ever opened, so a confirmation for an older
//! session still finds its lead.

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_staff_and_leads::Leads;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PaymentSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentSessions::SessionRef)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PaymentSessions::LeadId).uuid().not_null())
                    .col(ColumnDef::new(PaymentSessions::AmountCents).big_integer().not_null())
                    .col(
                        ColumnDef::new(PaymentSessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_sessions_lead")
                            .from(PaymentSessions::Table, PaymentSessions::LeadId)
                            .to(Leads::Table, Leads::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payment_sessions_lead_id")
                    .table(PaymentSessions::Table)
                    .col(PaymentSessions::LeadId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PaymentSessions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PaymentSessions {
    Table,
    SessionRef,
    LeadId,
    AmountCents,
    CreatedAt,
}
