//! Migration: Create staff_accounts and leads tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StaffAccounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StaffAccounts::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(StaffAccounts::Email)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(StaffAccounts::Role).string().not_null())
                    .col(ColumnDef::new(StaffAccounts::CanSeePayments).boolean().null())
                    .col(ColumnDef::new(StaffAccounts::CanManageUsers).boolean().null())
                    .col(ColumnDef::new(StaffAccounts::CanSeeAllLeads).boolean().null())
                    .col(ColumnDef::new(StaffAccounts::CanExportData).boolean().null())
                    .col(
                        ColumnDef::new(StaffAccounts::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(StaffAccounts::Department).string().null())
                    .col(
                        ColumnDef::new(StaffAccounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StaffAccounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Leads::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Leads::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Leads::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Leads::FirstName).string().null())
                    .col(ColumnDef::new(Leads::LastName).string().null())
                    .col(ColumnDef::new(Leads::Phone).string().null())
                    .col(ColumnDef::new(Leads::ClientType).string().null())
                    .col(ColumnDef::new(Leads::CompanyName).string().null())
                    .col(ColumnDef::new(Leads::RegistrationNumber).string().null())
                    .col(ColumnDef::new(Leads::ConnectionType).string().null())
                    .col(ColumnDef::new(Leads::ProjectType).string().null())
                    .col(ColumnDef::new(Leads::PowerKva).integer().null())
                    .col(ColumnDef::new(Leads::Address).string().null())
                    .col(ColumnDef::new(Leads::PostalCode).string_len(5).null())
                    .col(ColumnDef::new(Leads::City).string().null())
                    .col(ColumnDef::new(Leads::FormType).string().not_null())
                    .col(ColumnDef::new(Leads::FormStep).integer().not_null().default(0))
                    .col(ColumnDef::new(Leads::Status).string().not_null())
                    .col(ColumnDef::new(Leads::ProjectStatus).string().not_null())
                    .col(ColumnDef::new(Leads::PaymentStatus).string().not_null())
                    .col(ColumnDef::new(Leads::AmountCents).big_integer().null())
                    .col(ColumnDef::new(Leads::PaymentSessionRef).string().null())
                    .col(ColumnDef::new(Leads::AssignedTo).uuid().null())
                    .col(ColumnDef::new(Leads::Comments).text().null())
                    .col(
                        ColumnDef::new(Leads::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Leads::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_leads_assigned_to")
                            .from(Leads::Table, Leads::AssignedTo)
                            .to(StaffAccounts::Table, StaffAccounts::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_leads_status", Leads::Status),
            ("idx_leads_assigned_to", Leads::AssignedTo),
            ("idx_leads_created_at", Leads::CreatedAt),
            ("idx_leads_postal_code", Leads::PostalCode),
            ("idx_leads_payment_session_ref", Leads::PaymentSessionRef),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Leads::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Leads::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(StaffAccounts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum StaffAccounts {
    Table,
    Id,
    Email,
    Role,
    CanSeePayments,
    CanManageUsers,
    CanSeeAllLeads,
    CanExportData,
    Active,
    Department,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub(super) enum Leads {
    Table,
    Id,
    Email,
    FirstName,
    LastName,
    Phone,
    ClientType,
    CompanyName,
    RegistrationNumber,
    ConnectionType,
    ProjectType,
    PowerKva,
    Address,
    PostalCode,
    City,
    FormType,
    FormStep,
    Status,
    ProjectStatus,
    PaymentStatus,
    AmountCents,
    PaymentSessionRef,
    AssignedTo,
    Comments,
    CreatedAt,
    UpdatedAt,
}
