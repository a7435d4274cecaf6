//! Staff account database entity for SeaORM.

use sea_orm::entity::prelude::*;
use sea_orm::Set;

use common::AppError;
use domain::{CapabilityOverrides, StaffAccount};

use super::corrupt_row;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "staff_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub role: String,
    /// Overrides: NULL falls back to the role baseline
    pub can_see_payments: Option<bool>,
    pub can_manage_users: Option<bool>,
    pub can_see_all_leads: Option<bool>,
    pub can_export_data: Option<bool>,
    pub active: bool,
    pub department: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for StaffAccount {
    type Error = AppError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(StaffAccount {
            id: model.id,
            email: model.email,
            role: model
                .role
                .parse()
                .map_err(|err| corrupt_row("staff_accounts", err))?,
            overrides: CapabilityOverrides {
                can_see_payments: model.can_see_payments,
                can_manage_users: model.can_manage_users,
                can_see_all_leads: model.can_see_all_leads,
                can_export_data: model.can_export_data,
            },
            active: model.active,
            department: model.department,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl From<&StaffAccount> for ActiveModel {
    fn from(account: &StaffAccount) -> Self {
        ActiveModel {
            id: Set(account.id),
            email: Set(account.email.clone()),
            role: Set(account.role.as_str().to_string()),
            can_see_payments: Set(account.overrides.can_see_payments),
            can_manage_users: Set(account.overrides.can_manage_users),
            can_see_all_leads: Set(account.overrides.can_see_all_leads),
            can_export_data: Set(account.overrides.can_export_data),
            active: Set(account.active),
            department: Set(account.department.clone()),
            created_at: Set(account.created_at),
            updated_at: Set(account.updated_at),
        }
    }
}
