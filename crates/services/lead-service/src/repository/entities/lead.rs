//! Lead database entity for SeaORM.

use sea_orm::entity::prelude::*;
use sea_orm::Set;

use common::AppError;
use domain::Lead;

use super::corrupt_row;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "leads")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Natural upsert key, stored normalized
    #[sea_orm(unique)]
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub client_type: Option<String>,
    pub company_name: Option<String>,
    pub registration_number: Option<String>,
    pub connection_type: Option<String>,
    pub project_type: Option<String>,
    pub power_kva: Option<i32>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub form_type: String,
    pub form_step: i32,
    pub status: String,
    pub project_status: String,
    pub payment_status: String,
    pub amount_cents: Option<i64>,
    pub payment_session_ref: Option<String>,
    pub assigned_to: Option<Uuid>,
    #[sea_orm(column_type = "Text", nullable)]
    pub comments: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Child channels reference leads with `ON DELETE CASCADE` (see migrations)
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Convert database model to domain entity
impl TryFrom<Model> for Lead {
    type Error = AppError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let corrupt = |err| corrupt_row("leads", err);

        Ok(Lead {
            id: model.id,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            phone: model.phone,
            client_type: model
                .client_type
                .as_deref()
                .map(str::parse)
                .transpose()
                .map_err(corrupt)?,
            company_name: model.company_name,
            registration_number: model.registration_number,
            connection_type: model.connection_type,
            project_type: model.project_type,
            power_kva: model.power_kva,
            address: model.address,
            postal_code: model.postal_code,
            city: model.city,
            form_type: model.form_type.parse().map_err(corrupt)?,
            form_step: model.form_step,
            status: model.status.parse().map_err(corrupt)?,
            project_status: model.project_status.parse().map_err(corrupt)?,
            payment_status: model.payment_status.parse().map_err(corrupt)?,
            amount_cents: model.amount_cents,
            payment_session_ref: model.payment_session_ref,
            assigned_to: model.assigned_to,
            comments: model.comments,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Every column set, ready for insert or a full-row update.
impl From<&Lead> for ActiveModel {
    fn from(lead: &Lead) -> Self {
        ActiveModel {
            id: Set(lead.id),
            email: Set(lead.email.clone()),
            first_name: Set(lead.first_name.clone()),
            last_name: Set(lead.last_name.clone()),
            phone: Set(lead.phone.clone()),
            client_type: Set(lead.client_type.map(|c| c.as_str().to_string())),
            company_name: Set(lead.company_name.clone()),
            registration_number: Set(lead.registration_number.clone()),
            connection_type: Set(lead.connection_type.clone()),
            project_type: Set(lead.project_type.clone()),
            power_kva: Set(lead.power_kva),
            address: Set(lead.address.clone()),
            postal_code: Set(lead.postal_code.clone()),
            city: Set(lead.city.clone()),
            form_type: Set(lead.form_type.as_str().to_string()),
            form_step: Set(lead.form_step),
            status: Set(lead.status.as_str().to_string()),
            project_status: Set(lead.project_status.as_str().to_string()),
            payment_status: Set(lead.payment_status.as_str().to_string()),
            amount_cents: Set(lead.amount_cents),
            payment_session_ref: Set(lead.payment_session_ref.clone()),
            assigned_to: Set(lead.assigned_to),
            comments: Set(lead.comments.clone()),
            created_at: Set(lead.created_at),
            updated_at: Set(lead.updated_at),
        }
    }
}
