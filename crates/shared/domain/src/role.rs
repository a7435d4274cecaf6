//! Staff roles and the capability model.
//!
//! A role maps to a fixed baseline [`CapabilitySet`] and a fixed set of
//! visible lead fields. Per-account overrides are layered on top of the
//! baseline (see [`effective_capabilities`]).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{ROLE_MANAGER, ROLE_OPERATOR, ROLE_SUPERADMIN};
use crate::error::DomainError;

/// Staff roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Operator,
    Manager,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => ROLE_SUPERADMIN,
            Role::Manager => ROLE_MANAGER,
            Role::Operator => ROLE_OPERATOR,
        }
    }

    pub fn is_superadmin(&self) -> bool {
        matches!(self, Role::Superadmin)
    }
}

impl FromStr for Role {
    type Err = DomainError;

    /// Unknown values are rejected, never mapped to a default role.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ROLE_SUPERADMIN => Ok(Role::Superadmin),
            ROLE_MANAGER => Ok(Role::Manager),
            ROLE_OPERATOR => Ok(Role::Operator),
            other => Err(DomainError::UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = DomainError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named permission bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    SeePayments,
    ManageUsers,
    SeeAllLeads,
    ExportData,
    DeleteNotes,
    /// Change roles and grant the superadmin role
    ChangeRoles,
    PurgeLeads,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::SeePayments => "can_see_payments",
            Capability::ManageUsers => "can_manage_users",
            Capability::SeeAllLeads => "can_see_all_leads",
            Capability::ExportData => "can_export_data",
            Capability::DeleteNotes => "can_delete_notes",
            Capability::ChangeRoles => "can_change_roles",
            Capability::PurgeLeads => "can_purge_leads",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved capability bits for one staff account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CapabilitySet {
    pub can_see_payments: bool,
    pub can_manage_users: bool,
    pub can_see_all_leads: bool,
    pub can_export_data: bool,
    pub can_delete_notes: bool,
    pub can_change_roles: bool,
    pub can_purge_leads: bool,
}

impl CapabilitySet {
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::SeePayments => self.can_see_payments,
            Capability::ManageUsers => self.can_manage_users,
            Capability::SeeAllLeads => self.can_see_all_leads,
            Capability::ExportData => self.can_export_data,
            Capability::DeleteNotes => self.can_delete_notes,
            Capability::ChangeRoles => self.can_change_roles,
            Capability::PurgeLeads => self.can_purge_leads,
        }
    }
}

/// Per-account overrides of the four overridable bits.
///
/// `None` keeps the role baseline; `Some` replaces it for that bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CapabilityOverrides {
    #[serde(default)]
    pub can_see_payments: Option<bool>,
    #[serde(default)]
    pub can_manage_users: Option<bool>,
    #[serde(default)]
    pub can_see_all_leads: Option<bool>,
    #[serde(default)]
    pub can_export_data: Option<bool>,
}

/// Baseline capabilities of a role. Pure and total.
pub fn resolve(role: Role) -> CapabilitySet {
    match role {
        Role::Superadmin => CapabilitySet {
            can_see_payments: true,
            can_manage_users: true,
            can_see_all_leads: true,
            can_export_data: true,
            can_delete_notes: true,
            can_change_roles: true,
            can_purge_leads: true,
        },
        Role::Manager => CapabilitySet {
            can_see_payments: true,
            can_manage_users: true,
            can_see_all_leads: true,
            can_export_data: true,
            can_delete_notes: true,
            can_change_roles: false,
            can_purge_leads: false,
        },
        Role::Operator => CapabilitySet::default(),
    }
}

/// Role baseline with overrides applied bit by bit, then clamped by the
/// role ceiling: an operator never sees payment data whatever the override.
pub fn effective_capabilities(role: Role, overrides: &CapabilityOverrides) -> CapabilitySet {
    let base = resolve(role);
    let mut caps = CapabilitySet {
        can_see_payments: overrides.can_see_payments.unwrap_or(base.can_see_payments),
        can_manage_users: overrides.can_manage_users.unwrap_or(base.can_manage_users),
        can_see_all_leads: overrides.can_see_all_leads.unwrap_or(base.can_see_all_leads),
        can_export_data: overrides.can_export_data.unwrap_or(base.can_export_data),
        ..base
    };

    if role == Role::Operator {
        caps.can_see_payments = false;
    }

    caps
}

/// Lead attributes addressable by the visibility model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadField {
    Reference,
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
    AssignedTo,
    Comments,
    CreatedAt,
    UpdatedAt,
}

impl LeadField {
    /// Every field in display order.
    pub const ALL: [LeadField; 24] = [
        LeadField::Reference,
        LeadField::Email,
        LeadField::FirstName,
        LeadField::LastName,
        LeadField::Phone,
        LeadField::ClientType,
        LeadField::CompanyName,
        LeadField::RegistrationNumber,
        LeadField::ConnectionType,
        LeadField::ProjectType,
        LeadField::PowerKva,
        LeadField::Address,
        LeadField::PostalCode,
        LeadField::City,
        LeadField::FormType,
        LeadField::FormStep,
        LeadField::Status,
        LeadField::ProjectStatus,
        LeadField::PaymentStatus,
        LeadField::AmountCents,
        LeadField::AssignedTo,
        LeadField::Comments,
        LeadField::CreatedAt,
        LeadField::UpdatedAt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadField::Reference => "reference",
            LeadField::Email => "email",
            LeadField::FirstName => "first_name",
            LeadField::LastName => "last_name",
            LeadField::Phone => "phone",
            LeadField::ClientType => "client_type",
            LeadField::CompanyName => "company_name",
            LeadField::RegistrationNumber => "registration_number",
            LeadField::ConnectionType => "connection_type",
            LeadField::ProjectType => "project_type",
            LeadField::PowerKva => "power_kva",
            LeadField::Address => "address",
            LeadField::PostalCode => "postal_code",
            LeadField::City => "city",
            LeadField::FormType => "form_type",
            LeadField::FormStep => "form_step",
            LeadField::Status => "status",
            LeadField::ProjectStatus => "project_status",
            LeadField::PaymentStatus => "payment_status",
            LeadField::AmountCents => "amount_cents",
            LeadField::AssignedTo => "assigned_to",
            LeadField::Comments => "comments",
            LeadField::CreatedAt => "created_at",
            LeadField::UpdatedAt => "updated_at",
        }
    }

    /// Payment fields.
    pub fn is_payment(&self) -> bool {
        matches!(self, LeadField::PaymentStatus | LeadField::AmountCents)
    }

    /// Fields hidden from operators.
    pub fn is_restricted(&self) -> bool {
        self.is_payment() || matches!(self, LeadField::RegistrationNumber)
    }
}

/// Set of visible lead fields.
pub type FieldSet = BTreeSet<LeadField>;

/// Fields a role may see. Depends on the role alone.
pub fn visible_fields(role: Role) -> FieldSet {
    match role {
        Role::Superadmin | Role::Manager => LeadField::ALL.into_iter().collect(),
        Role::Operator => LeadField::ALL
            .into_iter()
            .filter(|field| !field.is_restricted())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLES: [Role; 3] = [Role::Superadmin, Role::Manager, Role::Operator];

    #[test]
    fn visible_fields_is_a_function_of_role() {
        for role in ROLES {
            assert_eq!(visible_fields(role), visible_fields(role));
        }
    }

    #[test]
    fn restricted_fields_are_monotonic_across_roles() {
        let operator = visible_fields(Role::Operator);
        let manager = visible_fields(Role::Manager);
        let superadmin = visible_fields(Role::Superadmin);

        for field in LeadField::ALL.into_iter().filter(LeadField::is_restricted) {
            assert!(!operator.contains(&field));
            assert!(manager.contains(&field));
            assert!(superadmin.contains(&field));
        }
        assert!(operator.is_subset(&manager));
        assert!(manager.is_subset(&superadmin));
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert_eq!("manager".parse::<Role>(), Ok(Role::Manager));
        assert!(matches!(
            "admin".parse::<Role>(),
            Err(DomainError::UnknownRole(value)) if value == "admin"
        ));
        assert!("".parse::<Role>().is_err());
        assert!("Superadmin".parse::<Role>().is_err());
    }

    #[test]
    fn overrides_replace_baseline_per_bit() {
        let overrides = CapabilityOverrides {
            can_export_data: Some(false),
            ..Default::default()
        };
        let caps = effective_capabilities(Role::Manager, &overrides);

        assert!(!caps.can_export_data);
        assert!(caps.can_see_payments);
        assert!(caps.can_see_all_leads);
    }

    #[test]
    fn operator_overrides_can_widen_scope_but_not_payments() {
        let overrides = CapabilityOverrides {
            can_see_all_leads: Some(true),
            can_see_payments: Some(true),
            ..Default::default()
        };
        let caps = effective_capabilities(Role::Operator, &overrides);

        assert!(caps.can_see_all_leads);
        assert!(!caps.can_see_payments);
        assert!(!caps.can_change_roles);
    }

    #[test]
    fn only_superadmin_changes_roles() {
        assert!(resolve(Role::Superadmin).allows(Capability::ChangeRoles));
        assert!(!resolve(Role::Manager).allows(Capability::ChangeRoles));
        assert!(!resolve(Role::Operator).allows(Capability::ChangeRoles));
    }
}
