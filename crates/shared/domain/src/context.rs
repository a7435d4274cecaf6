//! Request-scoped caller context.
//!
//! Built once per request from the authenticated [`StaffAccount`] and passed
//! explicitly to every core operation. Capability checks go through here so
//! call sites never branch on role names.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::filter::Scope;
use crate::lead::Lead;
use crate::role::{visible_fields, Capability, CapabilitySet, FieldSet, LeadField, Role};
use crate::staff::StaffAccount;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffContext {
    pub staff_id: Uuid,
    pub email: String,
    pub role: Role,
    pub capabilities: CapabilitySet,
    pub visible_fields: FieldSet,
    /// Client-chosen id echoed in the change events this request causes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl StaffContext {
    pub fn for_account(account: &StaffAccount) -> Self {
        let capabilities = account.capabilities();
        let mut fields = visible_fields(account.role);
        if !capabilities.can_see_payments {
            fields.retain(|field| !field.is_payment());
        }

        Self {
            staff_id: account.id,
            email: account.email.clone(),
            role: account.role,
            capabilities,
            visible_fields: fields,
            correlation_id: None,
        }
    }

    pub fn with_correlation(mut self, correlation_id: Option<Uuid>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.allows(capability)
    }

    /// Fail closed with a reason for the server log.
    pub fn require(&self, capability: Capability) -> DomainResult<()> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(DomainError::denied(format!(
                "{} ({}) lacks {}",
                self.email, self.role, capability
            )))
        }
    }

    /// Either capability is enough.
    pub fn require_any(&self, first: Capability, second: Capability) -> DomainResult<()> {
        if self.can(first) || self.can(second) {
            Ok(())
        } else {
            Err(DomainError::denied(format!(
                "{} ({}) lacks {} and {}",
                self.email, self.role, first, second
            )))
        }
    }

    pub fn sees(&self, field: LeadField) -> bool {
        self.visible_fields.contains(&field)
    }

    /// Base scope that search always applies before user filters.
    pub fn scope(&self) -> Scope {
        if self.can(Capability::SeeAllLeads) {
            Scope::All
        } else {
            Scope::AssignedTo(self.staff_id)
        }
    }

    pub fn can_view(&self, lead: &Lead) -> bool {
        self.scope().admits(lead)
    }

    /// The lead must be within scope. Out-of-scope leads are reported as
    /// missing so their existence does not leak.
    pub fn ensure_can_view(&self, lead: &Lead) -> DomainResult<()> {
        if self.can_view(lead) {
            Ok(())
        } else {
            Err(DomainError::not_found("lead"))
        }
    }

    /// Email delivery diagnostics are hidden from operators unless enabled.
    pub fn sees_delivery_diagnostics(&self, operators_allowed: bool) -> bool {
        self.role != Role::Operator || operators_allowed
    }

    /// Creating an account. Only a superadmin may mint another superadmin.
    pub fn ensure_can_create(&self, role: Role) -> DomainResult<()> {
        self.require(Capability::ManageUsers)?;
        if role.is_superadmin() {
            self.require(Capability::ChangeRoles)?;
        }
        Ok(())
    }

    /// Editing an existing account. Superadmin accounts are only editable by
    /// superadmins.
    pub fn ensure_can_manage(&self, target: &StaffAccount) -> DomainResult<()> {
        self.require(Capability::ManageUsers)?;
        if target.role.is_superadmin() && !self.role.is_superadmin() {
            return Err(DomainError::denied(format!(
                "{} ({}) cannot modify superadmin {}",
                self.email, self.role, target.email
            )));
        }
        Ok(())
    }

    /// Toggling `active`. Nobody may deactivate their own account.
    pub fn ensure_can_set_active(&self, target: &StaffAccount, active: bool) -> DomainResult<()> {
        if !active && target.id == self.staff_id {
            return Err(DomainError::denied(format!(
                "{} attempted to deactivate their own account",
                self.email
            )));
        }
        self.ensure_can_manage(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::CapabilityOverrides;

    fn account(role: Role) -> StaffAccount {
        StaffAccount::new(format!("{role}@x.fr"), role, None)
    }

    #[test]
    fn operator_scope_is_own_leads() {
        let operator = account(Role::Operator);
        let ctx = StaffContext::for_account(&operator);
        assert_eq!(ctx.scope(), Scope::AssignedTo(operator.id));
        assert!(!ctx.sees(LeadField::AmountCents));
        assert!(!ctx.sees(LeadField::RegistrationNumber));
    }

    #[test]
    fn manager_override_hides_payments() {
        let mut manager = account(Role::Manager);
        manager.overrides = CapabilityOverrides {
            can_see_payments: Some(false),
            ..Default::default()
        };
        let ctx = StaffContext::for_account(&manager);

        assert!(!ctx.sees(LeadField::PaymentStatus));
        assert!(ctx.sees(LeadField::RegistrationNumber));
    }

    #[test]
    fn self_deactivation_is_denied() {
        let superadmin = account(Role::Superadmin);
        let ctx = StaffContext::for_account(&superadmin);

        assert!(matches!(
            ctx.ensure_can_set_active(&superadmin, false),
            Err(DomainError::PermissionDenied(_))
        ));
        assert!(ctx.ensure_can_set_active(&superadmin, true).is_ok());
    }

    #[test]
    fn managers_cannot_mint_or_edit_superadmins() {
        let ctx = StaffContext::for_account(&account(Role::Manager));

        assert!(ctx.ensure_can_create(Role::Operator).is_ok());
        assert!(ctx.ensure_can_create(Role::Superadmin).is_err());
        assert!(ctx.ensure_can_manage(&account(Role::Superadmin)).is_err());
        assert!(ctx.ensure_can_manage(&account(Role::Operator)).is_ok());
    }
}
