//! Staff service - authentication lookup and account management.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use common::{AppError, AppResult, OptionExt};
use domain::{
    normalize_email, Capability, CapabilityOverrides, NewStaff, Role, StaffAccount, StaffContext,
    StaffResponse,
};

use crate::repository::StaffRepository;

#[async_trait]
pub trait StaffService: Send + Sync {
    /// Resolve a verified token subject (staff email) to a request context.
    /// Unknown and deactivated accounts are `Unauthorized`.
    async fn authenticate(&self, subject: &str) -> AppResult<StaffContext>;

    async fn me(&self, ctx: &StaffContext) -> AppResult<StaffResponse>;

    async fn list(&self, ctx: &StaffContext) -> AppResult<Vec<StaffResponse>>;

    async fn create(&self, ctx: &StaffContext, new_staff: NewStaff) -> AppResult<StaffResponse>;

    async fn change_role(&self, ctx: &StaffContext, id: Uuid, role: Role)
        -> AppResult<StaffResponse>;

    async fn set_active(&self, ctx: &StaffContext, id: Uuid, active: bool)
        -> AppResult<StaffResponse>;

    async fn set_overrides(
        &self,
        ctx: &StaffContext,
        id: Uuid,
        overrides: CapabilityOverrides,
    ) -> AppResult<StaffResponse>;
}

/// Concrete implementation of StaffService.
pub struct StaffManager {
    repo: Arc<dyn StaffRepository>,
}

impl StaffManager {
    pub fn new(repo: Arc<dyn StaffRepository>) -> Self {
        Self { repo }
    }

    async fn target(&self, id: Uuid) -> AppResult<StaffAccount> {
        self.repo.find_by_id(id).await?.ok_or_not_found()
    }
}

#[async_trait]
impl StaffService for StaffManager {
    async fn authenticate(&self, subject: &str) -> AppResult<StaffContext> {
        let email = normalize_email(subject).map_err(|_| AppError::Unauthorized)?;
        let account = self
            .repo
            .find_by_email(&email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !account.active {
            tracing::warn!(staff = %account.email, "Deactivated account attempted access");
            return Err(AppError::Unauthorized);
        }

        Ok(StaffContext::for_account(&account))
    }

    async fn me(&self, ctx: &StaffContext) -> AppResult<StaffResponse> {
        Ok(self.target(ctx.staff_id).await?.into())
    }

    async fn list(&self, ctx: &StaffContext) -> AppResult<Vec<StaffResponse>> {
        ctx.require(Capability::ManageUsers)?;
        let accounts = self.repo.list().await?;
        Ok(accounts.into_iter().map(StaffResponse::from).collect())
    }

    async fn create(&self, ctx: &StaffContext, new_staff: NewStaff) -> AppResult<StaffResponse> {
        ctx.ensure_can_create(new_staff.role)?;
        let email = normalize_email(&new_staff.email)?;

        let department = new_staff
            .department
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let mut account = StaffAccount::new(email, new_staff.role, department);
        account.overrides = new_staff.overrides;

        let account = self.repo.create(account).await?;
        tracing::info!(
            staff = %account.email,
            role = %account.role,
            by = %ctx.email,
            "Staff account created"
        );
        Ok(account.into())
    }

    async fn change_role(
        &self,
        ctx: &StaffContext,
        id: Uuid,
        role: Role,
    ) -> AppResult<StaffResponse> {
        ctx.require(Capability::ChangeRoles)?;
        let target = self.target(id).await?;
        ctx.ensure_can_manage(&target)?;

        let account = self.repo.update_role(id, role).await?;
        tracing::info!(
            staff = %account.email,
            from = %target.role,
            to = %role,
            by = %ctx.email,
            "Role changed"
        );
        Ok(account.into())
    }

    async fn set_active(
        &self,
        ctx: &StaffContext,
        id: Uuid,
        active: bool,
    ) -> AppResult<StaffResponse> {
        let target = self.target(id).await?;
        ctx.ensure_can_set_active(&target, active)?;

        let account = self.repo.set_active(id, active).await?;
        tracing::info!(staff = %account.email, active, by = %ctx.email, "Account activation changed");
        Ok(account.into())
    }

    async fn set_overrides(
        &self,
        ctx: &StaffContext,
        id: Uuid,
        overrides: CapabilityOverrides,
    ) -> AppResult<StaffResponse> {
        let target = self.target(id).await?;
        ctx.ensure_can_manage(&target)?;

        let account = self.repo.set_overrides(id, overrides).await?;
        tracing::info!(staff = %account.email, by = %ctx.email, "Capability overrides updated");
        Ok(account.into())
    }
}
