//! Staff account repository.
//!
//! Accounts are deactivated, never deleted.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::staff_account::{self, ActiveModel, Entity as StaffEntity};
use common::{AppError, AppResult};
use domain::{CapabilityOverrides, Role, StaffAccount};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait StaffRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<StaffAccount>>;

    /// Lookup by normalized email.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<StaffAccount>>;

    /// Every account, active or not, ordered by email.
    async fn list(&self) -> AppResult<Vec<StaffAccount>>;

    /// Insert a new account. A taken email is a `Conflict`.
    async fn create(&self, account: StaffAccount) -> AppResult<StaffAccount>;

    async fn update_role(&self, id: Uuid, role: Role) -> AppResult<StaffAccount>;

    async fn set_active(&self, id: Uuid, active: bool) -> AppResult<StaffAccount>;

    async fn set_overrides(
        &self,
        id: Uuid,
        overrides: CapabilityOverrides,
    ) -> AppResult<StaffAccount>;
}

/// PostgreSQL implementation of StaffRepository
pub struct StaffStore {
    db: DatabaseConnection,
}

impl StaffStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn load(&self, id: Uuid) -> AppResult<ActiveModel> {
        let model = StaffEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(model.into())
    }

    async fn save(&self, mut active: ActiveModel) -> AppResult<StaffAccount> {
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await?.try_into()
    }
}

#[async_trait]
impl StaffRepository for StaffStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<StaffAccount>> {
        StaffEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(StaffAccount::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<StaffAccount>> {
        StaffEntity::find()
            .filter(staff_account::Column::Email.eq(email))
            .one(&self.db)
            .await?
            .map(StaffAccount::try_from)
            .transpose()
    }

    async fn list(&self) -> AppResult<Vec<StaffAccount>> {
        StaffEntity::find()
            .order_by_asc(staff_account::Column::Email)
            .all(&self.db)
            .await?
            .into_iter()
            .map(StaffAccount::try_from)
            .collect()
    }

    async fn create(&self, account: StaffAccount) -> AppResult<StaffAccount> {
        let existing = StaffEntity::find()
            .filter(staff_account::Column::Email.eq(account.email.as_str()))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(AppError::conflict(format!(
                "A staff account already exists for {}",
                account.email
            )));
        }

        ActiveModel::from(&account).insert(&self.db).await?.try_into()
    }

    async fn update_role(&self, id: Uuid, role: Role) -> AppResult<StaffAccount> {
        let mut active = self.load(id).await?;
        active.role = Set(role.as_str().to_string());
        self.save(active).await
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> AppResult<StaffAccount> {
        let mut active = self.load(id).await?;
        active.active = Set(is_active);
        self.save(active).await
    }

    async fn set_overrides(
        &self,
        id: Uuid,
        overrides: CapabilityOverrides,
    ) -> AppResult<StaffAccount> {
        let mut active = self.load(id).await?;
        active.can_see_payments = Set(overrides.can_see_payments);
        active.can_manage_users = Set(overrides.can_manage_users);
        active.can_see_all_leads = Set(overrides.can_see_all_leads);
        active.can_export_data = Set(overrides.can_export_data);
        self.save(active).await
    }
}
