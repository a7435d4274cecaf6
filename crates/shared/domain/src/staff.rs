//! Staff account entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::{effective_capabilities, CapabilityOverrides, CapabilitySet, Role};

/// Staff account. Accounts are deactivated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffAccount {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub overrides: CapabilityOverrides,
    pub active: bool,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StaffAccount {
    pub fn new(email: String, role: Role, department: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            role,
            overrides: CapabilityOverrides::default(),
            active: true,
            department,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn capabilities(&self) -> CapabilitySet {
        effective_capabilities(self.role, &self.overrides)
    }
}

/// Staff creation data transfer object
#[derive(Debug, Clone, Deserialize)]
pub struct NewStaff {
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
    #[serde(default)]
    pub overrides: CapabilityOverrides,
}

/// Staff account as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StaffResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub overrides: CapabilityOverrides,
    /// Effective capabilities after overrides
    pub capabilities: CapabilitySet,
    pub created_at: DateTime<Utc>,
}

impl From<&StaffAccount> for StaffResponse {
    fn from(account: &StaffAccount) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            role: account.role,
            active: account.active,
            department: account.department.clone(),
            overrides: account.overrides,
            capabilities: account.capabilities(),
            created_at: account.created_at,
        }
    }
}

impl From<StaffAccount> for StaffResponse {
    fn from(account: StaffAccount) -> Self {
        StaffResponse::from(&account)
    }
}
