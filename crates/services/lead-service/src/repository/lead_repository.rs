//! Lead repository.
//!
//! Identity-keyed writes (`upsert_by_identity`, `record_payment`) run as one
//! transaction holding a row lock, with the merge itself decided by the
//! domain model. Staff mutations commit together with their audit note.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use super::entities::lead::{self, ActiveModel, Entity as LeadEntity};
use super::entities::staff_account::Entity as StaffEntity;
use super::entities::{note, payment_session};
use common::{AppError, AppResult, PaginationParams};
use domain::{
    AssignmentFilter, Lead, LeadPatch, LeadQuery, LeadStatus, Note, PaymentDecision,
    PaymentStatus, ProjectStatus, Scope, SubmissionKind,
};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Result of an identity-keyed funnel write.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    pub lead: Lead,
    /// The row did not exist before this call
    pub created: bool,
    /// This call moved the lead into `submitted`
    pub newly_submitted: bool,
    /// Any stored field differs from before
    pub changed: bool,
}

/// Result of applying a provider payment confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRecord {
    pub lead: Lead,
    pub decision: PaymentDecision,
}

/// Staff-side field updates. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadUpdate {
    pub status: Option<LeadStatus>,
    pub project_status: Option<ProjectStatus>,
}

impl LeadUpdate {
    pub fn apply_to(&self, lead: &mut Lead) {
        if let Some(status) = self.status {
            lead.status = status;
        }
        if let Some(project_status) = self.project_status {
            lead.project_status = project_status;
        }
    }
}

/// Lead repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Create the lead for `email` if absent, then merge `patch` into it.
    /// A failed validation leaves no trace, not even the new row.
    async fn upsert_by_identity(
        &self,
        email: &str,
        patch: &LeadPatch,
        kind: SubmissionKind,
    ) -> AppResult<UpsertOutcome>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Lead>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Lead>>;

    /// Lead owning the checkout session `session_ref`, including sessions
    /// superseded by a newer one.
    async fn find_by_session_ref(&self, session_ref: &str) -> AppResult<Option<Lead>>;

    /// Record a newly opened checkout session and make it the lead's
    /// current one.
    async fn open_payment_session(
        &self,
        id: Uuid,
        session_ref: &str,
        amount_cents: i64,
    ) -> AppResult<Lead>;

    /// One page of leads matching `scope` AND `query`, newest first, with
    /// the total match count.
    async fn fetch_filtered(
        &self,
        query: &LeadQuery,
        scope: Scope,
        viewer: Uuid,
        page: PaginationParams,
    ) -> AppResult<(Vec<Lead>, u64)>;

    /// Last-write-wins per field. `audit` is stored in the same
    /// transaction.
    async fn update_fields(&self, id: Uuid, update: LeadUpdate, audit: Note) -> AppResult<Lead>;

    /// Set or clear `assigned_to`, storing `audit` with it. Refuses
    /// (`Conflict`) a target that is missing or inactive at write time.
    async fn assign(&self, id: Uuid, assignee: Option<Uuid>, audit: Note) -> AppResult<Lead>;

    /// Apply a payment confirmation under a row lock. `audit` is stored
    /// only when the confirmation is applied.
    async fn record_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        amount_cents: i64,
        audit: Note,
    ) -> AppResult<PaymentRecord>;

    /// Delete the lead; channel rows go with it.
    async fn purge(&self, id: Uuid) -> AppResult<()>;
}

/// PostgreSQL implementation of LeadRepository
pub struct LeadStore {
    db: DatabaseConnection,
}

impl LeadStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn lowered(column: lead::Column) -> Expr {
    Expr::expr(Func::lower(Expr::col(column)))
}

/// Translate scope and facets into one SQL condition.
fn filter_condition(query: &LeadQuery, scope: Scope, viewer: Uuid) -> Condition {
    let now = Utc::now();
    let mut condition = Condition::all();

    // Scope first: no facet can widen it
    if let Scope::AssignedTo(staff_id) = scope {
        condition = condition.add(lead::Column::AssignedTo.eq(staff_id));
    }

    if let Some(text) = query.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", text.to_lowercase());
        condition = condition.add(
            Condition::any()
                .add(lowered(lead::Column::FirstName).like(pattern.clone()))
                .add(lowered(lead::Column::LastName).like(pattern.clone()))
                .add(lowered(lead::Column::Email).like(pattern.clone()))
                .add(lowered(lead::Column::Phone).like(pattern.clone()))
                .add(lowered(lead::Column::CompanyName).like(pattern)),
        );
    }
    if let Some(status) = query.status {
        condition = condition.add(lead::Column::Status.eq(status.as_str()));
    }
    if let Some(form_type) = query.form_type {
        condition = condition.add(lead::Column::FormType.eq(form_type.as_str()));
    }
    condition = match query.assignment {
        AssignmentFilter::Any => condition,
        AssignmentFilter::Unassigned => condition.add(lead::Column::AssignedTo.is_null()),
        AssignmentFilter::Me => condition.add(lead::Column::AssignedTo.eq(viewer)),
        AssignmentFilter::Staff(staff_id) => condition.add(lead::Column::AssignedTo.eq(staff_id)),
    };
    if let Some(bucket) = query.created {
        let (from, to) = bucket.bounds(now);
        if let Some(from) = from {
            condition = condition.add(lead::Column::CreatedAt.gte(from));
        }
        if let Some(to) = to {
            condition = condition.add(lead::Column::CreatedAt.lte(to));
        }
    }
    if let Some(city) = query.city.as_deref() {
        condition = condition.add(lowered(lead::Column::City).eq(city.trim().to_lowercase()));
    }
    if let Some(code) = query.postal_code.as_deref() {
        condition = condition.add(lead::Column::PostalCode.eq(code.trim()));
    }

    condition
}

#[async_trait]
impl LeadRepository for LeadStore {
    async fn upsert_by_identity(
        &self,
        email: &str,
        patch: &LeadPatch,
        kind: SubmissionKind,
    ) -> AppResult<UpsertOutcome> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let skeleton = Lead::skeleton(Uuid::new_v4(), email.to_string(), now);
        let inserted = LeadEntity::insert(ActiveModel::from(&skeleton))
            .on_conflict(OnConflict::column(lead::Column::Email).do_nothing().to_owned())
            .exec_without_returning(&txn)
            .await?;

        let current: Lead = LeadEntity::find()
            .filter(lead::Column::Email.eq(email))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::internal(format!("lead row for {} vanished", email)))?
            .try_into()?;

        // Validation failure drops the transaction, rolling back the insert
        let advance = current.advance(patch, kind, now)?;
        if advance.changed {
            ActiveModel::from(&advance.lead).update(&txn).await?;
        }
        txn.commit().await?;

        Ok(UpsertOutcome {
            lead: advance.lead,
            created: inserted == 1,
            newly_submitted: advance.newly_submitted,
            changed: advance.changed,
        })
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Lead>> {
        LeadEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Lead::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Lead>> {
        LeadEntity::find()
            .filter(lead::Column::Email.eq(email))
            .one(&self.db)
            .await?
            .map(Lead::try_from)
            .transpose()
    }

    async fn find_by_session_ref(&self, session_ref: &str) -> AppResult<Option<Lead>> {
        let session = payment_session::Entity::find_by_id(session_ref.to_string())
            .one(&self.db)
            .await?;

        match session {
            Some(session) => self.find_by_id(session.lead_id).await,
            None => Ok(None),
        }
    }

    async fn open_payment_session(
        &self,
        id: Uuid,
        session_ref: &str,
        amount_cents: i64,
    ) -> AppResult<Lead> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let current: Lead = LeadEntity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?
            .try_into()?;

        payment_session::ActiveModel {
            session_ref: Set(session_ref.to_string()),
            lead_id: Set(id),
            amount_cents: Set(amount_cents),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut active = ActiveModel::from(&current);
        active.payment_session_ref = Set(Some(session_ref.to_string()));
        active.amount_cents = Set(Some(amount_cents));
        active.updated_at = Set(now);

        let lead: Lead = active.update(&txn).await?.try_into()?;
        txn.commit().await?;
        Ok(lead)
    }

    async fn fetch_filtered(
        &self,
        query: &LeadQuery,
        scope: Scope,
        viewer: Uuid,
        page: PaginationParams,
    ) -> AppResult<(Vec<Lead>, u64)> {
        let select = LeadEntity::find().filter(filter_condition(query, scope, viewer));

        let total = select.clone().count(&self.db).await?;
        let leads = select
            .order_by_desc(lead::Column::CreatedAt)
            .order_by_asc(lead::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await?
            .into_iter()
            .map(Lead::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((leads, total))
    }

    async fn update_fields(&self, id: Uuid, update: LeadUpdate, audit: Note) -> AppResult<Lead> {
        let txn = self.db.begin().await?;

        let model = LeadEntity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = model.into();
        if let Some(status) = update.status {
            active.status = Set(status.as_str().to_string());
        }
        if let Some(project_status) = update.project_status {
            active.project_status = Set(project_status.as_str().to_string());
        }
        active.updated_at = Set(Utc::now());

        let lead: Lead = active.update(&txn).await?.try_into()?;
        note::ActiveModel::from(&audit).insert(&txn).await?;
        txn.commit().await?;
        Ok(lead)
    }

    async fn assign(&self, id: Uuid, assignee: Option<Uuid>, audit: Note) -> AppResult<Lead> {
        let txn = self.db.begin().await?;

        if let Some(staff_id) = assignee {
            // Shared lock keeps the target from being deactivated mid-write
            let target = StaffEntity::find_by_id(staff_id)
                .lock_shared()
                .one(&txn)
                .await?;
            match target {
                Some(account) if account.active => {}
                Some(account) => {
                    return Err(AppError::conflict(format!(
                        "{} has just been deactivated",
                        account.email
                    )))
                }
                None => return Err(AppError::conflict("The selected staff account no longer exists")),
            }
        }

        let current: Lead = LeadEntity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?
            .try_into()?;

        let mut active: ActiveModel = ActiveModel::from(&current);
        active.assigned_to = Set(assignee);
        active.status = Set(current
            .status
            .after_assignment(assignee.is_some())
            .as_str()
            .to_string());
        active.updated_at = Set(Utc::now());

        let lead: Lead = active.update(&txn).await?.try_into()?;
        note::ActiveModel::from(&audit).insert(&txn).await?;
        txn.commit().await?;
        Ok(lead)
    }

    async fn record_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        amount_cents: i64,
        audit: Note,
    ) -> AppResult<PaymentRecord> {
        let txn = self.db.begin().await?;

        let current: Lead = LeadEntity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?
            .try_into()?;

        let decision = current.payment_decision(status, amount_cents);
        let lead = match decision {
            PaymentDecision::Duplicate => current,
            PaymentDecision::Apply => {
                let mut active = ActiveModel::from(&current);
                active.payment_status = Set(status.as_str().to_string());
                active.amount_cents = Set(Some(amount_cents));
                active.updated_at = Set(Utc::now());
                let lead: Lead = active.update(&txn).await?.try_into()?;
                note::ActiveModel::from(&audit).insert(&txn).await?;
                lead
            }
        };
        txn.commit().await?;

        Ok(PaymentRecord { lead, decision })
    }

    async fn purge(&self, id: Uuid) -> AppResult<()> {
        let result = LeadEntity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }
}
