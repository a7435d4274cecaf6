//! Lead service - the funnel and the lead lifecycle.
//!
//! Public funnel writes go through the identity-keyed upsert. Staff
//! mutations take an explicit [`StaffContext`] and commit one system note
//! on the lead's timeline together with each transition.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use common::{AppError, AppResult, OptionExt};
use domain::{
    is_postal_code, normalize_email, Capability, ChangeEvent, ChangeKind, Channel, Lead,
    LeadPatch, LeadStatus, Note, PaymentDecision, PaymentStatus, ProjectStatus, StaffContext,
    SubmissionKind,
};

use super::{NotificationDispatcher, RealtimeHub};
use crate::infra::{AddressLookup, Notification};
use crate::repository::{LeadRepository, LeadUpdate, StaffRepository, Stores};

/// What the postal-code lookup did for a funnel step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "resolution", content = "cities", rename_all = "snake_case")]
pub enum PostalResolution {
    /// No postal code to resolve, or the city was sent explicitly
    NotRequested,
    /// Exactly one city; it was filled in
    Resolved(String),
    /// Several cities share the code; the client must pick one
    Ambiguous(Vec<String>),
    /// The code matched nothing
    Unknown,
    /// Lookup failed; the step was saved without it
    Unavailable,
}

/// Result of a funnel step or final submission.
#[derive(Debug, Clone, PartialEq)]
pub struct FunnelOutcome {
    pub lead: Lead,
    pub created: bool,
    pub newly_submitted: bool,
    pub postal: PostalResolution,
}

/// Result of a provider payment confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "lead", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Recorded(Lead),
    /// A repeat of an already applied confirmation; nothing changed
    DuplicateDeliveryIgnored(Lead),
}

impl PaymentOutcome {
    pub fn lead(&self) -> &Lead {
        match self {
            PaymentOutcome::Recorded(lead) | PaymentOutcome::DuplicateDeliveryIgnored(lead) => lead,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, PaymentOutcome::DuplicateDeliveryIgnored(_))
    }
}

/// Lead lifecycle operations.
#[async_trait]
pub trait LeadService: Send + Sync {
    /// Save one funnel step for `email`, creating the lead if needed.
    async fn create_or_advance(&self, email: &str, patch: LeadPatch) -> AppResult<FunnelOutcome>;

    /// Merge the last step and submit. Missing required fields reject the
    /// whole call without touching the record.
    async fn finalize(&self, email: &str, patch: LeadPatch) -> AppResult<FunnelOutcome>;

    /// Cities for a French postal code.
    async fn cities_for(&self, postal_code: &str) -> AppResult<Vec<String>>;

    /// A lead the caller is allowed to see.
    async fn get(&self, ctx: &StaffContext, id: Uuid) -> AppResult<Lead>;

    /// Assign to the staff account with `staff_email`, or clear with `None`.
    async fn assign(
        &self,
        ctx: &StaffContext,
        id: Uuid,
        staff_email: Option<String>,
    ) -> AppResult<Lead>;

    async fn set_status(&self, ctx: &StaffContext, id: Uuid, status: LeadStatus)
        -> AppResult<Lead>;

    async fn set_project_status(
        &self,
        ctx: &StaffContext,
        id: Uuid,
        project_status: ProjectStatus,
    ) -> AppResult<Lead>;

    /// Move a resolved lead back to `assigned`.
    async fn reopen(&self, ctx: &StaffContext, id: Uuid) -> AppResult<Lead>;

    /// Apply a payment result from the provider boundary. Safe to repeat.
    async fn record_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        amount_cents: i64,
    ) -> AppResult<PaymentOutcome>;

    /// Compliance delete of the lead and every channel item.
    async fn purge(&self, ctx: &StaffContext, id: Uuid) -> AppResult<()>;
}

/// Concrete implementation of LeadService.
pub struct LeadManager {
    leads: Arc<dyn LeadRepository>,
    staff: Arc<dyn StaffRepository>,
    geo: Arc<dyn AddressLookup>,
    notifications: NotificationDispatcher,
    realtime: RealtimeHub,
    default_fee_cents: i64,
}

impl LeadManager {
    pub fn new(
        stores: &Stores,
        geo: Arc<dyn AddressLookup>,
        notifications: NotificationDispatcher,
        realtime: RealtimeHub,
        default_fee_cents: i64,
    ) -> Self {
        Self {
            leads: stores.leads.clone(),
            staff: stores.staff.clone(),
            geo,
            notifications,
            realtime,
            default_fee_cents,
        }
    }

    async fn submit(
        &self,
        email: &str,
        patch: LeadPatch,
        kind: SubmissionKind,
    ) -> AppResult<FunnelOutcome> {
        let email = normalize_email(email)?;
        let mut patch = patch.normalized();
        let postal = self.resolve_postal(&mut patch).await;

        let outcome = self.leads.upsert_by_identity(&email, &patch, kind).await?;
        let lead = outcome.lead;

        if outcome.created {
            tracing::info!(lead_id = %lead.id, "Lead created from funnel");
            self.publish_lead(ChangeKind::Insert, &lead, None, None);
        } else if outcome.changed {
            self.publish_lead(ChangeKind::Update, &lead, None, None);
        }

        if outcome.newly_submitted {
            tracing::info!(lead_id = %lead.id, reference = %lead.reference(), "Lead submitted");
            self.notifications
                .dispatch(Notification::NewLead {
                    lead_id: lead.id,
                    reference: lead.reference(),
                    name: lead.full_name(),
                    email: lead.email.clone(),
                })
                .await;
        }

        Ok(FunnelOutcome {
            lead,
            created: outcome.created,
            newly_submitted: outcome.newly_submitted,
            postal,
        })
    }

    /// Fill `city` when the postal code names exactly one. Lookup failures
    /// never fail the step.
    async fn resolve_postal(&self, patch: &mut LeadPatch) -> PostalResolution {
        let code = match (&patch.postal_code, &patch.city) {
            (Some(code), None) if is_postal_code(code) => code.clone(),
            _ => return PostalResolution::NotRequested,
        };

        match self.geo.cities_for_postal_code(&code).await {
            Ok(cities) => match cities.as_slice() {
                [] => PostalResolution::Unknown,
                [city] => {
                    patch.city = Some(city.clone());
                    PostalResolution::Resolved(city.clone())
                }
                _ => PostalResolution::Ambiguous(cities),
            },
            Err(e) => {
                tracing::warn!(postal_code = %code, error = %e, "Postal code lookup failed");
                PostalResolution::Unavailable
            }
        }
    }

    async fn visible_lead(&self, ctx: &StaffContext, id: Uuid) -> AppResult<Lead> {
        let lead = self.leads.find_by_id(id).await?.ok_or_not_found()?;
        ctx.ensure_can_view(&lead)?;
        Ok(lead)
    }

    /// Announce a committed audit note on the lead's thread.
    fn announce_audit(&self, lead: &Lead, note: &Note, correlation_id: Option<Uuid>) {
        self.realtime.publish(
            ChangeEvent::item(
                ChangeKind::Insert,
                lead.id,
                Channel::Note,
                note.id,
                lead.assigned_to.into_iter().collect(),
            )
            .with_correlation(correlation_id),
        );
    }

    fn publish_lead(
        &self,
        kind: ChangeKind,
        lead: &Lead,
        previous_assignee: Option<Uuid>,
        correlation_id: Option<Uuid>,
    ) {
        let mut assignees: Vec<Uuid> = previous_assignee.into_iter().collect();
        if let Some(current) = lead.assigned_to {
            if !assignees.contains(&current) {
                assignees.push(current);
            }
        }
        self.realtime
            .publish(ChangeEvent::lead(kind, lead.id, assignees).with_correlation(correlation_id));
    }
}

#[async_trait]
impl LeadService for LeadManager {
    async fn create_or_advance(&self, email: &str, patch: LeadPatch) -> AppResult<FunnelOutcome> {
        self.submit(email, patch, SubmissionKind::Step).await
    }

    async fn finalize(&self, email: &str, patch: LeadPatch) -> AppResult<FunnelOutcome> {
        let kind = SubmissionKind::Final {
            fee_cents: self.default_fee_cents,
        };
        self.submit(email, patch, kind).await
    }

    async fn cities_for(&self, postal_code: &str) -> AppResult<Vec<String>> {
        let code = postal_code.trim();
        if !is_postal_code(code) {
            return Err(AppError::invalid_field(
                "postal_code",
                "Postal code must be five digits",
            ));
        }
        self.geo.cities_for_postal_code(code).await
    }

    async fn get(&self, ctx: &StaffContext, id: Uuid) -> AppResult<Lead> {
        self.visible_lead(ctx, id).await
    }

    async fn assign(
        &self,
        ctx: &StaffContext,
        id: Uuid,
        staff_email: Option<String>,
    ) -> AppResult<Lead> {
        ctx.require_any(Capability::ManageUsers, Capability::SeeAllLeads)?;
        let lead = self.visible_lead(ctx, id).await?;

        let target = match staff_email {
            Some(email) => {
                let email = normalize_email(&email)
                    .map_err(|_| AppError::invalid_field("staff_email", "Invalid staff email"))?;
                let account = self.staff.find_by_email(&email).await?.ok_or_else(|| {
                    AppError::invalid_field("staff_email", "No staff account with this email")
                })?;
                if !account.active {
                    return Err(AppError::conflict(format!(
                        "{} is deactivated",
                        account.email
                    )));
                }
                Some(account)
            }
            None => None,
        };

        if lead.assigned_to == target.as_ref().map(|account| account.id) {
            return Ok(lead);
        }

        let body = match &target {
            Some(account) => format!("Assigned to {} by {}", account.email, ctx.email),
            None => format!("Unassigned by {}", ctx.email),
        };
        let note = Note::system(id, body, Utc::now());
        let updated = self
            .leads
            .assign(id, target.as_ref().map(|account| account.id), note.clone())
            .await?;

        tracing::info!(lead_id = %id, staff = %ctx.email, "{}", note.body);
        self.announce_audit(&updated, &note, ctx.correlation_id);
        self.publish_lead(
            ChangeKind::Update,
            &updated,
            lead.assigned_to,
            ctx.correlation_id,
        );

        Ok(updated)
    }

    async fn set_status(
        &self,
        ctx: &StaffContext,
        id: Uuid,
        status: LeadStatus,
    ) -> AppResult<Lead> {
        let lead = self.visible_lead(ctx, id).await?;
        if lead.status == status {
            return Ok(lead);
        }

        let update = LeadUpdate {
            status: Some(status),
            ..Default::default()
        };
        let note = Note::system(
            id,
            format!("Status changed from {} to {} by {}", lead.status, status, ctx.email),
            Utc::now(),
        );
        let updated = self.leads.update_fields(id, update, note.clone()).await?;

        self.announce_audit(&updated, &note, ctx.correlation_id);
        self.publish_lead(ChangeKind::Update, &updated, None, ctx.correlation_id);

        Ok(updated)
    }

    async fn set_project_status(
        &self,
        ctx: &StaffContext,
        id: Uuid,
        project_status: ProjectStatus,
    ) -> AppResult<Lead> {
        let lead = self.visible_lead(ctx, id).await?;
        if !lead.status.is_submitted_or_later() {
            return Err(AppError::conflict(format!(
                "Lead {} has not been submitted yet",
                lead.reference()
            )));
        }
        if lead.project_status == project_status {
            return Ok(lead);
        }

        let update = LeadUpdate {
            project_status: Some(project_status),
            ..Default::default()
        };
        let note = Note::system(
            id,
            format!(
                "Project status changed from {} to {} by {}",
                lead.project_status, project_status, ctx.email
            ),
            Utc::now(),
        );
        let updated = self.leads.update_fields(id, update, note.clone()).await?;

        self.announce_audit(&updated, &note, ctx.correlation_id);
        self.publish_lead(ChangeKind::Update, &updated, None, ctx.correlation_id);

        Ok(updated)
    }

    async fn reopen(&self, ctx: &StaffContext, id: Uuid) -> AppResult<Lead> {
        let lead = self.visible_lead(ctx, id).await?;
        let status = lead.reopened_status()?;

        let update = LeadUpdate {
            status: Some(status),
            ..Default::default()
        };
        let note = Note::system(id, format!("Reopened by {}", ctx.email), Utc::now());
        let updated = self.leads.update_fields(id, update, note.clone()).await?;

        self.announce_audit(&updated, &note, ctx.correlation_id);
        self.publish_lead(ChangeKind::Update, &updated, None, ctx.correlation_id);

        Ok(updated)
    }

    async fn record_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        amount_cents: i64,
    ) -> AppResult<PaymentOutcome> {
        if amount_cents < 0 {
            return Err(AppError::invalid_field(
                "amount_cents",
                "Amount cannot be negative",
            ));
        }

        let note = Note::system(
            id,
            format!(
                "Payment {}: {}.{:02} EUR",
                status,
                amount_cents / 100,
                amount_cents % 100
            ),
            Utc::now(),
        );
        let record = self
            .leads
            .record_payment(id, status, amount_cents, note.clone())
            .await?;
        let lead = record.lead;

        if record.decision == PaymentDecision::Duplicate {
            tracing::info!(lead_id = %id, %status, "Duplicate payment confirmation ignored");
            return Ok(PaymentOutcome::DuplicateDeliveryIgnored(lead));
        }

        tracing::info!(lead_id = %id, %status, amount_cents, "Payment recorded");
        self.announce_audit(&lead, &note, None);
        self.publish_lead(ChangeKind::Update, &lead, None, None);

        if status == PaymentStatus::Paid {
            self.notifications
                .dispatch(Notification::PaymentSucceeded {
                    lead_id: lead.id,
                    reference: lead.reference(),
                    amount_cents,
                })
                .await;
        }

        Ok(PaymentOutcome::Recorded(lead))
    }

    async fn purge(&self, ctx: &StaffContext, id: Uuid) -> AppResult<()> {
        ctx.require(Capability::PurgeLeads)?;
        let lead = self.leads.find_by_id(id).await?.ok_or_not_found()?;

        self.leads.purge(id).await?;

        tracing::warn!(lead_id = %id, staff = %ctx.email, "Lead purged");
        self.publish_lead(ChangeKind::Delete, &lead, None, ctx.correlation_id);
        Ok(())
    }
}
