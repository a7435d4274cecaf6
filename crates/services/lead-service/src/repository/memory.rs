//! In-memory implementation of every repository trait.
//!
//! Semantics match the PostgreSQL stores: one mutex stands in for the row
//! locks, so identity-keyed writes are atomic. Used by tests and by the
//! `--in-memory` development mode.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    EmailRepository, FileRepository, LeadRepository, LeadUpdate, MessageRepository,
    NoteRepository, PaymentRecord, StaffRepository, UpsertOutcome,
};
use common::{AppError, AppResult, PaginationParams};
use domain::{
    CapabilityOverrides, DeliveryStatus, Email, FileAttachment, InternalMessage, Lead, LeadPatch,
    LeadQuery, Note, PaymentDecision, PaymentStatus, Role, Scope, StaffAccount, SubmissionKind,
};

#[derive(Default)]
struct State {
    leads: HashMap<Uuid, Lead>,
    /// Checkout session reference to lead id
    payment_sessions: HashMap<String, Uuid>,
    staff: HashMap<Uuid, StaffAccount>,
    notes: Vec<Note>,
    messages: Vec<InternalMessage>,
    emails: Vec<Email>,
    files: Vec<FileAttachment>,
}

impl State {
    fn lead_by_email(&self, email: &str) -> Option<&Lead> {
        self.leads.values().find(|lead| lead.email == email)
    }

    fn lead_mut(&mut self, id: Uuid) -> AppResult<&mut Lead> {
        self.leads.get_mut(&id).ok_or(AppError::NotFound)
    }

    fn note_mut(&mut self, id: Uuid) -> AppResult<&mut Note> {
        self.notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(AppError::NotFound)
    }

    fn staff_mut(&mut self, id: Uuid) -> AppResult<&mut StaffAccount> {
        self.staff.get_mut(&id).ok_or(AppError::NotFound)
    }

    fn ensure_lead(&self, id: Uuid) -> AppResult<()> {
        if self.leads.contains_key(&id) {
            Ok(())
        } else {
            Err(AppError::internal(format!("no lead {} for channel row", id)))
        }
    }
}

/// Shared in-process store. Clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a staff account directly, bypassing permission checks.
    pub async fn seed_staff(&self, account: StaffAccount) -> StaffAccount {
        let mut state = self.state.lock().await;
        state.staff.insert(account.id, account.clone());
        account
    }

    /// Seed a lead directly.
    pub async fn seed_lead(&self, lead: Lead) -> Lead {
        let mut state = self.state.lock().await;
        state.leads.insert(lead.id, lead.clone());
        lead
    }

    pub async fn lead_count(&self) -> usize {
        self.state.lock().await.leads.len()
    }
}

fn oldest_first<T: Clone>(
    rows: &[T],
    lead_id: Uuid,
    key: impl Fn(&T) -> (Uuid, DateTime<Utc>),
) -> Vec<T> {
    let mut selected: Vec<T> = rows
        .iter()
        .filter(|row| key(row).0 == lead_id)
        .cloned()
        .collect();
    selected.sort_by_key(|row| key(row).1);
    selected
}

#[async_trait]
impl LeadRepository for InMemoryStore {
    async fn upsert_by_identity(
        &self,
        email: &str,
        patch: &LeadPatch,
        kind: SubmissionKind,
    ) -> AppResult<UpsertOutcome> {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let (current, created) = match state.lead_by_email(email) {
            Some(lead) => (lead.clone(), false),
            None => (Lead::skeleton(Uuid::new_v4(), email.to_string(), now), true),
        };

        let advance = current.advance(patch, kind, now)?;
        if advance.changed || created {
            state.leads.insert(advance.lead.id, advance.lead.clone());
        }

        Ok(UpsertOutcome {
            lead: advance.lead,
            created,
            newly_submitted: advance.newly_submitted,
            changed: advance.changed,
        })
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Lead>> {
        Ok(self.state.lock().await.leads.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Lead>> {
        Ok(self.state.lock().await.lead_by_email(email).cloned())
    }

    async fn find_by_session_ref(&self, session_ref: &str) -> AppResult<Option<Lead>> {
        let state = self.state.lock().await;
        Ok(state
            .payment_sessions
            .get(session_ref)
            .and_then(|id| state.leads.get(id))
            .cloned())
    }

    async fn open_payment_session(
        &self,
        id: Uuid,
        session_ref: &str,
        amount_cents: i64,
    ) -> AppResult<Lead> {
        let mut state = self.state.lock().await;
        if state.payment_sessions.contains_key(session_ref) {
            return Err(AppError::conflict(format!(
                "Checkout session {} is already recorded",
                session_ref
            )));
        }

        let lead = state.lead_mut(id)?;
        lead.payment_session_ref = Some(session_ref.to_string());
        lead.amount_cents = Some(amount_cents);
        lead.updated_at = Utc::now();
        let lead = lead.clone();

        state.payment_sessions.insert(session_ref.to_string(), id);
        Ok(lead)
    }

    async fn fetch_filtered(
        &self,
        query: &LeadQuery,
        scope: Scope,
        viewer: Uuid,
        page: PaginationParams,
    ) -> AppResult<(Vec<Lead>, u64)> {
        let now = Utc::now();
        let state = self.state.lock().await;

        let mut matching: Vec<Lead> = state
            .leads
            .values()
            .filter(|lead| scope.admits(lead) && query.matches(lead, viewer, now))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total = matching.len() as u64;
        let leads = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();

        Ok((leads, total))
    }

    async fn update_fields(&self, id: Uuid, update: LeadUpdate, audit: Note) -> AppResult<Lead> {
        let mut state = self.state.lock().await;
        let lead = state.lead_mut(id)?;
        update.apply_to(lead);
        lead.updated_at = Utc::now();
        let lead = lead.clone();

        state.notes.push(audit);
        Ok(lead)
    }

    async fn assign(&self, id: Uuid, assignee: Option<Uuid>, audit: Note) -> AppResult<Lead> {
        let mut state = self.state.lock().await;

        if let Some(staff_id) = assignee {
            match state.staff.get(&staff_id) {
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

        let lead = state.lead_mut(id)?;
        lead.assigned_to = assignee;
        lead.status = lead.status.after_assignment(assignee.is_some());
        lead.updated_at = Utc::now();
        let lead = lead.clone();

        state.notes.push(audit);
        Ok(lead)
    }

    async fn record_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        amount_cents: i64,
        audit: Note,
    ) -> AppResult<PaymentRecord> {
        let mut state = self.state.lock().await;
        let lead = state.lead_mut(id)?;

        let decision = lead.payment_decision(status, amount_cents);
        if decision == PaymentDecision::Apply {
            lead.payment_status = status;
            lead.amount_cents = Some(amount_cents);
            lead.updated_at = Utc::now();
        }
        let lead = lead.clone();

        if decision == PaymentDecision::Apply {
            state.notes.push(audit);
        }
        Ok(PaymentRecord { lead, decision })
    }

    async fn purge(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.leads.remove(&id).is_none() {
            return Err(AppError::NotFound);
        }
        state.payment_sessions.retain(|_, lead_id| *lead_id != id);
        state.notes.retain(|row| row.lead_id != id);
        state.messages.retain(|row| row.lead_id != id);
        state.emails.retain(|row| row.lead_id != id);
        state.files.retain(|row| row.lead_id != id);
        Ok(())
    }
}

#[async_trait]
impl StaffRepository for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<StaffAccount>> {
        Ok(self.state.lock().await.staff.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<StaffAccount>> {
        let state = self.state.lock().await;
        Ok(state.staff.values().find(|a| a.email == email).cloned())
    }

    async fn list(&self) -> AppResult<Vec<StaffAccount>> {
        let state = self.state.lock().await;
        let mut accounts: Vec<StaffAccount> = state.staff.values().cloned().collect();
        accounts.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(accounts)
    }

    async fn create(&self, account: StaffAccount) -> AppResult<StaffAccount> {
        let mut state = self.state.lock().await;
        if state.staff.values().any(|a| a.email == account.email) {
            return Err(AppError::conflict(format!(
                "A staff account already exists for {}",
                account.email
            )));
        }
        state.staff.insert(account.id, account.clone());
        Ok(account)
    }

    async fn update_role(&self, id: Uuid, role: Role) -> AppResult<StaffAccount> {
        let mut state = self.state.lock().await;
        let account = state.staff_mut(id)?;
        account.role = role;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> AppResult<StaffAccount> {
        let mut state = self.state.lock().await;
        let account = state.staff_mut(id)?;
        account.active = active;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn set_overrides(
        &self,
        id: Uuid,
        overrides: CapabilityOverrides,
    ) -> AppResult<StaffAccount> {
        let mut state = self.state.lock().await;
        let account = state.staff_mut(id)?;
        account.overrides = overrides;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }
}

#[async_trait]
impl NoteRepository for InMemoryStore {
    async fn append(&self, note: Note) -> AppResult<Note> {
        let mut state = self.state.lock().await;
        state.ensure_lead(note.lead_id)?;
        state.notes.push(note.clone());
        Ok(note)
    }

    async fn list_for_lead(&self, lead_id: Uuid) -> AppResult<Vec<Note>> {
        let state = self.state.lock().await;
        Ok(oldest_first(&state.notes, lead_id, |n| (n.lead_id, n.created_at)))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Note>> {
        let state = self.state.lock().await;
        Ok(state.notes.iter().find(|n| n.id == id).cloned())
    }

    async fn update_body(&self, id: Uuid, body: String, at: DateTime<Utc>) -> AppResult<Note> {
        let mut state = self.state.lock().await;
        let stored = state.note_mut(id)?;
        stored.body = body;
        stored.updated_at = at;
        Ok(stored.clone())
    }

    async fn set_pinned(&self, id: Uuid, pinned: bool, at: DateTime<Utc>) -> AppResult<Note> {
        let mut state = self.state.lock().await;
        let stored = state.note_mut(id)?;
        stored.pinned = pinned;
        stored.updated_at = at;
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let before = state.notes.len();
        state.notes.retain(|n| n.id != id);
        if state.notes.len() == before {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn append(&self, message: InternalMessage) -> AppResult<InternalMessage> {
        let mut state = self.state.lock().await;
        state.ensure_lead(message.lead_id)?;
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn list_for_lead(&self, lead_id: Uuid) -> AppResult<Vec<InternalMessage>> {
        let state = self.state.lock().await;
        Ok(oldest_first(&state.messages, lead_id, |m| (m.lead_id, m.created_at)))
    }
}

#[async_trait]
impl EmailRepository for InMemoryStore {
    async fn append(&self, email: Email) -> AppResult<Email> {
        let mut state = self.state.lock().await;
        state.ensure_lead(email.lead_id)?;
        state.emails.push(email.clone());
        Ok(email)
    }

    async fn list_for_lead(&self, lead_id: Uuid) -> AppResult<Vec<Email>> {
        let state = self.state.lock().await;
        Ok(oldest_first(&state.emails, lead_id, |e| (e.lead_id, e.created_at)))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Email>> {
        let state = self.state.lock().await;
        Ok(state.emails.iter().find(|e| e.id == id).cloned())
    }

    async fn advance_delivery(
        &self,
        id: Uuid,
        status: DeliveryStatus,
        diagnostic: Option<String>,
    ) -> AppResult<Option<Email>> {
        let mut state = self.state.lock().await;
        let email = state
            .emails
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(AppError::NotFound)?;

        if !email.delivery_status.can_become(status) {
            return Ok(None);
        }
        email.delivery_status = status;
        if diagnostic.is_some() {
            email.diagnostic = diagnostic;
        }
        email.updated_at = Utc::now();
        Ok(Some(email.clone()))
    }
}

#[async_trait]
impl FileRepository for InMemoryStore {
    async fn append(&self, file: FileAttachment) -> AppResult<FileAttachment> {
        let mut state = self.state.lock().await;
        state.ensure_lead(file.lead_id)?;
        state.files.push(file.clone());
        Ok(file)
    }

    async fn list_for_lead(&self, lead_id: Uuid) -> AppResult<Vec<FileAttachment>> {
        let state = self.state.lock().await;
        Ok(oldest_first(&state.files, lead_id, |f| (f.lead_id, f.created_at)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ClientType, LeadStatus};

    fn step(step: i32) -> LeadPatch {
        LeadPatch {
            form_step: Some(step),
            first_name: Some("Jean".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn upsert_twice_keeps_one_row() {
        let store = InMemoryStore::new();

        let first = LeadRepository::upsert_by_identity(&store, "j@x.fr", &step(1), SubmissionKind::Step)
            .await
            .unwrap();
        let second = LeadRepository::upsert_by_identity(&store, "j@x.fr", &step(1), SubmissionKind::Step)
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert!(!second.changed);
        assert_eq!(first.lead.id, second.lead.id);
        assert_eq!(store.lead_count().await, 1);
    }

    #[tokio::test]
    async fn failed_validation_leaves_no_row() {
        let store = InMemoryStore::new();
        let patch = LeadPatch {
            client_type: Some(ClientType::Business),
            ..Default::default()
        };

        let result = LeadRepository::upsert_by_identity(
            &store,
            "co@x.fr",
            &patch,
            SubmissionKind::Final { fee_cents: 12_900 },
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
        assert_eq!(store.lead_count().await, 0);
    }

    #[tokio::test]
    async fn assign_refuses_inactive_target() {
        let store = InMemoryStore::new();
        let lead = store
            .seed_lead(Lead::skeleton(Uuid::new_v4(), "a@x.fr".to_string(), Utc::now()))
            .await;
        let mut agent = StaffAccount::new("agent@x.fr".to_string(), Role::Operator, None);
        agent.active = false;
        let agent = store.seed_staff(agent).await;

        let audit = Note::system(lead.id, "Assigned to agent@x.fr", Utc::now());
        let result = store.assign(lead.id, Some(agent.id), audit).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(NoteRepository::list_for_lead(&store, lead.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn transition_and_audit_note_commit_together() {
        let store = InMemoryStore::new();
        let lead = store
            .seed_lead(Lead::skeleton(Uuid::new_v4(), "s@x.fr".to_string(), Utc::now()))
            .await;
        let update = LeadUpdate {
            status: Some(LeadStatus::InReview),
            ..Default::default()
        };

        let missing = Uuid::new_v4();
        let result = store
            .update_fields(missing, update.clone(), Note::system(missing, "lost", Utc::now()))
            .await;
        assert!(matches!(result, Err(AppError::NotFound)));
        assert!(store.state.lock().await.notes.is_empty());

        let audit = Note::system(lead.id, "Status changed", Utc::now());
        let updated = store.update_fields(lead.id, update, audit.clone()).await.unwrap();

        assert_eq!(updated.status, LeadStatus::InReview);
        assert_eq!(
            NoteRepository::list_for_lead(&store, lead.id).await.unwrap(),
            vec![audit]
        );
    }

    #[tokio::test]
    async fn repeated_payment_stores_one_audit_note() {
        let store = InMemoryStore::new();
        let lead = store
            .seed_lead(Lead::skeleton(Uuid::new_v4(), "p@x.fr".to_string(), Utc::now()))
            .await;

        for _ in 0..2 {
            let audit = Note::system(lead.id, "Payment paid", Utc::now());
            store
                .record_payment(lead.id, PaymentStatus::Paid, 12_900, audit)
                .await
                .unwrap();
        }

        let notes = NoteRepository::list_for_lead(&store, lead.id).await.unwrap();
        assert_eq!(notes.len(), 1);
    }

    #[tokio::test]
    async fn superseded_checkout_session_still_finds_its_lead() {
        let store = InMemoryStore::new();
        let lead = store
            .seed_lead(Lead::skeleton(Uuid::new_v4(), "c@x.fr".to_string(), Utc::now()))
            .await;

        store.open_payment_session(lead.id, "cs_1", 12_900).await.unwrap();
        let current = store.open_payment_session(lead.id, "cs_2", 12_900).await.unwrap();

        assert_eq!(current.payment_session_ref.as_deref(), Some("cs_2"));
        let found = store.find_by_session_ref("cs_1").await.unwrap();
        assert_eq!(found.map(|l| l.id), Some(lead.id));
    }

    #[tokio::test]
    async fn purge_cascades_to_channels() {
        let store = InMemoryStore::new();
        let mut lead = Lead::skeleton(Uuid::new_v4(), "p@x.fr".to_string(), Utc::now());
        lead.status = LeadStatus::Submitted;
        let lead = store.seed_lead(lead).await;
        NoteRepository::append(&store, Note::system(lead.id, "created", Utc::now()))
            .await
            .unwrap();

        LeadRepository::purge(&store, lead.id).await.unwrap();

        assert!(NoteRepository::list_for_lead(&store, lead.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn delivery_status_never_regresses() {
        let store = InMemoryStore::new();
        let lead = store
            .seed_lead(Lead::skeleton(Uuid::new_v4(), "d@x.fr".to_string(), Utc::now()))
            .await;
        let now = Utc::now();
        let email = EmailRepository::append(
            &store,
            Email {
                id: Uuid::new_v4(),
                lead_id: lead.id,
                direction: domain::EmailDirection::Outbound,
                sender_id: None,
                counterpart: lead.email.clone(),
                subject: "Hello".to_string(),
                body: "Body".to_string(),
                delivery_status: DeliveryStatus::Queued,
                diagnostic: None,
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .unwrap();

        let delivered = store
            .advance_delivery(email.id, DeliveryStatus::Delivered, None)
            .await
            .unwrap();
        let late_sent = store
            .advance_delivery(email.id, DeliveryStatus::Sent, None)
            .await
            .unwrap();

        assert_eq!(delivered.unwrap().delivery_status, DeliveryStatus::Delivered);
        assert!(late_sent.is_none());
    }
}
