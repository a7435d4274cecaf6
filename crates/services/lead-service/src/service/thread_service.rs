//! Communication aggregator.
//!
//! Notes, internal messages, emails and files live in their own stores.
//! A thread is assembled at read time by querying the four channels
//! concurrently and merging them by creation time.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::{AppError, AppResult, OptionExt};
use domain::{
    normalize_email, render, Capability, ChangeEvent, ChangeKind, Channel, CommunicationItem,
    DeliveryStatus, Email, EmailDirection, FileAttachment, InternalMessage, ItemSummary, Lead,
    Note, StaffContext, TemplateContext,
};

use super::{NotificationDispatcher, PaymentLinkSigner, RealtimeHub};
use crate::infra::{Notification, OutboundMailer};
use crate::jobs::EmailDeliveryJob;
use crate::repository::{
    EmailRepository, FileRepository, LeadRepository, MessageRepository, NoteRepository, Stores,
};

/// One thread item with its shared projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadEntry {
    pub summary: ItemSummary,
    #[serde(flatten)]
    pub item: CommunicationItem,
}

/// Merged communication history of one lead, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thread {
    pub lead_id: Uuid,
    pub items: Vec<ThreadEntry>,
    /// Channels that could not be read; their items are missing
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unavailable: Vec<Channel>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewMessage {
    pub subject: String,
    pub body_plain: String,
    pub body_rich: Option<String>,
    #[serde(default)]
    pub important: bool,
}

/// Outbound email before placeholder substitution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

/// Delivery status callback from the mail provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeliveryReport {
    pub email_id: Uuid,
    pub status: DeliveryStatus,
    pub diagnostic: Option<String>,
}

/// Email received from a lead.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundEmail {
    pub from: String,
    pub subject: String,
    pub body: String,
}

/// Metadata of an uploaded file; the bytes live in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewFile {
    pub file_name: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub storage_key: String,
    pub description: Option<String>,
}

#[async_trait]
pub trait ThreadService: Send + Sync {
    async fn thread_for(&self, ctx: &StaffContext, lead_id: Uuid) -> AppResult<Thread>;

    async fn add_note(&self, ctx: &StaffContext, lead_id: Uuid, body: String) -> AppResult<Note>;

    /// Any staff member who can see the lead may edit its staff notes.
    /// System notes are immutable.
    async fn edit_note(&self, ctx: &StaffContext, note_id: Uuid, body: String)
        -> AppResult<Note>;

    async fn pin_note(&self, ctx: &StaffContext, note_id: Uuid, pinned: bool) -> AppResult<Note>;

    async fn delete_note(&self, ctx: &StaffContext, note_id: Uuid) -> AppResult<()>;

    async fn post_message(
        &self,
        ctx: &StaffContext,
        lead_id: Uuid,
        message: NewMessage,
    ) -> AppResult<InternalMessage>;

    /// Render and queue an outbound email to the lead.
    async fn compose_email(
        &self,
        ctx: &StaffContext,
        lead_id: Uuid,
        draft: EmailDraft,
    ) -> AppResult<Email>;

    /// Apply a provider delivery status. Returns `None` when the report
    /// would move the status backwards and was ignored.
    async fn record_delivery(&self, report: DeliveryReport) -> AppResult<Option<Email>>;

    /// Attach an inbound email to the lead with the sender's address.
    /// Returns `None` when no lead matches.
    async fn record_inbound_email(&self, inbound: InboundEmail) -> AppResult<Option<Email>>;

    async fn attach_file(
        &self,
        ctx: &StaffContext,
        lead_id: Uuid,
        file: NewFile,
    ) -> AppResult<FileAttachment>;
}

fn required(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::invalid_field(field, format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Concrete implementation of ThreadService.
pub struct CommunicationAggregator {
    leads: Arc<dyn LeadRepository>,
    notes: Arc<dyn NoteRepository>,
    messages: Arc<dyn MessageRepository>,
    emails: Arc<dyn EmailRepository>,
    files: Arc<dyn FileRepository>,
    mailer: Arc<dyn OutboundMailer>,
    links: PaymentLinkSigner,
    notifications: NotificationDispatcher,
    realtime: RealtimeHub,
    operators_see_diagnostics: bool,
}

impl CommunicationAggregator {
    pub fn new(
        stores: &Stores,
        mailer: Arc<dyn OutboundMailer>,
        links: PaymentLinkSigner,
        notifications: NotificationDispatcher,
        realtime: RealtimeHub,
        operators_see_diagnostics: bool,
    ) -> Self {
        Self {
            leads: stores.leads.clone(),
            notes: stores.notes.clone(),
            messages: stores.messages.clone(),
            emails: stores.emails.clone(),
            files: stores.files.clone(),
            mailer,
            links,
            notifications,
            realtime,
            operators_see_diagnostics,
        }
    }

    async fn visible_lead(&self, ctx: &StaffContext, lead_id: Uuid) -> AppResult<Lead> {
        let lead = self.leads.find_by_id(lead_id).await?.ok_or_not_found()?;
        ctx.ensure_can_view(&lead)?;
        Ok(lead)
    }

    /// A note plus the lead it belongs to, if the caller may see that lead.
    async fn visible_note(&self, ctx: &StaffContext, note_id: Uuid) -> AppResult<(Note, Lead)> {
        let note = self.notes.find_by_id(note_id).await?.ok_or_not_found()?;
        let lead = self.visible_lead(ctx, note.lead_id).await?;
        Ok((note, lead))
    }

    fn announce(
        &self,
        kind: ChangeKind,
        lead: &Lead,
        channel: Channel,
        item_id: Uuid,
        correlation_id: Option<Uuid>,
    ) {
        self.realtime.publish(
            ChangeEvent::item(
                kind,
                lead.id,
                channel,
                item_id,
                lead.assigned_to.into_iter().collect(),
            )
            .with_correlation(correlation_id),
        );
    }
}

#[async_trait]
impl ThreadService for CommunicationAggregator {
    async fn thread_for(&self, ctx: &StaffContext, lead_id: Uuid) -> AppResult<Thread> {
        self.visible_lead(ctx, lead_id).await?;

        let (notes, messages, emails, files) = tokio::join!(
            self.notes.list_for_lead(lead_id),
            self.messages.list_for_lead(lead_id),
            self.emails.list_for_lead(lead_id),
            self.files.list_for_lead(lead_id),
        );

        let mut items = Vec::new();
        let mut unavailable = Vec::new();
        let mut collect = |channel: Channel, result: AppResult<Vec<CommunicationItem>>| match result
        {
            Ok(mut rows) => items.append(&mut rows),
            Err(e) => {
                tracing::warn!(%lead_id, %channel, error = %e, "Thread channel unavailable");
                unavailable.push(channel);
            }
        };

        collect(
            Channel::Note,
            notes.map(|rows| rows.into_iter().map(CommunicationItem::Note).collect()),
        );
        collect(
            Channel::Message,
            messages.map(|rows| rows.into_iter().map(CommunicationItem::Message).collect()),
        );
        collect(
            Channel::Email,
            emails.map(|rows| rows.into_iter().map(CommunicationItem::Email).collect()),
        );
        collect(
            Channel::File,
            files.map(|rows| rows.into_iter().map(CommunicationItem::File).collect()),
        );

        if unavailable.len() == Channel::ALL.len() {
            return Err(AppError::upstream("Communication store"));
        }

        items.sort_by(CommunicationItem::thread_order);
        let diagnostics = ctx.sees_delivery_diagnostics(self.operators_see_diagnostics);

        let items = items
            .into_iter()
            .map(|item| if diagnostics { item } else { item.without_diagnostics() })
            .map(|item| ThreadEntry {
                summary: item.summary(),
                item,
            })
            .collect();

        Ok(Thread {
            lead_id,
            items,
            unavailable,
        })
    }

    async fn add_note(&self, ctx: &StaffContext, lead_id: Uuid, body: String) -> AppResult<Note> {
        let lead = self.visible_lead(ctx, lead_id).await?;
        let body = required("body", &body)?;

        let note = self
            .notes
            .append(Note::by_staff(lead_id, ctx.staff_id, body, Utc::now()))
            .await?;

        self.announce(ChangeKind::Insert, &lead, Channel::Note, note.id, ctx.correlation_id);
        Ok(note)
    }

    async fn edit_note(
        &self,
        ctx: &StaffContext,
        note_id: Uuid,
        body: String,
    ) -> AppResult<Note> {
        let (note, lead) = self.visible_note(ctx, note_id).await?;
        if note.is_system() {
            return Err(AppError::denied(format!(
                "{} tried to edit system note {}",
                ctx.email, note_id
            )));
        }

        let body = required("body", &body)?;
        let note = self.notes.update_body(note.id, body, Utc::now()).await?;

        self.announce(ChangeKind::Update, &lead, Channel::Note, note.id, ctx.correlation_id);
        Ok(note)
    }

    async fn pin_note(&self, ctx: &StaffContext, note_id: Uuid, pinned: bool) -> AppResult<Note> {
        let (note, lead) = self.visible_note(ctx, note_id).await?;
        if note.pinned == pinned {
            return Ok(note);
        }

        let note = self.notes.set_pinned(note.id, pinned, Utc::now()).await?;

        self.announce(ChangeKind::Update, &lead, Channel::Note, note.id, ctx.correlation_id);
        Ok(note)
    }

    async fn delete_note(&self, ctx: &StaffContext, note_id: Uuid) -> AppResult<()> {
        ctx.require(Capability::DeleteNotes)?;
        let (note, lead) = self.visible_note(ctx, note_id).await?;
        if note.is_system() {
            return Err(AppError::denied(format!(
                "{} tried to delete system note {}",
                ctx.email, note_id
            )));
        }

        self.notes.delete(note.id).await?;

        tracing::info!(lead_id = %lead.id, %note_id, by = %ctx.email, "Note deleted");
        self.announce(ChangeKind::Delete, &lead, Channel::Note, note.id, ctx.correlation_id);
        Ok(())
    }

    async fn post_message(
        &self,
        ctx: &StaffContext,
        lead_id: Uuid,
        message: NewMessage,
    ) -> AppResult<InternalMessage> {
        let lead = self.visible_lead(ctx, lead_id).await?;
        let body_plain = required("body_plain", &message.body_plain)?;

        let message = self
            .messages
            .append(InternalMessage {
                id: Uuid::new_v4(),
                lead_id,
                author_id: ctx.staff_id,
                subject: message.subject.trim().to_string(),
                body_plain,
                body_rich: message.body_rich,
                important: message.important,
                created_at: Utc::now(),
            })
            .await?;

        self.announce(
            ChangeKind::Insert,
            &lead,
            Channel::Message,
            message.id,
            ctx.correlation_id,
        );
        self.notifications
            .dispatch(Notification::NewMessage {
                lead_id,
                reference: lead.reference(),
                subject: message.subject.clone(),
                author: ctx.email.clone(),
            })
            .await;

        Ok(message)
    }

    async fn compose_email(
        &self,
        ctx: &StaffContext,
        lead_id: Uuid,
        draft: EmailDraft,
    ) -> AppResult<Email> {
        let lead = self.visible_lead(ctx, lead_id).await?;
        let subject = required("subject", &draft.subject)?;
        let body = required("body", &draft.body)?;

        let context = TemplateContext::for_lead(&lead, self.links.link(lead.id)?);
        let now = Utc::now();
        let email = self
            .emails
            .append(Email {
                id: Uuid::new_v4(),
                lead_id,
                direction: EmailDirection::Outbound,
                sender_id: Some(ctx.staff_id),
                counterpart: lead.email.clone(),
                subject: render(&subject, &context),
                body: render(&body, &context),
                delivery_status: DeliveryStatus::Queued,
                diagnostic: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.announce(ChangeKind::Insert, &lead, Channel::Email, email.id, ctx.correlation_id);

        let job = EmailDeliveryJob {
            email_id: email.id,
            to: email.counterpart.clone(),
            subject: email.subject.clone(),
            body: email.body.clone(),
        };
        if let Err(e) = self.mailer.enqueue(job).await {
            tracing::warn!(%lead_id, email_id = %email.id, error = %e, "Outbound email not queued");
            let failed = self
                .emails
                .advance_delivery(
                    email.id,
                    DeliveryStatus::Failed,
                    Some("mail queue unavailable".to_string()),
                )
                .await?;
            if let Some(failed) = failed {
                self.announce(ChangeKind::Update, &lead, Channel::Email, failed.id, None);
                return Ok(failed);
            }
        }

        Ok(email)
    }

    async fn record_delivery(&self, report: DeliveryReport) -> AppResult<Option<Email>> {
        let diagnostic = report
            .diagnostic
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let updated = self
            .emails
            .advance_delivery(report.email_id, report.status, diagnostic)
            .await?;

        let Some(email) = updated else {
            tracing::info!(
                email_id = %report.email_id,
                status = %report.status,
                "Stale delivery report ignored"
            );
            return Ok(None);
        };

        if let Some(lead) = self.leads.find_by_id(email.lead_id).await? {
            self.announce(ChangeKind::Update, &lead, Channel::Email, email.id, None);
        }
        Ok(Some(email))
    }

    async fn record_inbound_email(&self, inbound: InboundEmail) -> AppResult<Option<Email>> {
        let sender = normalize_email(&inbound.from)?;

        let Some(lead) = self.leads.find_by_email(&sender).await? else {
            tracing::info!(from = %sender, "Inbound email matches no lead");
            return Ok(None);
        };

        let now = Utc::now();
        let email = self
            .emails
            .append(Email {
                id: Uuid::new_v4(),
                lead_id: lead.id,
                direction: EmailDirection::Inbound,
                sender_id: None,
                counterpart: sender,
                subject: inbound.subject.trim().to_string(),
                body: inbound.body,
                delivery_status: DeliveryStatus::Delivered,
                diagnostic: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(lead_id = %lead.id, email_id = %email.id, "Inbound email recorded");
        self.announce(ChangeKind::Insert, &lead, Channel::Email, email.id, None);
        Ok(Some(email))
    }

    async fn attach_file(
        &self,
        ctx: &StaffContext,
        lead_id: Uuid,
        file: NewFile,
    ) -> AppResult<FileAttachment> {
        let lead = self.visible_lead(ctx, lead_id).await?;
        let file_name = required("file_name", &file.file_name)?;
        let storage_key = required("storage_key", &file.storage_key)?;
        if file.size_bytes < 0 {
            return Err(AppError::invalid_field(
                "size_bytes",
                "size_bytes cannot be negative",
            ));
        }

        let file = self
            .files
            .append(FileAttachment {
                id: Uuid::new_v4(),
                lead_id,
                uploader_id: ctx.staff_id,
                file_name,
                size_bytes: file.size_bytes,
                content_type: file.content_type,
                storage_key,
                description: file
                    .description
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty()),
                created_at: Utc::now(),
            })
            .await?;

        self.announce(ChangeKind::Insert, &lead, Channel::File, file.id, ctx.correlation_id);
        Ok(file)
    }
}
