//! Communication channels attached to a lead.
//!
//! Each channel keeps its own record shape. [`CommunicationItem`] unifies them
//! for the thread view, and [`CommunicationItem::summary`] projects every
//! variant to the same `(timestamp, author, excerpt)` view.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::EXCERPT_MAX_CHARS;
use crate::error::DomainError;

/// The four independent channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Note,
    Message,
    Email,
    File,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Note, Channel::Message, Channel::Email, Channel::File];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Note => "note",
            Channel::Message => "message",
            Channel::Email => "email",
            Channel::File => "file",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Staff note. `author_id = None` marks a system-authored audit note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub author_id: Option<Uuid>,
    pub body: String,
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn system(lead_id: Uuid, body: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id,
            author_id: None,
            body: body.into(),
            pinned: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn by_staff(lead_id: Uuid, author_id: Uuid, body: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id,
            author_id: Some(author_id),
            body,
            pinned: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_system(&self) -> bool {
        self.author_id.is_none()
    }
}

/// Internal staff-to-staff message about a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalMessage {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub author_id: Uuid,
    pub subject: String,
    pub body_plain: String,
    pub body_rich: Option<String>,
    pub important: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EmailDirection {
    Outbound,
    Inbound,
}

impl EmailDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailDirection::Outbound => "outbound",
            EmailDirection::Inbound => "inbound",
        }
    }
}

impl FromStr for EmailDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outbound" => Ok(EmailDirection::Outbound),
            "inbound" => Ok(EmailDirection::Inbound),
            other => Err(DomainError::validation(
                "direction",
                format!("unknown email direction '{}'", other),
            )),
        }
    }
}

/// Delivery sub-state of an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Queued,
    Sent,
    Delivered,
    Failed,
    Bounced,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Queued => "queued",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Bounced => "bounced",
        }
    }

    /// Provider callbacks may arrive out of order; only forward moves apply.
    /// A bounce may still follow a delivery receipt.
    pub fn can_become(&self, next: DeliveryStatus) -> bool {
        match (self, next) {
            (DeliveryStatus::Queued, DeliveryStatus::Queued) => false,
            (DeliveryStatus::Queued, _) => true,
            (DeliveryStatus::Sent, DeliveryStatus::Delivered)
            | (DeliveryStatus::Sent, DeliveryStatus::Failed)
            | (DeliveryStatus::Sent, DeliveryStatus::Bounced)
            | (DeliveryStatus::Delivered, DeliveryStatus::Bounced) => true,
            _ => false,
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(DeliveryStatus::Queued),
            "sent" => Ok(DeliveryStatus::Sent),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "failed" => Ok(DeliveryStatus::Failed),
            "bounced" => Ok(DeliveryStatus::Bounced),
            other => Err(DomainError::validation(
                "delivery_status",
                format!("unknown delivery status '{}'", other),
            )),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub direction: EmailDirection,
    /// Composing staff member for outbound mail
    pub sender_id: Option<Uuid>,
    pub counterpart: String,
    pub subject: String,
    pub body: String,
    pub delivery_status: DeliveryStatus,
    /// Provider diagnostic for failed or bounced deliveries
    pub diagnostic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Uploaded file metadata. Object storage is handled elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub uploader_id: Uuid,
    pub file_name: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub storage_key: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Who produced a thread item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Author {
    Staff(Uuid),
    Lead,
    System,
}

/// Common projection shared by every channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub channel: Channel,
    pub timestamp: DateTime<Utc>,
    pub author: Author,
    pub excerpt: String,
}

/// One entry of a lead's thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "item", rename_all = "snake_case")]
pub enum CommunicationItem {
    Note(Note),
    Message(InternalMessage),
    Email(Email),
    File(FileAttachment),
}

impl CommunicationItem {
    pub fn id(&self) -> Uuid {
        match self {
            CommunicationItem::Note(note) => note.id,
            CommunicationItem::Message(message) => message.id,
            CommunicationItem::Email(email) => email.id,
            CommunicationItem::File(file) => file.id,
        }
    }

    pub fn lead_id(&self) -> Uuid {
        match self {
            CommunicationItem::Note(note) => note.lead_id,
            CommunicationItem::Message(message) => message.lead_id,
            CommunicationItem::Email(email) => email.lead_id,
            CommunicationItem::File(file) => file.lead_id,
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            CommunicationItem::Note(_) => Channel::Note,
            CommunicationItem::Message(_) => Channel::Message,
            CommunicationItem::Email(_) => Channel::Email,
            CommunicationItem::File(_) => Channel::File,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            CommunicationItem::Note(note) => note.created_at,
            CommunicationItem::Message(message) => message.created_at,
            CommunicationItem::Email(email) => email.created_at,
            CommunicationItem::File(file) => file.created_at,
        }
    }

    pub fn author(&self) -> Author {
        match self {
            CommunicationItem::Note(note) => note.author_id.map_or(Author::System, Author::Staff),
            CommunicationItem::Message(message) => Author::Staff(message.author_id),
            CommunicationItem::Email(email) => match (email.direction, email.sender_id) {
                (EmailDirection::Inbound, _) => Author::Lead,
                (EmailDirection::Outbound, Some(sender)) => Author::Staff(sender),
                (EmailDirection::Outbound, None) => Author::System,
            },
            CommunicationItem::File(file) => Author::Staff(file.uploader_id),
        }
    }

    pub fn summary(&self) -> ItemSummary {
        let text = match self {
            CommunicationItem::Note(note) => note.body.clone(),
            CommunicationItem::Message(message) if message.subject.trim().is_empty() => {
                message.body_plain.clone()
            }
            CommunicationItem::Message(message) => message.subject.clone(),
            CommunicationItem::Email(email) => email.subject.clone(),
            CommunicationItem::File(file) => match &file.description {
                Some(description) => format!("{} ({})", file.file_name, description),
                None => file.file_name.clone(),
            },
        };

        ItemSummary {
            channel: self.channel(),
            timestamp: self.created_at(),
            author: self.author(),
            excerpt: excerpt(&text),
        }
    }

    /// Thread order: creation time, then channel, then id so that equal
    /// timestamps still sort deterministically.
    pub fn thread_order(a: &CommunicationItem, b: &CommunicationItem) -> Ordering {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.channel().cmp(&b.channel()))
            .then_with(|| a.id().cmp(&b.id()))
    }

    /// Strip provider diagnostics for viewers not allowed to see them.
    pub fn without_diagnostics(self) -> Self {
        match self {
            CommunicationItem::Email(mut email) => {
                email.diagnostic = None;
                CommunicationItem::Email(email)
            }
            other => other,
        }
    }
}

/// Collapse whitespace and cut to [`EXCERPT_MAX_CHARS`] characters.
pub fn excerpt(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= EXCERPT_MAX_CHARS {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(EXCERPT_MAX_CHARS - 1).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn email_at(lead_id: Uuid, at: DateTime<Utc>) -> Email {
        Email {
            id: Uuid::new_v4(),
            lead_id,
            direction: EmailDirection::Inbound,
            sender_id: None,
            counterpart: "j@x.fr".to_string(),
            subject: "Re: votre dossier".to_string(),
            body: "Bonjour".to_string(),
            delivery_status: DeliveryStatus::Delivered,
            diagnostic: Some("mailbox full".to_string()),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn summary_projects_every_variant() {
        let lead_id = Uuid::new_v4();
        let now = Utc::now();
        let note = CommunicationItem::Note(Note::system(lead_id, "Status changed", now));
        let email = CommunicationItem::Email(email_at(lead_id, now));

        assert_eq!(note.summary().author, Author::System);
        assert_eq!(note.summary().excerpt, "Status changed");
        assert_eq!(email.summary().author, Author::Lead);
        assert_eq!(email.summary().channel, Channel::Email);
    }

    #[test]
    fn thread_order_is_by_timestamp() {
        let lead_id = Uuid::new_v4();
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(1);
        let mut items = vec![
            CommunicationItem::Email(email_at(lead_id, t2)),
            CommunicationItem::Note(Note::system(lead_id, "first", t1)),
        ];
        items.sort_by(CommunicationItem::thread_order);

        assert_eq!(items[0].channel(), Channel::Note);
        assert_eq!(items[1].channel(), Channel::Email);
    }

    #[test]
    fn diagnostics_can_be_stripped() {
        let item = CommunicationItem::Email(email_at(Uuid::new_v4(), Utc::now()));
        match item.without_diagnostics() {
            CommunicationItem::Email(email) => assert_eq!(email.diagnostic, None),
            _ => unreachable!(),
        }
    }

    #[test]
    fn delivery_status_only_moves_forward() {
        assert!(DeliveryStatus::Queued.can_become(DeliveryStatus::Sent));
        assert!(DeliveryStatus::Sent.can_become(DeliveryStatus::Delivered));
        assert!(DeliveryStatus::Delivered.can_become(DeliveryStatus::Bounced));
        assert!(!DeliveryStatus::Delivered.can_become(DeliveryStatus::Sent));
        assert!(!DeliveryStatus::Failed.can_become(DeliveryStatus::Delivered));
    }

    #[test]
    fn long_text_is_cut() {
        let text = "a ".repeat(200);
        let short = excerpt(&text);
        assert_eq!(short.chars().count(), EXCERPT_MAX_CHARS);
        assert!(short.ends_with('…'));
    }
}
