//! Change notifications pushed to connected staff sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::communication::Channel;
use crate::filter::Scope;

/// What a session subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "topic", content = "lead_id", rename_all = "snake_case")]
pub enum Topic {
    /// The lead collection (list views)
    Leads,
    /// One lead's thread
    Thread(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// The subscriber missed events and must re-fetch
    Resync,
}

/// Record type affected by a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Lead,
    Item(Channel),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub topic: Topic,
    pub kind: ChangeKind,
    pub subject: Subject,
    /// Affected record
    pub id: Uuid,
    /// Staff the lead is (or was, before this change) assigned to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<Uuid>,
    /// Echo of the writer's correlation id, used to confirm optimistic writes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn lead(kind: ChangeKind, lead_id: Uuid, assignees: Vec<Uuid>) -> Self {
        Self {
            topic: Topic::Leads,
            kind,
            subject: Subject::Lead,
            id: lead_id,
            assignees,
            correlation_id: None,
            at: Utc::now(),
        }
    }

    pub fn item(
        kind: ChangeKind,
        lead_id: Uuid,
        channel: Channel,
        item_id: Uuid,
        assignees: Vec<Uuid>,
    ) -> Self {
        Self {
            topic: Topic::Thread(lead_id),
            kind,
            subject: Subject::Item(channel),
            id: item_id,
            assignees,
            correlation_id: None,
            at: Utc::now(),
        }
    }

    pub fn resync(topic: Topic) -> Self {
        Self {
            topic,
            kind: ChangeKind::Resync,
            subject: Subject::Lead,
            id: Uuid::nil(),
            assignees: Vec::new(),
            correlation_id: None,
            at: Utc::now(),
        }
    }

    pub fn with_correlation(mut self, correlation_id: Option<Uuid>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Whether a viewer with `scope` may receive this event.
    pub fn visible_in(&self, scope: &Scope) -> bool {
        match scope {
            Scope::All => true,
            Scope::AssignedTo(_) if self.kind == ChangeKind::Resync => true,
            Scope::AssignedTo(staff_id) => self.assignees.contains(staff_id),
        }
    }
}
