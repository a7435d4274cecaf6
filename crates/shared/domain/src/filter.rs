//! Lead search predicates.
//!
//! A [`LeadQuery`] holds the user-chosen facets. The viewer's [`Scope`] is a
//! separate predicate that the search engine always ANDs in first, so no
//! combination of facets can widen what a viewer may see.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use uuid::Uuid;

use crate::lead::{FormType, Lead, LeadStatus};

/// Assignment facet. `Unassigned` means `assigned_to IS NULL` and is
/// distinct from `Me`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssignmentFilter {
    #[default]
    Any,
    Unassigned,
    Me,
    Staff(Uuid),
}

/// Creation date facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatedBucket {
    /// Since midnight UTC
    Today,
    /// Last 7 days
    Week,
    /// Last 30 days
    Month,
    /// Inclusive range, open ends allowed
    Range {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
}

impl CreatedBucket {
    /// Concrete `[from, to]` bounds relative to `now`.
    pub fn bounds(&self, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match *self {
            CreatedBucket::Today => (Some(now.date_naive().and_time(NaiveTime::MIN).and_utc()), None),
            CreatedBucket::Week => (Some(now - Duration::days(7)), None),
            CreatedBucket::Month => (Some(now - Duration::days(30)), None),
            CreatedBucket::Range { from, to } => (from, to),
        }
    }
}

/// User-selected facets, AND-combined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadQuery {
    /// Case-insensitive match on name, email, phone or company
    pub text: Option<String>,
    pub status: Option<LeadStatus>,
    pub form_type: Option<FormType>,
    pub assignment: AssignmentFilter,
    pub created: Option<CreatedBucket>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

/// Base visibility of a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    AssignedTo(Uuid),
}

impl Scope {
    pub fn admits(&self, lead: &Lead) -> bool {
        match self {
            Scope::All => true,
            Scope::AssignedTo(staff_id) => lead.assigned_to == Some(*staff_id),
        }
    }
}

impl LeadQuery {
    /// In-process evaluation of the facets. `viewer` resolves [`AssignmentFilter::Me`].
    pub fn matches(&self, lead: &Lead, viewer: Uuid, now: DateTime<Utc>) -> bool {
        self.matches_text(lead)
            && self.status.map_or(true, |status| lead.status == status)
            && self.form_type.map_or(true, |form| lead.form_type == form)
            && self.matches_assignment(lead, viewer)
            && self.matches_created(lead, now)
            && self
                .city
                .as_deref()
                .map_or(true, |city| eq_ignore_case(lead.city.as_deref(), city))
            && self
                .postal_code
                .as_deref()
                .map_or(true, |code| lead.postal_code.as_deref() == Some(code.trim()))
    }

    fn matches_text(&self, lead: &Lead) -> bool {
        let Some(needle) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return true;
        };
        let needle = needle.to_lowercase();

        [
            lead.first_name.as_deref(),
            lead.last_name.as_deref(),
            Some(lead.email.as_str()),
            lead.phone.as_deref(),
            lead.company_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|value| value.to_lowercase().contains(&needle))
    }

    fn matches_assignment(&self, lead: &Lead, viewer: Uuid) -> bool {
        match self.assignment {
            AssignmentFilter::Any => true,
            AssignmentFilter::Unassigned => lead.assigned_to.is_none(),
            AssignmentFilter::Me => lead.assigned_to == Some(viewer),
            AssignmentFilter::Staff(staff_id) => lead.assigned_to == Some(staff_id),
        }
    }

    fn matches_created(&self, lead: &Lead, now: DateTime<Utc>) -> bool {
        let Some(bucket) = self.created else {
            return true;
        };
        let (from, to) = bucket.bounds(now);
        from.map_or(true, |from| lead.created_at >= from) && to.map_or(true, |to| lead.created_at <= to)
    }
}

fn eq_ignore_case(value: Option<&str>, expected: &str) -> bool {
    value.is_some_and(|value| value.trim().eq_ignore_ascii_case(expected.trim()))
}
