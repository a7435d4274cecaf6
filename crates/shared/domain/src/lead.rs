//! Lead domain entity, lifecycle enums and the funnel merge rules.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::ValidateEmail;

use crate::constants::{MAX_FORM_STEP, REFERENCE_LENGTH, REFERENCE_PREFIX};
use crate::error::{DomainError, DomainResult};
use crate::role::{FieldSet, LeadField};

/// Declares `as_str`, `Display` and a rejecting `FromStr` for a unit enum
/// whose serde representation is snake_case.
macro_rules! string_enum {
    ($name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(DomainError::validation(
                        $field,
                        format!("unknown {} '{}'", $field, other),
                    )),
                }
            }
        }
    };
}

/// Coarse lifecycle of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Draft,
    Partial,
    Submitted,
    InReview,
    Assigned,
    Resolved,
}

string_enum!(LeadStatus, "status", {
    Draft => "draft",
    Partial => "partial",
    Submitted => "submitted",
    InReview => "in_review",
    Assigned => "assigned",
    Resolved => "resolved",
});

impl LeadStatus {
    /// The funnel has been completed at least once.
    pub fn is_submitted_or_later(&self) -> bool {
        !matches!(self, LeadStatus::Draft | LeadStatus::Partial)
    }

    /// Lifecycle after `assigned_to` is set or cleared.
    pub fn after_assignment(self, assigned: bool) -> LeadStatus {
        match (self, assigned) {
            (LeadStatus::Submitted | LeadStatus::InReview, true) => LeadStatus::Assigned,
            (LeadStatus::Assigned, false) => LeadStatus::InReview,
            (status, _) => status,
        }
    }
}

/// Workflow sub-state edited by staff on submitted leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Nouveau,
    Contacte,
    EnCours,
    DevisEnvoye,
    Valide,
    Refuse,
}

string_enum!(ProjectStatus, "project_status", {
    Nouveau => "nouveau",
    Contacte => "contacte",
    EnCours => "en_cours",
    DevisEnvoye => "devis_envoye",
    Valide => "valide",
    Refuse => "refuse",
});

/// Payment axis, independent from the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

string_enum!(PaymentStatus, "payment_status", {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Individual,
    Business,
    PublicEntity,
}

string_enum!(ClientType, "client_type", {
    Individual => "individual",
    Business => "business",
    PublicEntity => "public_entity",
});

impl ClientType {
    /// Fields required on top of the common set when finalizing.
    pub fn required_fields(&self) -> &'static [LeadField] {
        match self {
            ClientType::Individual => &[],
            ClientType::Business | ClientType::PublicEntity => {
                &[LeadField::CompanyName, LeadField::RegistrationNumber]
            }
        }
    }
}

/// Which public form produced the lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    #[default]
    Connection,
    PowerIncrease,
    Relocation,
}

string_enum!(FormType, "form_type", {
    Connection => "connection",
    PowerIncrease => "power_increase",
    Relocation => "relocation",
});

/// Fields every finalized lead must carry, whatever the client type.
const COMMON_REQUIRED: &[LeadField] = &[
    LeadField::FirstName,
    LeadField::LastName,
    LeadField::Phone,
    LeadField::ClientType,
    LeadField::ConnectionType,
    LeadField::ProjectType,
    LeadField::PowerKva,
    LeadField::Address,
    LeadField::PostalCode,
    LeadField::City,
];

/// Lead domain entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    /// Natural key of the funnel upsert, stored lowercase
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub client_type: Option<ClientType>,
    pub company_name: Option<String>,
    pub registration_number: Option<String>,
    pub connection_type: Option<String>,
    pub project_type: Option<String>,
    pub power_kva: Option<i32>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub form_type: FormType,
    /// Highest funnel step reached
    pub form_step: i32,
    pub status: LeadStatus,
    pub project_status: ProjectStatus,
    pub payment_status: PaymentStatus,
    pub amount_cents: Option<i64>,
    pub payment_session_ref: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Funnel submissions: a step save or the final submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    Step,
    /// Final submission; `fee_cents` is charged unless an amount is set
    Final { fee_cents: i64 },
}

/// Result of merging a submission into a lead.
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    pub lead: Lead,
    /// First transition into `submitted`
    pub newly_submitted: bool,
    /// Whether anything differs from the stored record
    pub changed: bool,
}

/// What to do with a payment confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentDecision {
    Apply,
    Duplicate,
}

impl Lead {
    /// Empty record created on the first submission for an identity.
    pub fn skeleton(id: Uuid, email: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            email,
            first_name: None,
            last_name: None,
            phone: None,
            client_type: None,
            company_name: None,
            registration_number: None,
            connection_type: None,
            project_type: None,
            power_kva: None,
            address: None,
            postal_code: None,
            city: None,
            form_type: FormType::default(),
            form_step: 0,
            status: LeadStatus::Draft,
            project_status: ProjectStatus::Nouveau,
            payment_status: PaymentStatus::Pending,
            amount_cents: None,
            payment_session_ref: None,
            assigned_to: None,
            comments: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Short human-readable reference derived from the id.
    pub fn reference(&self) -> String {
        short_reference(self.id)
    }

    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Field-level merge: only fields present in the patch are written and
    /// `form_step` only moves forward.
    pub fn apply_patch(&mut self, patch: &LeadPatch) {
        fn merge<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if let Some(value) = value {
                *target = Some(value.clone());
            }
        }

        merge(&mut self.first_name, &patch.first_name);
        merge(&mut self.last_name, &patch.last_name);
        merge(&mut self.phone, &patch.phone);
        merge(&mut self.client_type, &patch.client_type);
        merge(&mut self.company_name, &patch.company_name);
        merge(&mut self.registration_number, &patch.registration_number);
        merge(&mut self.connection_type, &patch.connection_type);
        merge(&mut self.project_type, &patch.project_type);
        merge(&mut self.power_kva, &patch.power_kva);
        merge(&mut self.address, &patch.address);
        merge(&mut self.postal_code, &patch.postal_code);
        merge(&mut self.city, &patch.city);
        merge(&mut self.comments, &patch.comments);
        if let Some(form_type) = patch.form_type {
            self.form_type = form_type;
        }
        if let Some(step) = patch.form_step {
            self.form_step = self.form_step.max(step);
        }
    }

    /// Required fields absent from the record, by name.
    pub fn missing_required_fields(&self) -> Vec<String> {
        let type_specific = self
            .client_type
            .map(|client_type| client_type.required_fields())
            .unwrap_or(&[]);

        COMMON_REQUIRED
            .iter()
            .chain(type_specific)
            .filter(|field| !self.has_value(**field))
            .map(|field| field.as_str().to_string())
            .collect()
    }

    fn has_value(&self, field: LeadField) -> bool {
        match field {
            LeadField::FirstName => self.first_name.is_some(),
            LeadField::LastName => self.last_name.is_some(),
            LeadField::Phone => self.phone.is_some(),
            LeadField::ClientType => self.client_type.is_some(),
            LeadField::CompanyName => self.company_name.is_some(),
            LeadField::RegistrationNumber => self.registration_number.is_some(),
            LeadField::ConnectionType => self.connection_type.is_some(),
            LeadField::ProjectType => self.project_type.is_some(),
            LeadField::PowerKva => self.power_kva.is_some(),
            LeadField::Address => self.address.is_some(),
            LeadField::PostalCode => self.postal_code.is_some(),
            LeadField::City => self.city.is_some(),
            LeadField::Comments => self.comments.is_some(),
            LeadField::AmountCents => self.amount_cents.is_some(),
            LeadField::AssignedTo => self.assigned_to.is_some(),
            _ => true,
        }
    }

    /// Merge a funnel submission. Pure: the caller persists `lead` only when
    /// this returns `Ok`, so a rejected finalize leaves the record untouched.
    pub fn advance(
        &self,
        patch: &LeadPatch,
        kind: SubmissionKind,
        now: DateTime<Utc>,
    ) -> DomainResult<Advance> {
        patch.validate()?;

        let mut next = self.clone();
        next.apply_patch(patch);
        let mut newly_submitted = false;

        match kind {
            SubmissionKind::Step => {
                if next.status == LeadStatus::Draft && next.form_step >= 1 {
                    next.status = LeadStatus::Partial;
                }
            }
            SubmissionKind::Final { fee_cents } => {
                let missing = next.missing_required_fields();
                if !missing.is_empty() {
                    return Err(DomainError::missing_fields(missing));
                }
                next.form_step = next.form_step.max(MAX_FORM_STEP);
                if !next.status.is_submitted_or_later() {
                    next.status = LeadStatus::Submitted;
                    newly_submitted = true;
                }
                if next.amount_cents.is_none() {
                    next.amount_cents = Some(fee_cents);
                }
            }
        }

        let changed = next != *self;
        if changed {
            next.updated_at = now;
        }

        Ok(Advance {
            lead: next,
            newly_submitted,
            changed,
        })
    }

    /// Payment confirmations are idempotent: anything after `paid`, or a
    /// repeat of the stored outcome, is a duplicate.
    pub fn payment_decision(&self, status: PaymentStatus, amount_cents: i64) -> PaymentDecision {
        if self.payment_status == PaymentStatus::Paid {
            return PaymentDecision::Duplicate;
        }
        if status != PaymentStatus::Pending
            && self.payment_status == status
            && self.amount_cents == Some(amount_cents)
        {
            return PaymentDecision::Duplicate;
        }
        PaymentDecision::Apply
    }

    /// Reopening a resolved lead loops back to `assigned`.
    pub fn reopened_status(&self) -> DomainResult<LeadStatus> {
        if self.status != LeadStatus::Resolved {
            return Err(DomainError::conflict(format!(
                "lead {} is {}, only resolved leads can be reopened",
                self.reference(),
                self.status
            )));
        }
        Ok(LeadStatus::Assigned)
    }

    /// Text value of a field, used for tabular exports.
    pub fn cell(&self, field: LeadField) -> String {
        fn text<T: ToString>(value: &Option<T>) -> String {
            value.as_ref().map(ToString::to_string).unwrap_or_default()
        }

        match field {
            LeadField::Reference => self.reference(),
            LeadField::Email => self.email.clone(),
            LeadField::FirstName => text(&self.first_name),
            LeadField::LastName => text(&self.last_name),
            LeadField::Phone => text(&self.phone),
            LeadField::ClientType => text(&self.client_type),
            LeadField::CompanyName => text(&self.company_name),
            LeadField::RegistrationNumber => text(&self.registration_number),
            LeadField::ConnectionType => text(&self.connection_type),
            LeadField::ProjectType => text(&self.project_type),
            LeadField::PowerKva => text(&self.power_kva),
            LeadField::Address => text(&self.address),
            LeadField::PostalCode => text(&self.postal_code),
            LeadField::City => text(&self.city),
            LeadField::FormType => self.form_type.to_string(),
            LeadField::FormStep => self.form_step.to_string(),
            LeadField::Status => self.status.to_string(),
            LeadField::ProjectStatus => self.project_status.to_string(),
            LeadField::PaymentStatus => self.payment_status.to_string(),
            LeadField::AmountCents => text(&self.amount_cents),
            LeadField::AssignedTo => text(&self.assigned_to),
            LeadField::Comments => text(&self.comments),
            LeadField::CreatedAt => self.created_at.to_rfc3339(),
            LeadField::UpdatedAt => self.updated_at.to_rfc3339(),
        }
    }

    /// Project the record through a visible-field set.
    pub fn project(&self, fields: &FieldSet) -> LeadView {
        fn pick<T>(fields: &FieldSet, field: LeadField, value: T) -> Option<T> {
            fields.contains(&field).then_some(value)
        }

        LeadView {
            id: self.id,
            reference: pick(fields, LeadField::Reference, self.reference()),
            email: pick(fields, LeadField::Email, self.email.clone()),
            first_name: pick(fields, LeadField::FirstName, self.first_name.clone()).flatten(),
            last_name: pick(fields, LeadField::LastName, self.last_name.clone()).flatten(),
            phone: pick(fields, LeadField::Phone, self.phone.clone()).flatten(),
            client_type: pick(fields, LeadField::ClientType, self.client_type).flatten(),
            company_name: pick(fields, LeadField::CompanyName, self.company_name.clone()).flatten(),
            registration_number: pick(
                fields,
                LeadField::RegistrationNumber,
                self.registration_number.clone(),
            )
            .flatten(),
            connection_type: pick(fields, LeadField::ConnectionType, self.connection_type.clone())
                .flatten(),
            project_type: pick(fields, LeadField::ProjectType, self.project_type.clone()).flatten(),
            power_kva: pick(fields, LeadField::PowerKva, self.power_kva).flatten(),
            address: pick(fields, LeadField::Address, self.address.clone()).flatten(),
            postal_code: pick(fields, LeadField::PostalCode, self.postal_code.clone()).flatten(),
            city: pick(fields, LeadField::City, self.city.clone()).flatten(),
            form_type: pick(fields, LeadField::FormType, self.form_type),
            form_step: pick(fields, LeadField::FormStep, self.form_step),
            status: pick(fields, LeadField::Status, self.status),
            project_status: pick(fields, LeadField::ProjectStatus, self.project_status),
            payment_status: pick(fields, LeadField::PaymentStatus, self.payment_status),
            amount_cents: pick(fields, LeadField::AmountCents, self.amount_cents).flatten(),
            assigned_to: pick(fields, LeadField::AssignedTo, self.assigned_to).flatten(),
            comments: pick(fields, LeadField::Comments, self.comments.clone()).flatten(),
            created_at: pick(fields, LeadField::CreatedAt, self.created_at),
            updated_at: pick(fields, LeadField::UpdatedAt, self.updated_at),
        }
    }
}

/// `RAC-` followed by the first hex characters of the id, uppercase.
pub fn short_reference(id: Uuid) -> String {
    let hex = id.simple().to_string().to_uppercase();
    format!("{}{}", REFERENCE_PREFIX, &hex[..REFERENCE_LENGTH])
}

/// Trim and lowercase an email, rejecting malformed addresses.
pub fn normalize_email(email: &str) -> DomainResult<String> {
    let normalized = email.trim().to_lowercase();
    if normalized.validate_email() {
        Ok(normalized)
    } else {
        Err(DomainError::validation("email", "invalid email address"))
    }
}

/// Partial field set sent by one funnel step.
///
/// Absent fields are left untouched on merge; blank strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LeadPatch {
    pub form_step: Option<i32>,
    pub form_type: Option<FormType>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub client_type: Option<ClientType>,
    pub company_name: Option<String>,
    pub registration_number: Option<String>,
    pub connection_type: Option<String>,
    pub project_type: Option<String>,
    pub power_kva: Option<i32>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub comments: Option<String>,
}

impl LeadPatch {
    /// Trim text fields and drop blank ones.
    pub fn normalized(mut self) -> Self {
        fn clean(value: &mut Option<String>) {
            *value = value
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }

        clean(&mut self.first_name);
        clean(&mut self.last_name);
        clean(&mut self.phone);
        clean(&mut self.company_name);
        clean(&mut self.registration_number);
        clean(&mut self.connection_type);
        clean(&mut self.project_type);
        clean(&mut self.address);
        clean(&mut self.postal_code);
        clean(&mut self.city);
        clean(&mut self.comments);
        self
    }

    /// Format checks on the fields present. Every offending field is reported.
    pub fn validate(&self) -> DomainResult<()> {
        let mut invalid = Vec::new();

        if let Some(step) = self.form_step {
            if !(0..=MAX_FORM_STEP).contains(&step) {
                invalid.push(LeadField::FormStep);
            }
        }
        if let Some(code) = &self.postal_code {
            if !is_postal_code(code) {
                invalid.push(LeadField::PostalCode);
            }
        }
        if let Some(phone) = &self.phone {
            let digits = phone.chars().filter(char::is_ascii_digit).count();
            let allowed = phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '.' | '-'));
            if !allowed || !(10..=15).contains(&digits) {
                invalid.push(LeadField::Phone);
            }
        }
        if let Some(power) = self.power_kva {
            if !(1..=10_000).contains(&power) {
                invalid.push(LeadField::PowerKva);
            }
        }
        if let Some(number) = &self.registration_number {
            if !number.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ') {
                invalid.push(LeadField::RegistrationNumber);
            }
        }

        if invalid.is_empty() {
            Ok(())
        } else {
            Err(DomainError::missing_fields(
                invalid.iter().map(|f| f.as_str().to_string()).collect(),
            ))
        }
    }
}

/// Five-digit postal code.
pub fn is_postal_code(code: &str) -> bool {
    code.len() == 5 && code.chars().all(|c| c.is_ascii_digit())
}

/// Lead as seen by one viewer. Fields outside the viewer's set are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LeadView {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_type: Option<ClientType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_kva: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_type: Option<FormType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_step: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LeadStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
