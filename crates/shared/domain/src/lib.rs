//! Domain layer - Core business entities and value objects.
//!
//! This crate contains pure domain logic with no infrastructure dependencies:
//! the capability model, the lead lifecycle and merge rules, communication
//! records, templates and search predicates.

pub mod communication;
pub mod constants;
pub mod context;
pub mod error;
pub mod event;
pub mod filter;
pub mod lead;
pub mod role;
pub mod staff;
pub mod template;

pub use communication::{
    excerpt, Author, Channel, CommunicationItem, DeliveryStatus, Email, EmailDirection,
    FileAttachment, InternalMessage, ItemSummary, Note,
};
pub use constants::*;
pub use context::StaffContext;
pub use error::{DomainError, DomainResult};
pub use event::{ChangeEvent, ChangeKind, Subject, Topic};
pub use filter::{AssignmentFilter, CreatedBucket, LeadQuery, Scope};
pub use lead::{
    is_postal_code, normalize_email, short_reference, Advance, ClientType, FormType, Lead,
    LeadPatch, LeadStatus, LeadView, PaymentDecision, PaymentStatus, ProjectStatus,
    SubmissionKind,
};
pub use role::{
    effective_capabilities, resolve, visible_fields, Capability, CapabilityOverrides,
    CapabilitySet, FieldSet, LeadField, Role,
};
pub use staff::{NewStaff, StaffAccount, StaffResponse};
pub use template::{render, TemplateContext};
