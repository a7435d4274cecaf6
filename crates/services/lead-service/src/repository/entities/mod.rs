//! SeaORM entities.
//!
//! Enum-valued columns are stored as their snake_case text and parsed back
//! through the domain `FromStr` impls, so an unknown value in the database
//! surfaces as an error instead of a silent default.

pub mod email;
pub mod file_attachment;
pub mod internal_message;
pub mod lead;
pub mod note;
pub mod payment_session;
pub mod staff_account;

use common::AppError;
use domain::DomainError;

/// A row that does not map onto the domain model.
pub(crate) fn corrupt_row(table: &str, err: DomainError) -> AppError {
    AppError::internal(format!("corrupt {} row: {}", table, err))
}
