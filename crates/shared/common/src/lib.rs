//! Common utilities shared across the services and the gateway.
//!
//! This crate provides:
//! - The error taxonomy and its HTTP mapping
//! - Configuration structures
//! - Pagination types

pub mod config;
pub mod error;
pub mod pagination;

pub use config::*;
pub use error::{AppError, AppResult, ErrorKind, OptionExt};
pub use pagination::{Paginated, PaginationMeta, PaginationParams};
