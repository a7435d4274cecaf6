//! Domain-level constants.
//!
//! These constants define business rules and validation requirements.

// =============================================================================
// Staff Roles
// =============================================================================

/// Full control, including role changes and compliance purges
pub const ROLE_SUPERADMIN: &str = "superadmin";

/// Team lead with payment visibility and staff management
pub const ROLE_MANAGER: &str = "manager";

/// Case handler restricted to the leads assigned to them
pub const ROLE_OPERATOR: &str = "operator";

// =============================================================================
// Intake Funnel
// =============================================================================

/// Highest step of the public intake form (the final, complete step)
pub const MAX_FORM_STEP: i32 = 3;

/// Prefix of the short human-readable case reference
pub const REFERENCE_PREFIX: &str = "RAC-";

/// Number of hex characters taken from the lead id for the reference
pub const REFERENCE_LENGTH: usize = 8;

/// Maximum characters kept in a thread excerpt
pub const EXCERPT_MAX_CHARS: usize = 140;

// =============================================================================
// Search
// =============================================================================

/// Default page size for lead listings
pub const DEFAULT_PAGE_SIZE: u64 = 25;

/// Upper bound for a single page
pub const MAX_PAGE_SIZE: u64 = 200;

/// Upper bound on rows in one CSV export
pub const MAX_EXPORT_ROWS: u64 = 10_000;

// =============================================================================
// Authentication
// =============================================================================

/// Minimum JWT secret length (security requirement)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Authorization header prefix for Bearer tokens
pub const BEARER_TOKEN_PREFIX: &str = "Bearer ";

/// Payment links stay valid for this many hours
pub const PAYMENT_LINK_TTL_HOURS: i64 = 72;
