//! Staff account handlers.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use common::AppResult;
use domain::{CapabilityOverrides, NewStaff, Role, StaffContext, StaffResponse};

use crate::extractors::ValidatedJson;
use crate::state::AppState;

/// Staff creation request with validation
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateStaffRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "agent@example.fr")]
    pub email: String,
    pub role: Role,
    #[validate(length(max = 100))]
    #[schema(example = "Raccordement")]
    pub department: Option<String>,
    #[serde(default)]
    pub overrides: CapabilityOverrides,
}

impl From<CreateStaffRequest> for NewStaff {
    fn from(req: CreateStaffRequest) -> Self {
        Self {
            email: req.email,
            role: req.role,
            department: req.department,
            overrides: req.overrides,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ActiveRequest {
    pub active: bool,
}

/// Create staff routes
pub fn staff_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_staff).post(create_staff))
        .route("/me", get(me))
        .route("/:id/role", put(change_role))
        .route("/:id/active", put(set_active))
        .route("/:id/capabilities", put(set_capabilities))
}

/// Current staff account
#[utoipa::path(
    get,
    path = "/staff/me",
    tag = "Staff",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current account with effective capabilities", body = StaffResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn me(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
) -> AppResult<Json<StaffResponse>> {
    Ok(Json(state.services.staff().me(&ctx).await?))
}

/// List staff accounts
#[utoipa::path(
    get,
    path = "/staff",
    tag = "Staff",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All staff accounts", body = Vec<StaffResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "User management not allowed")
    )
)]
pub async fn list_staff(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<StaffResponse>>> {
    Ok(Json(state.services.staff().list(&ctx).await?))
}

/// Create a staff account
#[utoipa::path(
    post,
    path = "/staff",
    tag = "Staff",
    security(("bearer_auth" = [])),
    request_body = CreateStaffRequest,
    responses(
        (status = 201, description = "Account created", body = StaffResponse),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Role not assignable by the caller"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_staff(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateStaffRequest>,
) -> AppResult<(StatusCode, Json<StaffResponse>)> {
    let account = state.services.staff().create(&ctx, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Change a staff role
#[utoipa::path(
    put,
    path = "/staff/{id}/role",
    tag = "Staff",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Staff ID")),
    request_body = RoleRequest,
    responses(
        (status = 200, description = "Account updated", body = StaffResponse),
        (status = 403, description = "Role changes not allowed"),
        (status = 404, description = "Staff account not found")
    )
)]
pub async fn change_role(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RoleRequest>,
) -> AppResult<Json<StaffResponse>> {
    let account = state
        .services
        .staff()
        .change_role(&ctx, id, payload.role)
        .await?;
    Ok(Json(account))
}

/// Activate or deactivate a staff account
#[utoipa::path(
    put,
    path = "/staff/{id}/active",
    tag = "Staff",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Staff ID")),
    request_body = ActiveRequest,
    responses(
        (status = 200, description = "Account updated", body = StaffResponse),
        (status = 403, description = "Not allowed, or deactivating oneself"),
        (status = 404, description = "Staff account not found")
    )
)]
pub async fn set_active(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActiveRequest>,
) -> AppResult<Json<StaffResponse>> {
    let account = state
        .services
        .staff()
        .set_active(&ctx, id, payload.active)
        .await?;
    Ok(Json(account))
}

/// Replace capability overrides
#[utoipa::path(
    put,
    path = "/staff/{id}/capabilities",
    tag = "Staff",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Staff ID")),
    request_body = CapabilityOverrides,
    responses(
        (status = 200, description = "Account updated", body = StaffResponse),
        (status = 403, description = "User management not allowed"),
        (status = 404, description = "Staff account not found")
    )
)]
pub async fn set_capabilities(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(overrides): Json<CapabilityOverrides>,
) -> AppResult<Json<StaffResponse>> {
    let account = state
        .services
        .staff()
        .set_overrides(&ctx, id, overrides)
        .await?;
    Ok(Json(account))
}
