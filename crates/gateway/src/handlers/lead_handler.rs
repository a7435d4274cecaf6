//! Staff lead handlers: listing, export, lifecycle and assignment.

use axum::{
    extract::{Extension, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use common::{AppError, AppResult, Paginated, PaginationParams};
use domain::{
    AssignmentFilter, CreatedBucket, FormType, LeadQuery, LeadStatus, LeadView, ProjectStatus,
    StaffContext, DEFAULT_PAGE_SIZE,
};

use crate::extractors::ValidatedJson;
use crate::handlers::confirmed;
use crate::state::AppState;

/// Query string of the lead list and export.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeadListParams {
    /// Page number, from 1
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Matches name, email, phone or company
    pub text: Option<String>,
    pub status: Option<String>,
    pub form_type: Option<String>,
    /// `any`, `unassigned`, `me` or a staff id
    pub assignment: Option<String>,
    /// `today`, `week` or `month`; ignored when `from` or `to` is given
    pub created: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl LeadListParams {
    pub fn to_query(&self) -> AppResult<LeadQuery> {
        let status = non_blank(&self.status)
            .map(|s| s.parse::<LeadStatus>())
            .transpose()?;
        let form_type = non_blank(&self.form_type)
            .map(|s| s.parse::<FormType>())
            .transpose()?;

        let assignment = match non_blank(&self.assignment) {
            None | Some("any") => AssignmentFilter::Any,
            Some("unassigned") => AssignmentFilter::Unassigned,
            Some("me") => AssignmentFilter::Me,
            Some(other) => AssignmentFilter::Staff(Uuid::parse_str(other).map_err(|_| {
                AppError::invalid_field("assignment", format!("unknown assignment '{}'", other))
            })?),
        };

        let created = if self.from.is_some() || self.to.is_some() {
            Some(CreatedBucket::Range {
                from: self.from,
                to: self.to,
            })
        } else {
            match non_blank(&self.created) {
                None => None,
                Some("today") => Some(CreatedBucket::Today),
                Some("week") => Some(CreatedBucket::Week),
                Some("month") => Some(CreatedBucket::Month),
                Some(other) => {
                    return Err(AppError::invalid_field(
                        "created",
                        format!("unknown created bucket '{}'", other),
                    ))
                }
            }
        };

        Ok(LeadQuery {
            text: non_blank(&self.text).map(str::to_string),
            status,
            form_type,
            assignment,
            created,
            city: non_blank(&self.city).map(str::to_string),
            postal_code: non_blank(&self.postal_code).map(str::to_string),
        })
    }

    pub fn page(&self) -> PaginationParams {
        PaginationParams::new(
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }
}

/// One page of leads.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeadPage {
    pub data: Vec<LeadView>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl From<Paginated<LeadView>> for LeadPage {
    fn from(page: Paginated<LeadView>) -> Self {
        Self {
            data: page.data,
            page: page.meta.page,
            per_page: page.meta.per_page,
            total: page.meta.total,
            total_pages: page.meta.total_pages,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusRequest {
    pub status: LeadStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectStatusRequest {
    pub project_status: ProjectStatus,
}

/// Assignment target; `null` clears the assignment.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignmentRequest {
    #[validate(email(message = "staff_email must be an email address"))]
    #[schema(example = "agent@example.fr")]
    pub staff_email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentSessionResponse {
    pub session_ref: String,
    pub redirect_url: String,
}

/// Create lead routes
pub fn lead_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_leads))
        .route("/export", get(export_leads))
        .route("/:id", get(get_lead).delete(purge_lead))
        .route("/:id/status", put(set_status))
        .route("/:id/project-status", put(set_project_status))
        .route("/:id/reopen", post(reopen_lead))
        .route("/:id/assignment", put(assign_lead))
        .route("/:id/payment-session", post(start_payment_session))
}

fn view(ctx: &StaffContext, lead: &domain::Lead) -> Json<LeadView> {
    Json(lead.project(&ctx.visible_fields))
}

/// Search visible leads
#[utoipa::path(
    get,
    path = "/leads",
    tag = "Leads",
    security(("bearer_auth" = [])),
    params(LeadListParams),
    responses(
        (status = 200, description = "Matching leads, newest first", body = LeadPage),
        (status = 400, description = "Unknown filter value"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_leads(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Query(params): Query<LeadListParams>,
) -> AppResult<Json<LeadPage>> {
    let page = state
        .services
        .search()
        .query(&ctx, params.to_query()?, params.page())
        .await?;
    Ok(Json(page.into()))
}

/// Export matching leads as CSV
#[utoipa::path(
    get,
    path = "/leads/export",
    tag = "Leads",
    security(("bearer_auth" = [])),
    params(LeadListParams),
    responses(
        (status = 200, description = "CSV of the caller's visible columns", content_type = "text/csv", body = String),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Export not allowed")
    )
)]
pub async fn export_leads(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Query(params): Query<LeadListParams>,
) -> AppResult<Response> {
    let csv = state
        .services
        .search()
        .export_csv(&ctx, params.to_query()?)
        .await?;
    let file_name = format!("leads-{}.csv", Utc::now().format("%Y%m%d"));

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        csv,
    )
        .into_response())
}

/// Get one lead
#[utoipa::path(
    get,
    path = "/leads/{id}",
    tag = "Leads",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "Lead restricted to the caller's fields", body = LeadView),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Lead not found")
    )
)]
pub async fn get_lead(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LeadView>> {
    let lead = state.services.leads().get(&ctx, id).await?;
    Ok(view(&ctx, &lead))
}

/// Change the lifecycle status
#[utoipa::path(
    put,
    path = "/leads/{id}/status",
    tag = "Leads",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lead ID")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Updated lead", body = LeadView),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Lead not found"),
        (status = 409, description = "Transition not allowed")
    )
)]
pub async fn set_status(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> AppResult<Json<LeadView>> {
    let leads = state.services.leads();
    let lead = confirmed(&state, &ctx, leads.set_status(&ctx, id, payload.status)).await?;
    Ok(view(&ctx, &lead))
}

/// Change the project status of a submitted lead
#[utoipa::path(
    put,
    path = "/leads/{id}/project-status",
    tag = "Leads",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lead ID")),
    request_body = ProjectStatusRequest,
    responses(
        (status = 200, description = "Updated lead", body = LeadView),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Lead not found"),
        (status = 409, description = "Lead not submitted yet")
    )
)]
pub async fn set_project_status(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProjectStatusRequest>,
) -> AppResult<Json<LeadView>> {
    let leads = state.services.leads();
    let lead = confirmed(
        &state,
        &ctx,
        leads.set_project_status(&ctx, id, payload.project_status),
    )
    .await?;
    Ok(view(&ctx, &lead))
}

/// Reopen a resolved lead
#[utoipa::path(
    post,
    path = "/leads/{id}/reopen",
    tag = "Leads",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "Reopened lead", body = LeadView),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Lead not found"),
        (status = 409, description = "Lead is not resolved")
    )
)]
pub async fn reopen_lead(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LeadView>> {
    let leads = state.services.leads();
    let lead = confirmed(&state, &ctx, leads.reopen(&ctx, id)).await?;
    Ok(view(&ctx, &lead))
}

/// Assign or unassign a lead
#[utoipa::path(
    put,
    path = "/leads/{id}/assignment",
    tag = "Leads",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lead ID")),
    request_body = AssignmentRequest,
    responses(
        (status = 200, description = "Updated lead", body = LeadView),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Assignment not allowed"),
        (status = 404, description = "Lead or staff account not found"),
        (status = 409, description = "Staff account is deactivated")
    )
)]
pub async fn assign_lead(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<AssignmentRequest>,
) -> AppResult<Json<LeadView>> {
    let leads = state.services.leads();
    let lead = confirmed(&state, &ctx, leads.assign(&ctx, id, payload.staff_email)).await?;
    Ok(view(&ctx, &lead))
}

/// Open a checkout session for a lead
#[utoipa::path(
    post,
    path = "/leads/{id}/payment-session",
    tag = "Leads",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "Checkout session", body = PaymentSessionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Lead not found"),
        (status = 409, description = "Already paid"),
        (status = 503, description = "Payment provider unavailable")
    )
)]
pub async fn start_payment_session(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PaymentSessionResponse>> {
    let payments = state.services.payments();
    let session = confirmed(&state, &ctx, payments.start_payment_session(&ctx, id)).await?;
    Ok(Json(PaymentSessionResponse {
        session_ref: session.session_ref,
        redirect_url: session.redirect_url,
    }))
}

/// Delete a lead and its whole thread
#[utoipa::path(
    delete,
    path = "/leads/{id}",
    tag = "Leads",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 204, description = "Lead purged"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Purge not allowed"),
        (status = 404, description = "Lead not found")
    )
)]
pub async fn purge_lead(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let leads = state.services.leads();
    confirmed(&state, &ctx, leads.purge(&ctx, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_params_select_everything() {
        let query = LeadListParams::default().to_query().unwrap();
        assert_eq!(query, LeadQuery::default());
    }

    #[test]
    fn explicit_range_wins_over_bucket() {
        let from = Utc::now();
        let params = LeadListParams {
            created: Some("today".into()),
            from: Some(from),
            ..Default::default()
        };
        assert_eq!(
            params.to_query().unwrap().created,
            Some(CreatedBucket::Range {
                from: Some(from),
                to: None
            })
        );
    }

    #[test]
    fn assignment_accepts_staff_id() {
        let id = Uuid::new_v4();
        let params = LeadListParams {
            assignment: Some(id.to_string()),
            status: Some("in_review".into()),
            ..Default::default()
        };
        let query = params.to_query().unwrap();
        assert_eq!(query.assignment, AssignmentFilter::Staff(id));
        assert_eq!(query.status, Some(LeadStatus::InReview));
    }

    #[test]
    fn unknown_values_are_rejected() {
        let params = LeadListParams {
            assignment: Some("someone".into()),
            ..Default::default()
        };
        assert!(params.to_query().is_err());

        let params = LeadListParams {
            status: Some("lost".into()),
            ..Default::default()
        };
        assert!(params.to_query().is_err());
    }
}
