//! Public funnel handlers. No authentication; rate limited per client IP.

use axum::{
    extract::{Path, State},
    response::{Json, Redirect},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use common::AppResult;
use domain::{LeadPatch, LeadStatus};
use lead_service_lib::service::{FunnelOutcome, PostalResolution};

use crate::extractors::ValidatedJson;
use crate::state::AppState;

/// One funnel submission: the lead's email plus the fields of the step.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct FunnelRequest {
    #[validate(email(message = "A valid email address is required"))]
    #[schema(example = "jean.dupont@example.fr")]
    pub email: String,
    #[serde(flatten)]
    pub fields: LeadPatch,
}

/// Funnel step result.
#[derive(Debug, Serialize, ToSchema)]
pub struct StepResponse {
    pub lead_id: Uuid,
    pub reference: String,
    pub form_step: i32,
    pub status: LeadStatus,
    /// City on record, filled from the postal code when unambiguous
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Cities sharing the postal code; the client asks the lead to pick one
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
    /// The postal-code service could not be reached
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub postal_lookup_unavailable: bool,
}

impl From<FunnelOutcome> for StepResponse {
    fn from(outcome: FunnelOutcome) -> Self {
        let (candidates, postal_lookup_unavailable) = match outcome.postal {
            PostalResolution::Ambiguous(cities) => (cities, false),
            PostalResolution::Unavailable => (Vec::new(), true),
            _ => (Vec::new(), false),
        };
        Self {
            lead_id: outcome.lead.id,
            reference: outcome.lead.reference(),
            form_step: outcome.lead.form_step,
            status: outcome.lead.status,
            city: outcome.lead.city,
            candidates,
            postal_lookup_unavailable,
        }
    }
}

/// Final submission result.
#[derive(Debug, Serialize, ToSchema)]
pub struct FinalizeResponse {
    pub lead_id: Uuid,
    pub reference: String,
    pub status: LeadStatus,
    /// Signed link to the hosted checkout
    pub payment_link: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CitiesResponse {
    pub postal_code: String,
    pub cities: Vec<String>,
}

/// Create public funnel routes
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/leads/step", post(submit_step))
        .route("/leads/finalize", post(finalize))
        .route("/postal-codes/:code", get(cities_for_postal_code))
        .route("/pay/:token", get(open_payment_link))
}

/// Save one funnel step, creating the lead on first contact
#[utoipa::path(
    post,
    path = "/public/leads/step",
    tag = "Funnel",
    request_body = FunnelRequest,
    responses(
        (status = 200, description = "Step saved", body = StepResponse),
        (status = 400, description = "Validation error"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn submit_step(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<FunnelRequest>,
) -> AppResult<Json<StepResponse>> {
    let outcome = state
        .services
        .leads()
        .create_or_advance(&payload.email, payload.fields)
        .await?;
    Ok(Json(outcome.into()))
}

/// Submit the completed funnel
#[utoipa::path(
    post,
    path = "/public/leads/finalize",
    tag = "Funnel",
    request_body = FunnelRequest,
    responses(
        (status = 200, description = "Lead submitted", body = FinalizeResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn finalize(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<FunnelRequest>,
) -> AppResult<Json<FinalizeResponse>> {
    let outcome = state
        .services
        .leads()
        .finalize(&payload.email, payload.fields)
        .await?;
    let lead = outcome.lead;
    let payment_link = state.services.payments().payment_link(&lead)?;

    Ok(Json(FinalizeResponse {
        lead_id: lead.id,
        reference: lead.reference(),
        status: lead.status,
        payment_link,
    }))
}

/// Cities for a postal code
#[utoipa::path(
    get,
    path = "/public/postal-codes/{code}",
    tag = "Funnel",
    params(
        ("code" = String, Path, description = "Five-digit postal code")
    ),
    responses(
        (status = 200, description = "Matching cities, possibly none", body = CitiesResponse),
        (status = 400, description = "Malformed postal code"),
        (status = 503, description = "Postal code service unavailable")
    )
)]
pub async fn cities_for_postal_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<CitiesResponse>> {
    let code = code.trim().to_string();

    // Cache failures fall through to the lookup
    if let Some(cache) = state.cache.as_ref() {
        match cache.get_cities(&code).await {
            Ok(Some(cities)) => {
                return Ok(Json(CitiesResponse {
                    postal_code: code,
                    cities,
                }))
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Postal code cache unavailable"),
        }
    }

    let cities = state.services.leads().cities_for(&code).await?;

    if let Some(cache) = state.cache.as_ref() {
        if let Err(e) = cache.set_cities(&code, &cities).await {
            tracing::warn!(error = %e, "Could not cache postal code lookup");
        }
    }

    Ok(Json(CitiesResponse {
        postal_code: code,
        cities,
    }))
}

/// Follow an emailed payment link to the hosted checkout
#[utoipa::path(
    get,
    path = "/public/pay/{token}",
    tag = "Funnel",
    params(
        ("token" = String, Path, description = "Signed payment token")
    ),
    responses(
        (status = 303, description = "Redirect to the checkout session"),
        (status = 401, description = "Invalid or expired link"),
        (status = 409, description = "Already paid"),
        (status = 503, description = "Payment provider unavailable")
    )
)]
pub async fn open_payment_link(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Redirect> {
    let session = state.services.payments().open_payment_link(&token).await?;
    Ok(Redirect::to(&session.redirect_url))
}
