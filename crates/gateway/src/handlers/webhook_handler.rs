//! Provider callbacks: payments, email delivery reports, inbound email.

use axum::{extract::State, response::Json, routing::post, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use common::AppResult;
use domain::{DeliveryStatus, PaymentStatus};
use lead_service_lib::service::{DeliveryReport, InboundEmail, PaymentConfirmation};

use crate::extractors::ValidatedJson;
use crate::state::AppState;

/// Checkout provider confirmation.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PaymentWebhookRequest {
    #[validate(length(min = 1, message = "session_ref is required"))]
    #[schema(example = "cs_live_a1b2c3")]
    pub session_ref: String,
    pub status: PaymentStatus,
    #[validate(range(min = 0, message = "amount_cents cannot be negative"))]
    #[schema(example = 12900)]
    pub amount_cents: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentWebhookResponse {
    /// `recorded` or `duplicate_delivery_ignored`
    #[schema(example = "recorded")]
    pub outcome: &'static str,
    pub lead_id: Uuid,
    pub payment_status: PaymentStatus,
}

/// Mail provider delivery report.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DeliveryWebhookRequest {
    pub email_id: Uuid,
    pub status: DeliveryStatus,
    #[validate(length(max = 2000))]
    pub diagnostic: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryWebhookResponse {
    /// False when the report was older than the stored status
    pub applied: bool,
}

/// Email received from a lead, forwarded by the mail provider.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InboundEmailRequest {
    #[validate(email(message = "from must be an email address"))]
    pub from: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InboundEmailResponse {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<Uuid>,
}

/// Create webhook routes
pub fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route("/payments", post(payment_webhook))
        .route("/email-delivery", post(email_delivery_webhook))
        .route("/inbound-email", post(inbound_email_webhook))
}

/// Record a payment confirmation; repeats are acknowledged without effect
#[utoipa::path(
    post,
    path = "/webhooks/payments",
    tag = "Webhooks",
    security(("webhook_secret" = [])),
    request_body = PaymentWebhookRequest,
    responses(
        (status = 200, description = "Confirmation handled", body = PaymentWebhookResponse),
        (status = 401, description = "Bad webhook secret"),
        (status = 404, description = "Unknown checkout session")
    )
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<PaymentWebhookRequest>,
) -> AppResult<Json<PaymentWebhookResponse>> {
    let outcome = state
        .services
        .payments()
        .confirm_payment(PaymentConfirmation {
            session_ref: payload.session_ref,
            status: payload.status,
            amount_cents: payload.amount_cents,
        })
        .await?;

    let lead = outcome.lead();
    Ok(Json(PaymentWebhookResponse {
        outcome: if outcome.is_duplicate() {
            "duplicate_delivery_ignored"
        } else {
            "recorded"
        },
        lead_id: lead.id,
        payment_status: lead.payment_status,
    }))
}

/// Apply an email delivery status
#[utoipa::path(
    post,
    path = "/webhooks/email-delivery",
    tag = "Webhooks",
    security(("webhook_secret" = [])),
    request_body = DeliveryWebhookRequest,
    responses(
        (status = 200, description = "Report handled", body = DeliveryWebhookResponse),
        (status = 401, description = "Bad webhook secret"),
        (status = 404, description = "Unknown email")
    )
)]
pub async fn email_delivery_webhook(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<DeliveryWebhookRequest>,
) -> AppResult<Json<DeliveryWebhookResponse>> {
    let updated = state
        .services
        .threads()
        .record_delivery(DeliveryReport {
            email_id: payload.email_id,
            status: payload.status,
            diagnostic: payload.diagnostic,
        })
        .await?;

    Ok(Json(DeliveryWebhookResponse {
        applied: updated.is_some(),
    }))
}

/// Attach an inbound email to the lead with the sender's address
#[utoipa::path(
    post,
    path = "/webhooks/inbound-email",
    tag = "Webhooks",
    security(("webhook_secret" = [])),
    request_body = InboundEmailRequest,
    responses(
        (status = 200, description = "Email handled", body = InboundEmailResponse),
        (status = 401, description = "Bad webhook secret")
    )
)]
pub async fn inbound_email_webhook(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<InboundEmailRequest>,
) -> AppResult<Json<InboundEmailResponse>> {
    let email = state
        .services
        .threads()
        .record_inbound_email(InboundEmail {
            from: payload.from,
            subject: payload.subject,
            body: payload.body,
        })
        .await?;

    Ok(Json(InboundEmailResponse {
        matched: email.is_some(),
        lead_id: email.map(|e| e.lead_id),
    }))
}
