//! Integration tests for the HTTP surface.
//!
//! The router runs over the in-memory store without Redis, so rate limiting
//! and lookup caching are off and no external service is needed.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::JwtConfig;
use domain::{Role, StaffAccount};
use gateway_lib::config::GatewayConfig;
use gateway_lib::middleware::{issue_token, CORRELATION_HEADER, WEBHOOK_SECRET_HEADER};
use gateway_lib::state::AppState;
use lead_service_lib::config::LeadServiceConfig;
use lead_service_lib::infra::{HostedCheckout, LogOutbox, StaticAddressLookup};
use lead_service_lib::repository::{InMemoryStore, Stores};
use lead_service_lib::service::{Adapters, Services};

const JWT_SECRET: &str = "test-secret-key-for-testing-only-32chars";
const HOOK_SECRET: &str = "hook-secret";

// =============================================================================
// Fixtures
// =============================================================================

fn gateway_config() -> GatewayConfig {
    GatewayConfig {
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            leeway_seconds: 0,
        },
        webhook_secret: HOOK_SECRET.to_string(),
        ..GatewayConfig::default()
    }
}

async fn app() -> Router {
    let store = InMemoryStore::new();
    for (email, role) in [
        ("root@x.fr", Role::Superadmin),
        ("manager@x.fr", Role::Manager),
        ("agent@x.fr", Role::Operator),
    ] {
        store
            .seed_staff(StaffAccount::new(email.to_string(), role, None))
            .await;
    }
    let mut retired = StaffAccount::new("retired@x.fr".to_string(), Role::Manager, None);
    retired.active = false;
    store.seed_staff(retired).await;

    let config = LeadServiceConfig {
        public_base_url: "https://desk.example.fr".to_string(),
        ..LeadServiceConfig::default()
    };
    let adapters = Adapters {
        geo: Arc::new(StaticAddressLookup::new().with("75011", &["Paris"])),
        checkout: Arc::new(HostedCheckout::new("https://checkout.example.com/pay")),
        notifier: Arc::new(LogOutbox),
        mailer: Arc::new(LogOutbox),
    };
    let services = Services::build(Stores::in_memory(store), adapters, &config);

    gateway_lib::build_app(AppState::new(services, None, None, gateway_config()))
}

fn token(email: &str) -> String {
    issue_token(&gateway_config().jwt, email, 300).unwrap()
}

fn request(method: &str, uri: &str, body: Option<Value>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(_) => builder.header(header::CONTENT_TYPE, "application/json"),
        None => builder,
    }
}

fn with_body(builder: axum::http::request::Builder, body: Option<Value>) -> Request<Body> {
    let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
    builder.body(body).unwrap()
}

async fn call(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn staff_call(app: &Router, email: &str, method: &str, uri: &str, body: Option<Value>) -> Response {
    let builder = request(method, uri, body.clone())
        .header(header::AUTHORIZATION, format!("Bearer {}", token(email)));
    call(app, with_body(builder, body)).await
}

async fn public_call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
    call(app, with_body(request(method, uri, body.clone()), body)).await
}

async fn webhook_call(app: &Router, uri: &str, secret: &str, body: Value) -> Response {
    let builder = request("POST", uri, Some(body.clone())).header(WEBHOOK_SECRET_HEADER, secret);
    call(app, with_body(builder, Some(body))).await
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn text_body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn complete_lead(email: &str) -> Value {
    json!({
        "email": email,
        "form_step": 3,
        "first_name": "Jean",
        "last_name": "Dupont",
        "phone": "06 12 34 56 78",
        "client_type": "individual",
        "connection_type": "definitive",
        "project_type": "maison_individuelle",
        "power_kva": 12,
        "address": "12 rue de la Roquette",
        "postal_code": "75011",
        "city": "Paris"
    })
}

/// Finalize a lead through the public funnel and return its id.
async fn submitted_lead(app: &Router, email: &str) -> Uuid {
    let response = public_call(app, "POST", "/public/leads/finalize", Some(complete_lead(email))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    body["lead_id"].as_str().unwrap().parse().unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_reports_disabled_dependencies_as_healthy() {
    let app = app().await;

    let response = public_call(&app, "GET", "/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["database"]["status"], "disabled");
    assert_eq!(body["services"]["redis"]["status"], "disabled");
}

// =============================================================================
// Public funnel
// =============================================================================

#[tokio::test]
async fn funnel_step_creates_partial_lead_and_fills_city() {
    let app = app().await;

    let response = public_call(
        &app,
        "POST",
        "/public/leads/step",
        Some(json!({
            "email": "Jean.Dupont@Example.fr",
            "form_step": 1,
            "first_name": "Jean",
            "postal_code": "75011"
        })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["form_step"], 1);
    assert_eq!(body["status"], "partial");
    assert_eq!(body["city"], "Paris");
    assert!(body.get("candidates").is_none());
}

#[tokio::test]
async fn funnel_rejects_invalid_email() {
    let app = app().await;

    let response = public_call(
        &app,
        "POST",
        "/public/leads/step",
        Some(json!({ "email": "not-an-email", "form_step": 1 })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["fields"], json!(["email"]));
}

#[tokio::test]
async fn incomplete_finalize_lists_missing_fields() {
    let app = app().await;

    let response = public_call(
        &app,
        "POST",
        "/public/leads/finalize",
        Some(json!({ "email": "jean@x.fr", "form_step": 3, "first_name": "Jean" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    let fields = body["error"]["fields"].as_array().unwrap();
    assert!(fields.contains(&json!("last_name")));
}

#[tokio::test]
async fn payment_link_redirects_to_checkout() {
    let app = app().await;
    let response = public_call(&app, "POST", "/public/leads/finalize", Some(complete_lead("jean@x.fr"))).await;
    let body = json_body(response).await;
    let link = body["payment_link"].as_str().unwrap().to_string();
    assert!(link.starts_with("https://desk.example.fr/public/pay/"));

    let path = link.trim_start_matches("https://desk.example.fr");
    let response = public_call(&app, "GET", path, None).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://checkout.example.com/pay"));
}

#[tokio::test]
async fn tampered_payment_link_is_rejected() {
    let app = app().await;

    let response = public_call(&app, "GET", "/public/pay/not.a.token", None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Staff authentication
// =============================================================================

#[tokio::test]
async fn staff_routes_require_a_token() {
    let app = app().await;

    let response = public_call(&app, "GET", "/leads", None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivated_staff_is_rejected() {
    let app = app().await;

    let response = staff_call(&app, "retired@x.fr", "GET", "/staff/me", None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_effective_capabilities() {
    let app = app().await;

    let response = staff_call(&app, "agent@x.fr", "GET", "/staff/me", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["role"], "operator");
    assert_eq!(body["capabilities"]["can_see_payments"], false);
}

// =============================================================================
// Leads
// =============================================================================

#[tokio::test]
async fn operator_cannot_see_unassigned_lead() {
    let app = app().await;
    let lead_id = submitted_lead(&app, "jean@x.fr").await;

    let response = staff_call(&app, "agent@x.fr", "GET", &format!("/leads/{}", lead_id), None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn assigned_operator_sees_lead_without_payment_fields() {
    let app = app().await;
    let lead_id = submitted_lead(&app, "jean@x.fr").await;

    let response = staff_call(
        &app,
        "manager@x.fr",
        "PUT",
        &format!("/leads/{}/assignment", lead_id),
        Some(json!({ "staff_email": "agent@x.fr" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "assigned");

    let response = staff_call(&app, "agent@x.fr", "GET", &format!("/leads/{}", lead_id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["first_name"], "Jean");
    assert!(body.get("amount_cents").is_none());
    assert!(body.get("payment_status").is_none());
}

#[tokio::test]
async fn list_filters_unassigned_leads() {
    let app = app().await;
    submitted_lead(&app, "jean@x.fr").await;
    submitted_lead(&app, "marie@x.fr").await;

    let response = staff_call(&app, "manager@x.fr", "GET", "/leads?assignment=unassigned&per_page=1", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_filter_value_is_rejected() {
    let app = app().await;

    let response = staff_call(&app, "manager@x.fr", "GET", "/leads?created=yesterday", None).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn manager_exports_csv() {
    let app = app().await;
    submitted_lead(&app, "jean@x.fr").await;

    let response = staff_call(&app, "manager@x.fr", "GET", "/leads/export", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/csv"));
    let csv = text_body(response).await;
    assert!(csv.starts_with("reference,email,"));
    assert!(csv.contains("jean@x.fr"));
}

#[tokio::test]
async fn operator_cannot_export() {
    let app = app().await;

    let response = staff_call(&app, "agent@x.fr", "GET", "/leads/export", None).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "PERMISSION_DENIED");
}

#[tokio::test]
async fn correlation_id_is_echoed() {
    let app = app().await;
    let lead_id = submitted_lead(&app, "jean@x.fr").await;
    let correlation = Uuid::new_v4();
    let body = json!({ "status": "in_review" });

    let builder = request("PUT", &format!("/leads/{}/status", lead_id), Some(body.clone()))
        .header(header::AUTHORIZATION, format!("Bearer {}", token("manager@x.fr")))
        .header(CORRELATION_HEADER, correlation.to_string());
    let response = call(&app, with_body(builder, Some(body))).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CORRELATION_HEADER].to_str().unwrap(),
        correlation.to_string()
    );
    assert_eq!(json_body(response).await["status"], "in_review");
}

#[tokio::test]
async fn malformed_correlation_id_is_rejected() {
    let app = app().await;

    let builder = request("GET", "/staff/me", None)
        .header(header::AUTHORIZATION, format!("Bearer {}", token("manager@x.fr")))
        .header(CORRELATION_HEADER, "not-a-uuid");
    let response = call(&app, with_body(builder, None)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn notes_appear_in_thread_after_assignment_note() {
    let app = app().await;
    let lead_id = submitted_lead(&app, "jean@x.fr").await;

    let response = staff_call(
        &app,
        "manager@x.fr",
        "POST",
        &format!("/leads/{}/notes", lead_id),
        Some(json!({ "body": "Called back" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = staff_call(&app, "manager@x.fr", "GET", &format!("/leads/{}/thread", lead_id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["kind"], "note");
    assert_eq!(items[0]["summary"]["excerpt"], "Called back");
}

#[tokio::test]
async fn operator_cannot_delete_notes() {
    let app = app().await;
    let lead_id = submitted_lead(&app, "jean@x.fr").await;
    let response = staff_call(
        &app,
        "manager@x.fr",
        "POST",
        &format!("/leads/{}/notes", lead_id),
        Some(json!({ "body": "Keep me" })),
    )
    .await;
    let note_id = json_body(response).await["id"].as_str().unwrap().to_string();
    staff_call(
        &app,
        "manager@x.fr",
        "PUT",
        &format!("/leads/{}/assignment", lead_id),
        Some(json!({ "staff_email": "agent@x.fr" })),
    )
    .await;

    let response = staff_call(&app, "agent@x.fr", "DELETE", &format!("/notes/{}", note_id), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = staff_call(&app, "manager@x.fr", "DELETE", &format!("/notes/{}", note_id), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn assigned_operator_edits_a_colleagues_note() {
    let app = app().await;
    let lead_id = submitted_lead(&app, "jean@x.fr").await;
    staff_call(
        &app,
        "manager@x.fr",
        "PUT",
        &format!("/leads/{}/assignment", lead_id),
        Some(json!({ "staff_email": "agent@x.fr" })),
    )
    .await;
    let response = staff_call(
        &app,
        "manager@x.fr",
        "POST",
        &format!("/leads/{}/notes", lead_id),
        Some(json!({ "body": "Devis à préparer" })),
    )
    .await;
    let note_id = json_body(response).await["id"].as_str().unwrap().to_string();

    let response = staff_call(
        &app,
        "agent@x.fr",
        "PUT",
        &format!("/notes/{}", note_id),
        Some(json!({ "body": "Devis envoyé" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["body"], "Devis envoyé");
}

// =============================================================================
// Webhooks
// =============================================================================

#[tokio::test]
async fn webhook_requires_secret() {
    let app = app().await;
    let body = json!({ "session_ref": "cs_1", "status": "paid", "amount_cents": 12900 });

    let response = webhook_call(&app, "/webhooks/payments", "wrong", body.clone()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = call(&app, with_body(request("POST", "/webhooks/payments", Some(body.clone())), Some(body))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn repeated_payment_confirmation_is_acknowledged_once() {
    let app = app().await;
    let lead_id = submitted_lead(&app, "jean@x.fr").await;

    let response = staff_call(
        &app,
        "manager@x.fr",
        "POST",
        &format!("/leads/{}/payment-session", lead_id),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let session_ref = json_body(response).await["session_ref"].as_str().unwrap().to_string();

    let confirmation = json!({ "session_ref": session_ref, "status": "paid", "amount_cents": 12900 });
    let first = json_body(webhook_call(&app, "/webhooks/payments", HOOK_SECRET, confirmation.clone()).await).await;
    let second = json_body(webhook_call(&app, "/webhooks/payments", HOOK_SECRET, confirmation).await).await;

    assert_eq!(first["outcome"], "recorded");
    assert_eq!(first["payment_status"], "paid");
    assert_eq!(second["outcome"], "duplicate_delivery_ignored");

    let response = staff_call(&app, "manager@x.fr", "GET", &format!("/leads/{}/thread", lead_id), None).await;
    let thread = json_body(response).await;
    let payment_notes = thread["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|item| {
            item["summary"]["excerpt"]
                .as_str()
                .map(|text| text.starts_with("Payment paid"))
                .unwrap_or(false)
        })
        .count();
    assert_eq!(payment_notes, 1);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = app().await;
    let body = json!({ "session_ref": "cs_unknown", "status": "paid", "amount_cents": 12900 });

    let response = webhook_call(&app, "/webhooks/payments", HOOK_SECRET, body).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn inbound_email_from_unknown_sender_is_unmatched() {
    let app = app().await;
    let body = json!({ "from": "stranger@x.fr", "subject": "Hello", "body": "?" });

    let response = webhook_call(&app, "/webhooks/inbound-email", HOOK_SECRET, body).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "matched": false }));
}

#[tokio::test]
async fn inbound_email_is_matched_to_lead() {
    let app = app().await;
    let lead_id = submitted_lead(&app, "jean@x.fr").await;
    let body = json!({ "from": "Jean@X.fr", "subject": "Re: dossier", "body": "Merci" });

    let response = webhook_call(&app, "/webhooks/inbound-email", HOOK_SECRET, body).await;

    let body = json_body(response).await;
    assert_eq!(body["matched"], true);
    assert_eq!(body["lead_id"], lead_id.to_string());
}
