//! Route configuration.

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware, Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{
    event_routes, health_routes, lead_routes, note_routes, public_routes, staff_routes,
    thread_routes, webhook_routes,
};
use crate::middleware::{
    auth_middleware, rate_limit_middleware, rate_limit_public_middleware,
    webhook_secret_middleware, CORRELATION_HEADER,
};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Staff routes share authentication and the general rate limit. The rate
/// limit runs before the token is checked.
fn staff_only(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring malformed CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(CORRELATION_HEADER),
        ])
        .expose_headers([HeaderName::from_static(CORRELATION_HEADER)])
}

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        // Health check (no auth, no rate limit)
        .nest("/health", health_routes())
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Lead-facing funnel (no auth, stricter rate limit)
        .nest(
            "/public",
            public_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_public_middleware,
            )),
        )
        // Provider callbacks (shared secret)
        .nest(
            "/webhooks",
            webhook_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                webhook_secret_middleware,
            )),
        )
        // Staff desk
        .nest(
            "/leads",
            staff_only(lead_routes().merge(thread_routes()), &state),
        )
        .nest("/notes", staff_only(note_routes(), &state))
        .nest("/staff", staff_only(staff_routes(), &state))
        .nest("/events", staff_only(event_routes(), &state))
        .layer(cors)
        .with_state(state)
}
