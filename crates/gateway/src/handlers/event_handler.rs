//! Server-sent change events for staff sessions.

use axum::{
    extract::{Extension, Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::{Stream, StreamExt};
use uuid::Uuid;

use common::AppResult;
use domain::{StaffContext, Topic};
use lead_service_lib::service::Subscription;

use crate::state::AppState;

/// Create event routes
pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/leads", get(lead_events))
        .route("/leads/:id", get(thread_events))
}

fn to_sse(subscription: Subscription) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = subscription.map(|event| Event::default().event("change").json_data(event));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Changes to the leads the caller can see
#[utoipa::path(
    get,
    path = "/events/leads",
    tag = "Events",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "`change` events; a `resync` kind asks the client to re-fetch"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn lead_events(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    tracing::debug!(staff = %ctx.email, "Lead feed subscribed");
    to_sse(state.services.realtime().subscribe(Topic::Leads, ctx.scope()))
}

/// Changes to one lead's thread
#[utoipa::path(
    get,
    path = "/events/leads/{id}",
    tag = "Events",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "`change` events for the thread"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Lead not found")
    )
)]
pub async fn thread_events(
    Extension(ctx): Extension<StaffContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    // Subscribing to a thread needs the same visibility as reading it
    state.services.leads().get(&ctx, id).await?;
    tracing::debug!(staff = %ctx.email, lead_id = %id, "Thread feed subscribed");
    Ok(to_sse(
        state.services.realtime().subscribe(Topic::Thread(id), ctx.scope()),
    ))
}
