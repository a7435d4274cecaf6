//! HTTP handlers.

pub mod event_handler;
pub mod health_handler;
pub mod lead_handler;
pub mod public_handler;
pub mod staff_handler;
pub mod thread_handler;
pub mod webhook_handler;

use std::future::Future;

use common::AppResult;
use domain::StaffContext;

use crate::state::AppState;

pub use event_handler::event_routes;
pub use health_handler::health_routes;
pub use lead_handler::lead_routes;
pub use public_handler::public_routes;
pub use staff_handler::staff_routes;
pub use thread_handler::{note_routes, thread_routes};
pub use webhook_handler::webhook_routes;

/// Run a staff mutation. With a correlation id, the write must finish within
/// the confirmation timeout (`WriteUncertain` otherwise) and its change event
/// is checked for; a write that changed nothing publishes nothing.
pub(crate) async fn confirmed<T>(
    state: &AppState,
    ctx: &StaffContext,
    write: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    let Some(correlation_id) = ctx.correlation_id else {
        return write.await;
    };

    let pending = state.services.realtime().track(correlation_id);
    let (value, event) = pending.settle(write).await?;
    if event.is_none() {
        tracing::debug!(staff = %ctx.email, "Correlated write changed nothing");
    }
    Ok(value)
}
