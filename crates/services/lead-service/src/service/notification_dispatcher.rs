//! Best-effort team notifications.

use std::sync::Arc;
use std::time::Duration;

use crate::infra::{Notification, Notifier};

/// Wraps a [`Notifier`] so that a slow or failing channel never fails the
/// core write that triggered it.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    pub async fn dispatch(&self, notification: Notification) {
        let lead_id = notification.lead_id();
        match tokio::time::timeout(self.timeout, self.notifier.dispatch(notification)).await {
            Ok(Ok(())) => tracing::debug!(%lead_id, "Notification dispatched"),
            Ok(Err(e)) => tracing::warn!(%lead_id, error = %e, "Notification dropped"),
            Err(_) => tracing::warn!(%lead_id, "Notification timed out"),
        }
    }
}
