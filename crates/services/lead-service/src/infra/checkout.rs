//! Payment provider boundary.
//!
//! Only session creation goes out; confirmations come back through the
//! payment webhook and are safe to repeat.

use async_trait::async_trait;
use uuid::Uuid;

use common::AppResult;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// A checkout session opened with the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_ref: String,
    pub redirect_url: String,
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn start_session(
        &self,
        lead_id: Uuid,
        reference: &str,
        amount_cents: i64,
    ) -> AppResult<CheckoutSession>;
}

/// Hosted checkout page: the provider reads the session parameters from
/// the redirect URL and reports back through the webhook.
pub struct HostedCheckout {
    checkout_url: String,
}

impl HostedCheckout {
    pub fn new(checkout_url: impl Into<String>) -> Self {
        Self {
            checkout_url: checkout_url.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HostedCheckout {
    async fn start_session(
        &self,
        lead_id: Uuid,
        reference: &str,
        amount_cents: i64,
    ) -> AppResult<CheckoutSession> {
        let session_ref = format!("cs_{}", Uuid::new_v4().simple());
        let separator = if self.checkout_url.contains('?') { '&' } else { '?' };
        let redirect_url = format!(
            "{}{}session={}&reference={}&amount={}",
            self.checkout_url, separator, session_ref, reference, amount_cents
        );

        tracing::info!(%lead_id, %session_ref, amount_cents, "Checkout session opened");
        Ok(CheckoutSession {
            session_ref,
            redirect_url,
        })
    }
}
