//! Payment service - signed payment links and the checkout boundary.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::{AppError, AppResult, OptionExt};
use domain::{Capability, Lead, PaymentStatus, StaffContext, PAYMENT_LINK_TTL_HOURS};

use super::{LeadService, PaymentOutcome};
use crate::infra::{CheckoutSession, PaymentGateway};
use crate::repository::{LeadRepository, Stores};

/// Claims of a payment link token
#[derive(Debug, Serialize, Deserialize)]
struct PaymentClaims {
    /// Lead id
    sub: Uuid,
    exp: i64,
    iat: i64,
}

/// Issues and verifies tokenized payment links.
#[derive(Clone)]
pub struct PaymentLinkSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public_base_url: String,
}

impl PaymentLinkSigner {
    pub fn new(secret: &str, public_base_url: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn token(&self, lead_id: Uuid) -> AppResult<String> {
        let now = Utc::now();
        let claims = PaymentClaims {
            sub: lead_id,
            exp: (now + Duration::hours(PAYMENT_LINK_TTL_HOURS)).timestamp(),
            iat: now.timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    /// Public URL the lead opens to pay.
    pub fn link(&self, lead_id: Uuid) -> AppResult<String> {
        Ok(format!("{}/public/pay/{}", self.public_base_url, self.token(lead_id)?))
    }

    /// Lead id carried by a valid, unexpired token.
    pub fn verify(&self, token: &str) -> AppResult<Uuid> {
        let data = decode::<PaymentClaims>(
            token,
            &self.decoding_key,
            &Validation::new(Algorithm::HS256),
        )?;
        Ok(data.claims.sub)
    }
}

/// Provider callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentConfirmation {
    pub session_ref: String,
    pub status: PaymentStatus,
    pub amount_cents: i64,
}

#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Tokenized link for `lead`, as sent in emails and the funnel response.
    fn payment_link(&self, lead: &Lead) -> AppResult<String>;

    /// Verify a payment link token and open a checkout session for its lead.
    async fn open_payment_link(&self, token: &str) -> AppResult<CheckoutSession>;

    /// Staff-initiated checkout session.
    async fn start_payment_session(
        &self,
        ctx: &StaffContext,
        lead_id: Uuid,
    ) -> AppResult<CheckoutSession>;

    /// Apply a provider confirmation for any session opened for the lead,
    /// not only the most recent one.
    async fn confirm_payment(&self, confirmation: PaymentConfirmation) -> AppResult<PaymentOutcome>;
}

/// Concrete implementation of PaymentService.
pub struct PaymentDesk {
    leads: Arc<dyn LeadRepository>,
    lifecycle: Arc<dyn LeadService>,
    gateway: Arc<dyn PaymentGateway>,
    signer: PaymentLinkSigner,
    default_fee_cents: i64,
}

impl PaymentDesk {
    pub fn new(
        stores: &Stores,
        lifecycle: Arc<dyn LeadService>,
        gateway: Arc<dyn PaymentGateway>,
        signer: PaymentLinkSigner,
        default_fee_cents: i64,
    ) -> Self {
        Self {
            leads: stores.leads.clone(),
            lifecycle,
            gateway,
            signer,
            default_fee_cents,
        }
    }

    async fn checkout(&self, lead: Lead) -> AppResult<CheckoutSession> {
        if lead.payment_status == PaymentStatus::Paid {
            return Err(AppError::conflict(format!(
                "Lead {} is already paid",
                lead.reference()
            )));
        }

        let amount_cents = lead.amount_cents.unwrap_or(self.default_fee_cents);
        let session = self
            .gateway
            .start_session(lead.id, &lead.reference(), amount_cents)
            .await?;

        // Earlier sessions stay confirmable: the lead may pay on any of them
        self.leads
            .open_payment_session(lead.id, &session.session_ref, amount_cents)
            .await?;

        tracing::info!(
            lead_id = %lead.id,
            session_ref = %session.session_ref,
            amount_cents,
            "Checkout session started"
        );
        Ok(session)
    }
}

#[async_trait]
impl PaymentService for PaymentDesk {
    fn payment_link(&self, lead: &Lead) -> AppResult<String> {
        self.signer.link(lead.id)
    }

    async fn open_payment_link(&self, token: &str) -> AppResult<CheckoutSession> {
        let lead_id = self.signer.verify(token)?;
        let lead = self.leads.find_by_id(lead_id).await?.ok_or_not_found()?;
        self.checkout(lead).await
    }

    async fn start_payment_session(
        &self,
        ctx: &StaffContext,
        lead_id: Uuid,
    ) -> AppResult<CheckoutSession> {
        ctx.require(Capability::SeePayments)?;
        let lead = self.leads.find_by_id(lead_id).await?.ok_or_not_found()?;
        ctx.ensure_can_view(&lead)?;
        self.checkout(lead).await
    }

    async fn confirm_payment(&self, confirmation: PaymentConfirmation) -> AppResult<PaymentOutcome> {
        let lead = self
            .leads
            .find_by_session_ref(&confirmation.session_ref)
            .await?
            .ok_or_else(|| {
                tracing::warn!(
                    session_ref = %confirmation.session_ref,
                    "Payment confirmation for unknown session"
                );
                AppError::NotFound
            })?;

        self.lifecycle
            .record_payment(lead.id, confirmation.status, confirmation.amount_cents)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_round_trips_to_lead_id() {
        let signer = PaymentLinkSigner::new("a-test-secret-that-is-long-enough!!", "http://x.fr/");
        let lead_id = Uuid::new_v4();

        let link = signer.link(lead_id).unwrap();
        let token = link.rsplit('/').next().unwrap();

        assert!(link.starts_with("http://x.fr/public/pay/"));
        assert_eq!(signer.verify(token).unwrap(), lead_id);
    }

    #[test]
    fn foreign_token_is_rejected() {
        let ours = PaymentLinkSigner::new("a-test-secret-that-is-long-enough!!", "http://x.fr");
        let theirs = PaymentLinkSigner::new("another-secret-that-is-long-enough", "http://x.fr");

        let token = theirs.token(Uuid::new_v4()).unwrap();
        assert!(matches!(ours.verify(&token), Err(AppError::Jwt(_))));
    }
}
