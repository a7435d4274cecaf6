//! Shared fixtures for the lead service tests.

#![allow(dead_code)]

use std::sync::Arc;

use domain::{ClientType, LeadPatch, Role, StaffAccount, StaffContext};

use lead_service_lib::config::LeadServiceConfig;
use lead_service_lib::infra::{
    AddressLookup, HostedCheckout, LogOutbox, Notifier, OutboundMailer, PaymentGateway,
    StaticAddressLookup,
};
use lead_service_lib::repository::{InMemoryStore, Stores};
use lead_service_lib::service::{Adapters, Services};

pub const FEE_CENTS: i64 = 12_900;

pub fn config() -> LeadServiceConfig {
    LeadServiceConfig {
        public_base_url: "https://desk.example.fr".to_string(),
        payment_link_secret: "test-secret-key-for-testing-only-32chars".to_string(),
        default_fee_cents: FEE_CENTS,
        ..LeadServiceConfig::default()
    }
}

pub fn geo() -> StaticAddressLookup {
    StaticAddressLookup::new()
        .with("75011", &["Paris"])
        .with("01400", &["Châtillon-sur-Chalaronne", "L'Abergement-Clémenciat"])
}

pub fn adapters() -> Adapters {
    Adapters {
        geo: Arc::new(geo()),
        checkout: Arc::new(HostedCheckout::new("https://checkout.example.com/pay")),
        notifier: Arc::new(LogOutbox),
        mailer: Arc::new(LogOutbox),
    }
}

/// Adapter set with selected collaborators replaced.
#[derive(Default)]
pub struct AdapterOverrides {
    pub geo: Option<Arc<dyn AddressLookup>>,
    pub checkout: Option<Arc<dyn PaymentGateway>>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub mailer: Option<Arc<dyn OutboundMailer>>,
}

impl AdapterOverrides {
    pub fn build(self) -> Adapters {
        let base = adapters();
        Adapters {
            geo: self.geo.unwrap_or(base.geo),
            checkout: self.checkout.unwrap_or(base.checkout),
            notifier: self.notifier.unwrap_or(base.notifier),
            mailer: self.mailer.unwrap_or(base.mailer),
        }
    }
}

pub struct Harness {
    pub store: InMemoryStore,
    pub services: Services,
    pub superadmin: StaffContext,
    pub manager: StaffContext,
    /// Operator "agent@x.fr"
    pub agent: StaffContext,
    /// Another operator
    pub other_operator: StaffContext,
}

pub async fn harness() -> Harness {
    harness_with(AdapterOverrides::default()).await
}

pub async fn harness_with(overrides: AdapterOverrides) -> Harness {
    let store = InMemoryStore::new();
    let superadmin = seed(&store, "root@x.fr", Role::Superadmin).await;
    let manager = seed(&store, "manager@x.fr", Role::Manager).await;
    let agent = seed(&store, "agent@x.fr", Role::Operator).await;
    let other_operator = seed(&store, "other@x.fr", Role::Operator).await;

    let services = Services::build(
        Stores::in_memory(store.clone()),
        overrides.build(),
        &config(),
    );

    Harness {
        store,
        services,
        superadmin,
        manager,
        agent,
        other_operator,
    }
}

pub async fn seed(store: &InMemoryStore, email: &str, role: Role) -> StaffContext {
    let account = store
        .seed_staff(StaffAccount::new(email.to_string(), role, None))
        .await;
    StaffContext::for_account(&account)
}

pub fn step_one() -> LeadPatch {
    LeadPatch {
        form_step: Some(1),
        first_name: Some("Jean".to_string()),
        last_name: Some("Dupont".to_string()),
        ..Default::default()
    }
}

pub fn step_two() -> LeadPatch {
    LeadPatch {
        form_step: Some(2),
        phone: Some("06 12 34 56 78".to_string()),
        address: Some("12 rue de la Roquette".to_string()),
        postal_code: Some("75011".to_string()),
        ..Default::default()
    }
}

/// Everything a finalize needs for an individual client.
pub fn complete() -> LeadPatch {
    LeadPatch {
        form_step: Some(3),
        first_name: Some("Jean".to_string()),
        last_name: Some("Dupont".to_string()),
        phone: Some("06 12 34 56 78".to_string()),
        client_type: Some(ClientType::Individual),
        connection_type: Some("definitive".to_string()),
        project_type: Some("maison_individuelle".to_string()),
        power_kva: Some(12),
        address: Some("12 rue de la Roquette".to_string()),
        postal_code: Some("75011".to_string()),
        city: Some("Paris".to_string()),
        ..Default::default()
    }
}
