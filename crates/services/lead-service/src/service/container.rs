//! Service container - wires stores and adapters into the services.

use std::sync::Arc;

use super::{
    CommunicationAggregator, LeadManager, LeadSearch, LeadService, NotificationDispatcher,
    PaymentDesk, PaymentLinkSigner, PaymentService, RealtimeHub, SearchService, StaffManager,
    StaffService, ThreadService,
};
use crate::config::LeadServiceConfig;
use crate::infra::{
    AddressLookup, GeoApiLookup, HostedCheckout, JobQueue, LogOutbox, Notifier, OutboundMailer,
    PaymentGateway, StaticAddressLookup,
};
use crate::repository::Stores;
use common::AppResult;

/// External collaborators behind their traits.
#[derive(Clone)]
pub struct Adapters {
    pub geo: Arc<dyn AddressLookup>,
    pub checkout: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub mailer: Arc<dyn OutboundMailer>,
}

impl Adapters {
    /// Real geocoding and the PostgreSQL job queue.
    pub fn live(config: &LeadServiceConfig, queue: JobQueue) -> AppResult<Self> {
        let queue = Arc::new(queue);
        Ok(Self {
            geo: Arc::new(GeoApiLookup::new(&config.geo_api_url, config.geo_timeout)?),
            checkout: Arc::new(HostedCheckout::new(&config.payment_checkout_url)),
            notifier: queue.clone(),
            mailer: queue,
        })
    }

    /// No network and no queue: side channels are logged.
    pub fn offline(config: &LeadServiceConfig) -> Self {
        Self {
            geo: Arc::new(StaticAddressLookup::new()),
            checkout: Arc::new(HostedCheckout::new(&config.payment_checkout_url)),
            notifier: Arc::new(LogOutbox),
            mailer: Arc::new(LogOutbox),
        }
    }
}

/// Every service, shared by the HTTP handlers.
#[derive(Clone)]
pub struct Services {
    lead_service: Arc<dyn LeadService>,
    staff_service: Arc<dyn StaffService>,
    thread_service: Arc<dyn ThreadService>,
    search_service: Arc<dyn SearchService>,
    payment_service: Arc<dyn PaymentService>,
    realtime: RealtimeHub,
}

impl Services {
    pub fn build(stores: Stores, adapters: Adapters, config: &LeadServiceConfig) -> Self {
        let realtime = RealtimeHub::new(
            config.realtime_channel_capacity,
            config.realtime_confirm_timeout,
        );
        let notifications = NotificationDispatcher::new(adapters.notifier, config.notify_timeout);
        let links = PaymentLinkSigner::new(&config.payment_link_secret, &config.public_base_url);

        let lead_service: Arc<dyn LeadService> = Arc::new(LeadManager::new(
            &stores,
            adapters.geo,
            notifications.clone(),
            realtime.clone(),
            config.default_fee_cents,
        ));
        let thread_service = Arc::new(CommunicationAggregator::new(
            &stores,
            adapters.mailer,
            links.clone(),
            notifications,
            realtime.clone(),
            config.operator_sees_delivery_diagnostics,
        ));
        let payment_service = Arc::new(PaymentDesk::new(
            &stores,
            lead_service.clone(),
            adapters.checkout,
            links,
            config.default_fee_cents,
        ));

        Self {
            lead_service,
            staff_service: Arc::new(StaffManager::new(stores.staff.clone())),
            thread_service,
            search_service: Arc::new(LeadSearch::new(stores.leads.clone())),
            payment_service,
            realtime,
        }
    }

    pub fn leads(&self) -> Arc<dyn LeadService> {
        self.lead_service.clone()
    }

    pub fn staff(&self) -> Arc<dyn StaffService> {
        self.staff_service.clone()
    }

    pub fn threads(&self) -> Arc<dyn ThreadService> {
        self.thread_service.clone()
    }

    pub fn search(&self) -> Arc<dyn SearchService> {
        self.search_service.clone()
    }

    pub fn payments(&self) -> Arc<dyn PaymentService> {
        self.payment_service.clone()
    }

    pub fn realtime(&self) -> &RealtimeHub {
        &self.realtime
    }
}
