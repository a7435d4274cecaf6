//! Infrastructure layer - database and external collaborators.

pub mod checkout;
mod db;
pub mod geo;
pub mod migrations;
pub mod outbox;

pub use checkout::{CheckoutSession, HostedCheckout, PaymentGateway};
pub use db::Database;
pub use geo::{AddressLookup, GeoApiLookup, StaticAddressLookup};
pub use migrations::Migrator;
pub use outbox::{JobQueue, LogOutbox, Notification, Notifier, OutboundMailer};

#[cfg(any(test, feature = "test-utils"))]
pub use checkout::MockPaymentGateway;
#[cfg(any(test, feature = "test-utils"))]
pub use geo::MockAddressLookup;
#[cfg(any(test, feature = "test-utils"))]
pub use outbox::{MockNotifier, MockOutboundMailer};
