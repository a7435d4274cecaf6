//! Service layer - business use cases over the repositories.

mod container;
mod lead_service;
mod notification_dispatcher;
mod payment_service;
mod realtime;
mod search_service;
mod staff_service;
mod thread_service;

pub use container::{Adapters, Services};
pub use lead_service::{FunnelOutcome, LeadManager, LeadService, PaymentOutcome, PostalResolution};
pub use notification_dispatcher::NotificationDispatcher;
pub use payment_service::{PaymentConfirmation, PaymentDesk, PaymentLinkSigner, PaymentService};
pub use realtime::{PendingWrite, RealtimeHub, Subscription};
pub use search_service::{LeadSearch, SearchService};
pub use staff_service::{StaffManager, StaffService};
pub use thread_service::{
    CommunicationAggregator, DeliveryReport, EmailDraft, InboundEmail, NewFile, NewMessage,
    Thread, ThreadEntry, ThreadService,
};
