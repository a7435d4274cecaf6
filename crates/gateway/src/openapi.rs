//! OpenAPI documentation.

use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use domain::{
    CapabilityOverrides, CapabilitySet, ClientType, DeliveryStatus, FormType, LeadPatch,
    LeadStatus, LeadView, PaymentStatus, ProjectStatus, Role, StaffResponse,
};

use crate::handlers::health_handler::{HealthResponse, ServiceHealth, ServiceStatus};
use crate::handlers::lead_handler::{
    AssignmentRequest, LeadPage, PaymentSessionResponse, ProjectStatusRequest, StatusRequest,
};
use crate::handlers::public_handler::{
    CitiesResponse, FinalizeResponse, FunnelRequest, StepResponse,
};
use crate::handlers::staff_handler::{ActiveRequest, CreateStaffRequest, RoleRequest};
use crate::handlers::thread_handler::{
    EmailRequest, FileRequest, MessageRequest, NoteRequest, PinRequest,
};
use crate::handlers::webhook_handler::{
    DeliveryWebhookRequest, DeliveryWebhookResponse, InboundEmailRequest, InboundEmailResponse,
    PaymentWebhookRequest, PaymentWebhookResponse,
};
use crate::middleware::WEBHOOK_SECRET_HEADER;

/// API documentation struct.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health_handler::health_check,
        crate::handlers::public_handler::submit_step,
        crate::handlers::public_handler::finalize,
        crate::handlers::public_handler::cities_for_postal_code,
        crate::handlers::public_handler::open_payment_link,
        crate::handlers::webhook_handler::payment_webhook,
        crate::handlers::webhook_handler::email_delivery_webhook,
        crate::handlers::webhook_handler::inbound_email_webhook,
        crate::handlers::lead_handler::list_leads,
        crate::handlers::lead_handler::export_leads,
        crate::handlers::lead_handler::get_lead,
        crate::handlers::lead_handler::set_status,
        crate::handlers::lead_handler::set_project_status,
        crate::handlers::lead_handler::reopen_lead,
        crate::handlers::lead_handler::assign_lead,
        crate::handlers::lead_handler::start_payment_session,
        crate::handlers::lead_handler::purge_lead,
        crate::handlers::thread_handler::get_thread,
        crate::handlers::thread_handler::add_note,
        crate::handlers::thread_handler::edit_note,
        crate::handlers::thread_handler::pin_note,
        crate::handlers::thread_handler::delete_note,
        crate::handlers::thread_handler::post_message,
        crate::handlers::thread_handler::compose_email,
        crate::handlers::thread_handler::attach_file,
        crate::handlers::staff_handler::me,
        crate::handlers::staff_handler::list_staff,
        crate::handlers::staff_handler::create_staff,
        crate::handlers::staff_handler::change_role,
        crate::handlers::staff_handler::set_active,
        crate::handlers::staff_handler::set_capabilities,
        crate::handlers::event_handler::lead_events,
        crate::handlers::event_handler::thread_events,
    ),
    components(
        schemas(
            HealthResponse,
            ServiceStatus,
            ServiceHealth,
            FunnelRequest,
            StepResponse,
            FinalizeResponse,
            CitiesResponse,
            LeadPatch,
            LeadView,
            LeadPage,
            LeadStatus,
            ProjectStatus,
            PaymentStatus,
            ClientType,
            FormType,
            DeliveryStatus,
            StatusRequest,
            ProjectStatusRequest,
            AssignmentRequest,
            PaymentSessionResponse,
            NoteRequest,
            PinRequest,
            MessageRequest,
            EmailRequest,
            FileRequest,
            PaymentWebhookRequest,
            PaymentWebhookResponse,
            DeliveryWebhookRequest,
            DeliveryWebhookResponse,
            InboundEmailRequest,
            InboundEmailResponse,
            StaffResponse,
            CreateStaffRequest,
            RoleRequest,
            ActiveRequest,
            Role,
            CapabilitySet,
            CapabilityOverrides,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Dependency health"),
        (name = "Funnel", description = "Public lead intake and payment links"),
        (name = "Webhooks", description = "Payment and mail provider callbacks"),
        (name = "Leads", description = "Lead search, lifecycle and assignment"),
        (name = "Thread", description = "Notes, internal messages, emails and files"),
        (name = "Staff", description = "Staff accounts and capabilities"),
        (name = "Events", description = "Server-sent change events"),
    )
)]
pub struct ApiDoc;

/// Security scheme modifier.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "webhook_secret",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(WEBHOOK_SECRET_HEADER))),
            );
        }
    }
}
