//! Communication thread tests.

mod support;

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use common::AppError;
use domain::{
    Channel, CommunicationItem, DeliveryStatus, Email, EmailDirection, InternalMessage, Lead,
    Note,
};
use lead_service_lib::infra::MockOutboundMailer;
use lead_service_lib::repository::{
    EmailRepository, MessageRepository, MockFileRepository, NoteRepository, Stores,
};
use lead_service_lib::service::{
    DeliveryReport, EmailDraft, InboundEmail, NewMessage, Services,
};

use support::{complete, config, harness, harness_with, AdapterOverrides, Harness};

async fn assigned_lead(h: &Harness) -> Lead {
    let lead = h
        .services
        .leads()
        .finalize("j@x.fr", complete())
        .await
        .unwrap()
        .lead;
    h.services
        .leads()
        .assign(&h.manager, lead.id, Some("agent@x.fr".to_string()))
        .await
        .unwrap()
}

fn bounced_email(lead_id: Uuid, at: chrono::DateTime<Utc>) -> Email {
    Email {
        id: Uuid::new_v4(),
        lead_id,
        direction: EmailDirection::Outbound,
        sender_id: None,
        counterpart: "j@x.fr".to_string(),
        subject: "Votre raccordement".to_string(),
        body: "Bonjour".to_string(),
        delivery_status: DeliveryStatus::Bounced,
        diagnostic: Some("550 mailbox unavailable".to_string()),
        created_at: at,
        updated_at: at,
    }
}

#[tokio::test]
async fn test_thread_merges_channels_oldest_first() {
    let h = harness().await;
    let lead = assigned_lead(&h).await;
    let base = Utc::now() - Duration::hours(3);

    // Inserted out of order across channels
    let email = EmailRepository::append(&h.store, bounced_email(lead.id, base + Duration::minutes(30)))
        .await
        .unwrap();
    let note = NoteRepository::append(
        &h.store,
        Note::by_staff(lead.id, h.agent.staff_id, "Appelé".to_string(), base),
    )
    .await
    .unwrap();
    let message = MessageRepository::append(
        &h.store,
        InternalMessage {
            id: Uuid::new_v4(),
            lead_id: lead.id,
            author_id: h.manager.staff_id,
            subject: "Relance".to_string(),
            body_plain: "À rappeler demain".to_string(),
            body_rich: None,
            important: true,
            created_at: base + Duration::minutes(10),
        },
    )
    .await
    .unwrap();

    let thread = h.services.threads().thread_for(&h.manager, lead.id).await.unwrap();

    // The assignment note comes last: it was written before the test rows
    // but with the current time.
    let ids: Vec<Uuid> = thread.items.iter().map(|entry| entry.item.id()).collect();
    assert_eq!(&ids[..3], &[note.id, message.id, email.id]);
    assert_eq!(thread.items.len(), 4);
    assert!(thread.unavailable.is_empty());

    let timestamps: Vec<_> = thread.items.iter().map(|e| e.summary.timestamp).collect();
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_operators_do_not_see_delivery_diagnostics() {
    let h = harness().await;
    let lead = assigned_lead(&h).await;
    EmailRepository::append(&h.store, bounced_email(lead.id, Utc::now()))
        .await
        .unwrap();

    let diagnostic_of = |items: &[lead_service_lib::service::ThreadEntry]| {
        items.iter().find_map(|entry| match &entry.item {
            CommunicationItem::Email(email) => Some(email.diagnostic.clone()),
            _ => None,
        })
    };

    let as_operator = h.services.threads().thread_for(&h.agent, lead.id).await.unwrap();
    let as_manager = h.services.threads().thread_for(&h.manager, lead.id).await.unwrap();

    assert_eq!(diagnostic_of(&as_operator.items), Some(None));
    assert_eq!(
        diagnostic_of(&as_manager.items),
        Some(Some("550 mailbox unavailable".to_string()))
    );
}

#[tokio::test]
async fn test_failing_channel_is_reported_not_fatal() {
    let h = harness().await;
    let lead = assigned_lead(&h).await;

    let mut files = MockFileRepository::new();
    files
        .expect_list_for_lead()
        .returning(|_| Err(AppError::upstream("File store")));

    let mut stores = Stores::in_memory(h.store.clone());
    stores.files = Arc::new(files);
    let services = Services::build(stores, support::adapters(), &config());

    let thread = services.threads().thread_for(&h.manager, lead.id).await.unwrap();

    assert_eq!(thread.unavailable, vec![Channel::File]);
    // The assignment note is still there
    assert_eq!(thread.items.len(), 1);
}

#[tokio::test]
async fn test_thread_of_unassigned_lead_hidden_from_operator() {
    let h = harness().await;
    let lead = assigned_lead(&h).await;

    let result = h.services.threads().thread_for(&h.other_operator, lead.id).await;
    assert!(matches!(result, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_note_edit_rules() {
    let h = harness().await;
    let lead = assigned_lead(&h).await;
    let threads = h.services.threads();

    let note = threads
        .add_note(&h.agent, lead.id, "  Premier contact  ".to_string())
        .await
        .unwrap();
    assert_eq!(note.body, "Premier contact");
    assert_eq!(note.author_id, Some(h.agent.staff_id));

    // Author edits their own note
    let edited = threads
        .edit_note(&h.agent, note.id, "Premier contact ok".to_string())
        .await
        .unwrap();
    assert_eq!(edited.body, "Premier contact ok");

    // Managers may edit any staff note
    threads
        .edit_note(&h.manager, note.id, "Vu".to_string())
        .await
        .unwrap();

    // So may the assigned operator, on a note someone else wrote
    let managers_note = threads
        .add_note(&h.manager, lead.id, "Devis à préparer".to_string())
        .await
        .unwrap();
    let edited = threads
        .edit_note(&h.agent, managers_note.id, "Devis envoyé".to_string())
        .await
        .unwrap();
    assert_eq!(edited.body, "Devis envoyé");
    assert_eq!(edited.author_id, Some(h.manager.staff_id));

    // Nobody edits a system note
    let system_note = NoteRepository::list_for_lead(&h.store, lead.id)
        .await
        .unwrap()
        .into_iter()
        .find(|n| n.is_system())
        .unwrap();
    let result = threads
        .edit_note(&h.superadmin, system_note.id, "rewritten".to_string())
        .await;
    assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    assert!(matches!(
        threads.delete_note(&h.superadmin, system_note.id).await,
        Err(AppError::PermissionDenied(_))
    ));

    // Operators cannot delete
    assert!(matches!(
        threads.delete_note(&h.agent, note.id).await,
        Err(AppError::PermissionDenied(_))
    ));
    threads.delete_note(&h.manager, note.id).await.unwrap();
}

#[tokio::test]
async fn test_pin_and_edit_touch_separate_fields() {
    let h = harness().await;
    let lead = assigned_lead(&h).await;
    let threads = h.services.threads();
    let note = threads
        .add_note(&h.agent, lead.id, "Rappeler lundi".to_string())
        .await
        .unwrap();

    // Both read the note before either writes
    let (pinned, edited) = tokio::join!(
        threads.pin_note(&h.manager, note.id, true),
        threads.edit_note(&h.agent, note.id, "Rappeler mardi".to_string()),
    );
    pinned.unwrap();
    edited.unwrap();

    let stored = NoteRepository::find_by_id(&h.store, note.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.pinned);
    assert_eq!(stored.body, "Rappeler mardi");
}

#[tokio::test]
async fn test_empty_note_rejected() {
    let h = harness().await;
    let lead = assigned_lead(&h).await;

    let result = h
        .services
        .threads()
        .add_note(&h.agent, lead.id, "   ".to_string())
        .await;

    assert!(matches!(result, Err(AppError::Validation { .. })));
}

#[tokio::test]
async fn test_pin_note() {
    let h = harness().await;
    let lead = assigned_lead(&h).await;
    let threads = h.services.threads();
    let note = threads
        .add_note(&h.agent, lead.id, "Important".to_string())
        .await
        .unwrap();

    let pinned = threads.pin_note(&h.agent, note.id, true).await.unwrap();
    assert!(pinned.pinned);
}

#[tokio::test]
async fn test_message_requires_body() {
    let h = harness().await;
    let lead = assigned_lead(&h).await;
    let threads = h.services.threads();

    let message = threads
        .post_message(
            &h.agent,
            lead.id,
            NewMessage {
                subject: "Question".to_string(),
                body_plain: "Le client rappelle lundi".to_string(),
                body_rich: Some("<p>Le client rappelle <b>lundi</b></p>".to_string()),
                important: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(message.author_id, h.agent.staff_id);

    let result = threads
        .post_message(&h.agent, lead.id, NewMessage::default())
        .await;
    assert!(matches!(result, Err(AppError::Validation { .. })));
}

#[tokio::test]
async fn test_compose_email_renders_placeholders() {
    let mut mailer = MockOutboundMailer::new();
    mailer
        .expect_enqueue()
        .withf(|job| job.to == "j@x.fr" && job.body.starts_with("Bonjour Jean,"))
        .times(1)
        .returning(|_| Ok(()));

    let h = harness_with(AdapterOverrides {
        mailer: Some(Arc::new(mailer)),
        ..Default::default()
    })
    .await;
    let lead = assigned_lead(&h).await;

    let email = h
        .services
        .threads()
        .compose_email(
            &h.agent,
            lead.id,
            EmailDraft {
                subject: "Dossier {{reference}}".to_string(),
                body: "Bonjour {{ first_name }}, réglez ici : {{payment_link}} {{unknown}}"
                    .to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(email.subject, format!("Dossier {}", lead.reference()));
    assert!(email.body.contains("https://desk.example.fr/public/pay/"));
    assert!(email.body.ends_with("{{unknown}}"));
    assert_eq!(email.delivery_status, DeliveryStatus::Queued);
    assert_eq!(email.direction, EmailDirection::Outbound);
}

#[tokio::test]
async fn test_compose_email_marks_failure_when_queue_down() {
    let mut mailer = MockOutboundMailer::new();
    mailer
        .expect_enqueue()
        .returning(|_| Err(AppError::upstream("Mail queue")));

    let h = harness_with(AdapterOverrides {
        mailer: Some(Arc::new(mailer)),
        ..Default::default()
    })
    .await;
    let lead = assigned_lead(&h).await;

    let email = h
        .services
        .threads()
        .compose_email(
            &h.manager,
            lead.id,
            EmailDraft {
                subject: "Relance".to_string(),
                body: "Bonjour".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(email.delivery_status, DeliveryStatus::Failed);
    assert_eq!(email.diagnostic.as_deref(), Some("mail queue unavailable"));
}

#[tokio::test]
async fn test_delivery_reports_never_regress() {
    let h = harness().await;
    let lead = assigned_lead(&h).await;
    let email = h
        .services
        .threads()
        .compose_email(
            &h.manager,
            lead.id,
            EmailDraft {
                subject: "Relance".to_string(),
                body: "Bonjour".to_string(),
            },
        )
        .await
        .unwrap();
    let threads = h.services.threads();

    let delivered = threads
        .record_delivery(DeliveryReport {
            email_id: email.id,
            status: DeliveryStatus::Delivered,
            diagnostic: None,
        })
        .await
        .unwrap();
    assert_eq!(
        delivered.map(|e| e.delivery_status),
        Some(DeliveryStatus::Delivered)
    );

    let stale = threads
        .record_delivery(DeliveryReport {
            email_id: email.id,
            status: DeliveryStatus::Sent,
            diagnostic: None,
        })
        .await
        .unwrap();
    assert_eq!(stale, None);
}

#[tokio::test]
async fn test_inbound_email_matches_lead_by_sender() {
    let h = harness().await;
    let lead = assigned_lead(&h).await;
    let threads = h.services.threads();

    let matched = threads
        .record_inbound_email(InboundEmail {
            from: "J@X.FR".to_string(),
            subject: "Re: Dossier".to_string(),
            body: "Merci".to_string(),
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(matched.lead_id, lead.id);
    assert_eq!(matched.direction, EmailDirection::Inbound);

    let unmatched = threads
        .record_inbound_email(InboundEmail {
            from: "stranger@y.fr".to_string(),
            subject: "Hello".to_string(),
            body: "?".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(unmatched, None);
}
