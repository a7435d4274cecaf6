//! Lead lifecycle tests: funnel merges, assignment, status and payments.

mod support;

use std::sync::Arc;

use mockall::predicate::{always, eq};
use uuid::Uuid;

use common::{AppError, PaginationParams};
use domain::{
    AssignmentFilter, Channel, LeadPatch, LeadQuery, LeadStatus, PaymentStatus, ProjectStatus,
};
use lead_service_lib::infra::{
    CheckoutSession, MockAddressLookup, MockNotifier, MockPaymentGateway, Notification,
};
use lead_service_lib::repository::{LeadRepository, NoteRepository};
use lead_service_lib::service::{PaymentConfirmation, PaymentOutcome, PostalResolution};

use support::{complete, harness, harness_with, step_one, step_two, AdapterOverrides, FEE_CENTS};

#[tokio::test]
async fn test_same_step_twice_keeps_one_lead() {
    let h = harness().await;
    let leads = h.services.leads();

    let first = leads.create_or_advance("j@x.fr", step_one()).await.unwrap();
    let second = leads.create_or_advance("J@X.fr ", step_one()).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.lead.id, second.lead.id);
    assert_eq!(second.lead.form_step, 1);
    assert_eq!(h.store.lead_count().await, 1);

    let notes = h.store.list_for_lead(first.lead.id).await.unwrap();
    assert!(notes.is_empty());
}

#[tokio::test]
async fn test_steps_merge_without_erasing() {
    let h = harness().await;
    let leads = h.services.leads();

    leads.create_or_advance("j@x.fr", step_one()).await.unwrap();
    let outcome = leads.create_or_advance("j@x.fr", step_two()).await.unwrap();
    let lead = outcome.lead;

    assert_eq!(lead.first_name.as_deref(), Some("Jean"));
    assert_eq!(lead.last_name.as_deref(), Some("Dupont"));
    assert_eq!(lead.postal_code.as_deref(), Some("75011"));
    assert_eq!(lead.form_step, 2);
    assert_eq!(lead.status, LeadStatus::Partial);

    // An earlier step never moves form_step back
    let again = leads.create_or_advance("j@x.fr", step_one()).await.unwrap();
    assert_eq!(again.lead.form_step, 2);
}

#[tokio::test]
async fn test_single_city_fills_in() {
    let h = harness().await;

    let outcome = h
        .services
        .leads()
        .create_or_advance("j@x.fr", step_two())
        .await
        .unwrap();

    assert_eq!(outcome.postal, PostalResolution::Resolved("Paris".to_string()));
    assert_eq!(outcome.lead.city.as_deref(), Some("Paris"));
}

#[tokio::test]
async fn test_shared_postal_code_returns_candidates() {
    let h = harness().await;
    let patch = LeadPatch {
        postal_code: Some("01400".to_string()),
        ..Default::default()
    };

    let outcome = h
        .services
        .leads()
        .create_or_advance("j@x.fr", patch)
        .await
        .unwrap();

    assert!(matches!(outcome.postal, PostalResolution::Ambiguous(ref cities) if cities.len() == 2));
    assert_eq!(outcome.lead.city, None);
}

#[tokio::test]
async fn test_geocoding_outage_does_not_fail_step() {
    let mut geo = MockAddressLookup::new();
    geo.expect_cities_for_postal_code()
        .with(eq("75011"))
        .returning(|_| Err(AppError::upstream("Postal code lookup")));

    let h = harness_with(AdapterOverrides {
        geo: Some(Arc::new(geo)),
        ..Default::default()
    })
    .await;

    let outcome = h
        .services
        .leads()
        .create_or_advance("j@x.fr", step_two())
        .await
        .unwrap();

    assert_eq!(outcome.postal, PostalResolution::Unavailable);
    assert_eq!(outcome.lead.postal_code.as_deref(), Some("75011"));
}

#[tokio::test]
async fn test_incomplete_finalize_changes_nothing() {
    let h = harness().await;
    let leads = h.services.leads();
    let before = leads.create_or_advance("j@x.fr", step_one()).await.unwrap().lead;

    let result = leads.finalize("j@x.fr", step_two()).await;

    match result {
        Err(AppError::Validation { fields, .. }) => {
            assert!(fields.contains(&"client_type".to_string()));
            assert!(fields.contains(&"power_kva".to_string()));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    let after = LeadRepository::find_by_id(&h.store, before.id).await.unwrap();
    assert_eq!(after, Some(before));
}

#[tokio::test]
async fn test_finalize_notifies_team_once() {
    let mut notifier = MockNotifier::new();
    notifier
        .expect_dispatch()
        .withf(|n| matches!(n, Notification::NewLead { name, .. } if name == "Jean Dupont"))
        .times(1)
        .returning(|_| Ok(()));

    let h = harness_with(AdapterOverrides {
        notifier: Some(Arc::new(notifier)),
        ..Default::default()
    })
    .await;
    let leads = h.services.leads();

    let first = leads.finalize("j@x.fr", complete()).await.unwrap();
    let second = leads.finalize("j@x.fr", complete()).await.unwrap();

    assert!(first.newly_submitted);
    assert!(!second.newly_submitted);
    assert_eq!(first.lead.amount_cents, Some(FEE_CENTS));
}

#[tokio::test]
async fn test_assign_requires_capability() {
    let h = harness().await;
    let lead = h
        .services
        .leads()
        .finalize("j@x.fr", complete())
        .await
        .unwrap()
        .lead;

    let result = h
        .services
        .leads()
        .assign(&h.agent, lead.id, Some("agent@x.fr".to_string()))
        .await;

    assert!(matches!(result, Err(AppError::PermissionDenied(_))));
}

#[tokio::test]
async fn test_assign_to_deactivated_staff_is_conflict() {
    let h = harness().await;
    let lead = h
        .services
        .leads()
        .finalize("j@x.fr", complete())
        .await
        .unwrap()
        .lead;
    h.services
        .staff()
        .set_active(&h.manager, h.other_operator.staff_id, false)
        .await
        .unwrap();

    let result = h
        .services
        .leads()
        .assign(&h.manager, lead.id, Some("other@x.fr".to_string()))
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_status_change_writes_one_system_note() {
    let h = harness().await;
    let leads = h.services.leads();
    let lead = leads.finalize("j@x.fr", complete()).await.unwrap().lead;

    let updated = leads
        .set_status(&h.manager, lead.id, LeadStatus::InReview)
        .await
        .unwrap();
    // Same status again is a no-op
    leads
        .set_status(&h.manager, lead.id, LeadStatus::InReview)
        .await
        .unwrap();

    assert_eq!(updated.status, LeadStatus::InReview);
    let notes = h.store.list_for_lead(lead.id).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].is_system());
    assert!(notes[0].body.contains("submitted to in_review"));
}

#[tokio::test]
async fn test_project_status_needs_submission() {
    let h = harness().await;
    let leads = h.services.leads();
    let draft = leads.create_or_advance("j@x.fr", step_one()).await.unwrap().lead;

    let result = leads
        .set_project_status(&h.manager, draft.id, ProjectStatus::Contacte)
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let lead = leads.finalize("j@x.fr", complete()).await.unwrap().lead;
    let updated = leads
        .set_project_status(&h.manager, lead.id, ProjectStatus::DevisEnvoye)
        .await
        .unwrap();
    assert_eq!(updated.project_status, ProjectStatus::DevisEnvoye);
    assert_eq!(updated.status, LeadStatus::Submitted);
}

#[tokio::test]
async fn test_reopen_only_from_resolved() {
    let h = harness().await;
    let leads = h.services.leads();
    let lead = leads.finalize("j@x.fr", complete()).await.unwrap().lead;

    assert!(matches!(
        leads.reopen(&h.manager, lead.id).await,
        Err(AppError::Conflict(_))
    ));

    leads
        .set_status(&h.manager, lead.id, LeadStatus::Resolved)
        .await
        .unwrap();
    let reopened = leads.reopen(&h.manager, lead.id).await.unwrap();
    assert_eq!(reopened.status, LeadStatus::Assigned);
}

#[tokio::test]
async fn test_payment_twice_records_once() {
    let h = harness().await;
    let leads = h.services.leads();
    let lead = leads.finalize("j@x.fr", complete()).await.unwrap().lead;

    let first = leads
        .record_payment(lead.id, PaymentStatus::Paid, 12_900)
        .await
        .unwrap();
    let second = leads
        .record_payment(lead.id, PaymentStatus::Paid, 12_900)
        .await
        .unwrap();

    assert!(matches!(first, PaymentOutcome::Recorded(_)));
    assert!(second.is_duplicate());
    assert_eq!(second.lead().payment_status, PaymentStatus::Paid);
    assert_eq!(second.lead().amount_cents, Some(12_900));

    let notes = h.store.list_for_lead(lead.id).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].body.starts_with("Payment paid"));
}

#[tokio::test]
async fn test_earlier_checkout_session_still_confirms() {
    let h = harness().await;
    let payments = h.services.payments();
    let lead = h
        .services
        .leads()
        .finalize("j@x.fr", complete())
        .await
        .unwrap()
        .lead;

    // The link is opened twice; the lead pays on the first page
    let link = payments.payment_link(&lead).unwrap();
    let token = link.rsplit('/').next().unwrap();
    let first = payments.open_payment_link(token).await.unwrap();
    let second = payments.open_payment_link(token).await.unwrap();
    assert_ne!(first.session_ref, second.session_ref);

    let outcome = payments
        .confirm_payment(PaymentConfirmation {
            session_ref: first.session_ref,
            status: PaymentStatus::Paid,
            amount_cents: FEE_CENTS,
        })
        .await
        .unwrap();

    assert!(!outcome.is_duplicate());
    assert_eq!(outcome.lead().id, lead.id);
    assert_eq!(outcome.lead().payment_status, PaymentStatus::Paid);

    // A confirmation for the second session is now a repeat
    let late = payments
        .confirm_payment(PaymentConfirmation {
            session_ref: second.session_ref,
            status: PaymentStatus::Paid,
            amount_cents: FEE_CENTS,
        })
        .await
        .unwrap();
    assert!(late.is_duplicate());
}

#[tokio::test]
async fn test_concurrent_submissions_merge_into_one_lead() {
    let h = harness().await;
    let leads = h.services.leads();

    let (one, two, done) = tokio::join!(
        leads.create_or_advance("j@x.fr", step_one()),
        leads.create_or_advance("j@x.fr", step_two()),
        leads.finalize("j@x.fr", complete()),
    );
    let (one, two, done) = (one.unwrap(), two.unwrap(), done.unwrap());

    assert_eq!(h.store.lead_count().await, 1);
    assert_eq!(one.lead.id, two.lead.id);
    assert_eq!(two.lead.id, done.lead.id);
    assert_eq!([one.created, two.created, done.created].iter().filter(|c| **c).count(), 1);

    let stored = LeadRepository::find_by_email(&h.store, "j@x.fr")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.first_name.as_deref(), Some("Jean"));
    assert_eq!(stored.postal_code.as_deref(), Some("75011"));
    assert_eq!(stored.form_step, 3);
    assert_eq!(stored.status, LeadStatus::Submitted);
    assert_eq!(stored.amount_cents, Some(FEE_CENTS));

    // A late step save never moves the lead back
    let late = leads.create_or_advance("j@x.fr", step_one()).await.unwrap();
    assert_eq!(late.lead.form_step, 3);
    assert_eq!(late.lead.status, LeadStatus::Submitted);
}

#[tokio::test]
async fn test_purge_is_superadmin_only() {
    let h = harness().await;
    let leads = h.services.leads();
    let lead = leads.finalize("j@x.fr", complete()).await.unwrap().lead;
    leads
        .set_status(&h.manager, lead.id, LeadStatus::InReview)
        .await
        .unwrap();

    assert!(matches!(
        leads.purge(&h.manager, lead.id).await,
        Err(AppError::PermissionDenied(_))
    ));

    leads.purge(&h.superadmin, lead.id).await.unwrap();
    assert_eq!(h.store.lead_count().await, 0);
    assert!(h.store.list_for_lead(lead.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_funnel_to_assignment_end_to_end() {
    let mut checkout = MockPaymentGateway::new();
    checkout
        .expect_start_session()
        .with(always(), always(), eq(FEE_CENTS))
        .times(1)
        .returning(|_, _, _| {
            Ok(CheckoutSession {
                session_ref: "S1".to_string(),
                redirect_url: "https://checkout.example.com/pay?session=S1".to_string(),
            })
        });

    let h = harness_with(AdapterOverrides {
        checkout: Some(Arc::new(checkout)),
        ..Default::default()
    })
    .await;
    let leads = h.services.leads();
    let payments = h.services.payments();

    // Step 1
    let step = leads.create_or_advance("j@x.fr", step_one()).await.unwrap();
    assert_eq!(step.lead.form_step, 1);

    // Step 3, complete
    let submitted = leads.finalize("j@x.fr", complete()).await.unwrap();
    assert_eq!(submitted.lead.id, step.lead.id);
    assert_eq!(submitted.lead.form_step, 3);
    assert_eq!(submitted.lead.status, LeadStatus::Submitted);

    // The payment link opens checkout session S1
    let link = payments.payment_link(&submitted.lead).unwrap();
    let token = link.rsplit('/').next().unwrap();
    let session = payments.open_payment_link(token).await.unwrap();
    assert_eq!(session.session_ref, "S1");

    // Provider confirms S1 twice
    let confirmation = PaymentConfirmation {
        session_ref: "S1".to_string(),
        status: PaymentStatus::Paid,
        amount_cents: FEE_CENTS,
    };
    let first = payments.confirm_payment(confirmation.clone()).await.unwrap();
    let second = payments.confirm_payment(confirmation).await.unwrap();
    assert!(!first.is_duplicate());
    assert!(second.is_duplicate());
    assert_eq!(second.lead().payment_status, PaymentStatus::Paid);

    // Before assignment, no operator sees it
    let hidden = leads.get(&h.agent, step.lead.id).await;
    assert!(matches!(hidden, Err(AppError::NotFound)));

    // Manager assigns to agent@x.fr
    let assigned = leads
        .assign(&h.manager, step.lead.id, Some("agent@x.fr".to_string()))
        .await
        .unwrap();
    assert_eq!(assigned.assigned_to, Some(h.agent.staff_id));
    assert_eq!(assigned.status, LeadStatus::Assigned);

    let notes = h.store.list_for_lead(step.lead.id).await.unwrap();
    let assignment_notes: Vec<_> = notes
        .iter()
        .filter(|n| n.is_system() && n.body.starts_with("Assigned to agent@x.fr"))
        .collect();
    assert_eq!(assignment_notes.len(), 1);

    // The assignee sees it, the other operator still does not
    assert!(leads.get(&h.agent, step.lead.id).await.is_ok());
    assert!(matches!(
        leads.get(&h.other_operator, step.lead.id).await,
        Err(AppError::NotFound)
    ));

    let page = h
        .services
        .search()
        .query(&h.other_operator, LeadQuery::default(), PaginationParams::default())
        .await
        .unwrap();
    assert!(page.data.is_empty());

    let page = h
        .services
        .search()
        .query(
            &h.agent,
            LeadQuery {
                assignment: AssignmentFilter::Me,
                ..Default::default()
            },
            PaginationParams::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].amount_cents, None);
}

#[tokio::test]
async fn test_correlated_write_is_confirmed() {
    let h = harness().await;
    let lead = h
        .services
        .leads()
        .finalize("j@x.fr", complete())
        .await
        .unwrap()
        .lead;

    let correlation_id = Uuid::new_v4();
    let pending = h.services.realtime().track(correlation_id);
    let ctx = h.manager.clone().with_correlation(Some(correlation_id));

    let leads = h.services.leads();
    let (updated, event) = pending
        .settle(leads.set_status(&ctx, lead.id, LeadStatus::InReview))
        .await
        .unwrap();
    assert_eq!(updated.status, LeadStatus::InReview);

    let event = event.unwrap();
    assert_eq!(event.correlation_id, Some(correlation_id));
    // The audit note is announced on the thread before the lead update
    assert!(matches!(
        event.subject,
        domain::Subject::Item(Channel::Note) | domain::Subject::Lead
    ));
}
