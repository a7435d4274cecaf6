//! Lead search and export tests.

mod support;

use chrono::{Duration, Utc};
use uuid::Uuid;

use common::{AppError, PaginationParams};
use domain::{AssignmentFilter, CreatedBucket, Lead, LeadQuery, LeadStatus};

use support::{harness, Harness};

async fn seed_lead(h: &Harness, email: &str, days_ago: i64, edit: impl FnOnce(&mut Lead)) -> Lead {
    let mut lead = Lead::skeleton(
        Uuid::new_v4(),
        email.to_string(),
        Utc::now() - Duration::days(days_ago),
    );
    lead.status = LeadStatus::Submitted;
    edit(&mut lead);
    h.store.seed_lead(lead).await
}

#[tokio::test]
async fn test_query_newest_first_with_pagination() {
    let h = harness().await;
    for days in [10, 1, 5] {
        seed_lead(&h, &format!("lead{}@x.fr", days), days, |_| {}).await;
    }

    let page = h
        .services
        .search()
        .query(&h.manager, LeadQuery::default(), PaginationParams::new(1, 2))
        .await
        .unwrap();

    assert_eq!(page.meta.total, 3);
    assert_eq!(page.meta.total_pages, 2);
    let emails: Vec<_> = page.data.iter().map(|v| v.email.clone().unwrap()).collect();
    assert_eq!(emails, vec!["lead1@x.fr", "lead5@x.fr"]);
}

#[tokio::test]
async fn test_facets_combine() {
    let h = harness().await;
    let agent_id = h.agent.staff_id;
    seed_lead(&h, "paris@x.fr", 2, |l| {
        l.city = Some("Paris".to_string());
        l.last_name = Some("Martin".to_string());
    })
    .await;
    seed_lead(&h, "lyon@x.fr", 2, |l| l.city = Some("Lyon".to_string())).await;
    seed_lead(&h, "old-paris@x.fr", 40, |l| l.city = Some("paris".to_string())).await;
    seed_lead(&h, "taken@x.fr", 1, |l| {
        l.city = Some("Paris".to_string());
        l.assigned_to = Some(agent_id);
    })
    .await;

    let query = LeadQuery {
        city: Some("PARIS".to_string()),
        created: Some(CreatedBucket::Month),
        assignment: AssignmentFilter::Unassigned,
        ..Default::default()
    };
    let page = h
        .services
        .search()
        .query(&h.manager, query, PaginationParams::default())
        .await
        .unwrap();

    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].email.as_deref(), Some("paris@x.fr"));

    let by_text = LeadQuery {
        text: Some("mart".to_string()),
        ..Default::default()
    };
    let page = h
        .services
        .search()
        .query(&h.manager, by_text, PaginationParams::default())
        .await
        .unwrap();
    assert_eq!(page.data.len(), 1);
}

#[tokio::test]
async fn test_operator_unassigned_filter_is_empty() {
    let h = harness().await;
    seed_lead(&h, "free@x.fr", 0, |_| {}).await;

    let query = LeadQuery {
        assignment: AssignmentFilter::Unassigned,
        ..Default::default()
    };
    let page = h
        .services
        .search()
        .query(&h.agent, query, PaginationParams::default())
        .await
        .unwrap();

    assert!(page.data.is_empty());
    assert_eq!(page.meta.total, 0);
}

#[tokio::test]
async fn test_operator_view_hides_payment_fields() {
    let h = harness().await;
    let agent_id = h.agent.staff_id;
    seed_lead(&h, "mine@x.fr", 0, |l| {
        l.assigned_to = Some(agent_id);
        l.amount_cents = Some(12_900);
        l.registration_number = Some("123 456 789".to_string());
    })
    .await;

    let page = h
        .services
        .search()
        .query(&h.agent, LeadQuery::default(), PaginationParams::default())
        .await
        .unwrap();

    assert_eq!(page.data.len(), 1);
    let view = &page.data[0];
    assert_eq!(view.email.as_deref(), Some("mine@x.fr"));
    assert_eq!(view.amount_cents, None);
    assert_eq!(view.payment_status, None);
    assert_eq!(view.registration_number, None);
}

#[tokio::test]
async fn test_export_requires_capability() {
    let h = harness().await;

    let result = h
        .services
        .search()
        .export_csv(&h.agent, LeadQuery::default())
        .await;

    assert!(matches!(result, Err(AppError::PermissionDenied(_))));
}

#[tokio::test]
async fn test_manager_export() {
    let h = harness().await;
    seed_lead(&h, "quote@x.fr", 0, |l| {
        l.company_name = Some("Dupont, Fils & \"Cie\"".to_string());
    })
    .await;

    let csv = h
        .services
        .search()
        .export_csv(&h.manager, LeadQuery::default())
        .await
        .unwrap();

    let mut lines = csv.split("\r\n");
    let header = lines.next().unwrap();
    assert!(header.starts_with("reference,email,first_name,last_name"));
    assert!(header.contains("amount_cents"));
    assert!(csv.contains("\"Dupont, Fils & \"\"Cie\"\"\""));
    assert!(csv.ends_with("\r\n"));
}
