//! Payout table integration tests: listing, counts and manual settlement.

mod common;

use common::{partner, Fixture, TestApp};
use payout_service::models::{Commission, CommissionStatus, Payout, PayoutStatus};
use serde_json::Value;
use uuid::Uuid;

/// Five payouts of one partner: pending 100, 300, 500; processing 200; completed 400.
async fn seed_table(app: &TestApp) -> (Fixture, Vec<Payout>) {
    let fixture = Fixture::new(None);
    let alice = partner("Alice", Some("alice@example.com"));

    let payouts: Vec<Payout> = [
        (100, PayoutStatus::Pending),
        (200, PayoutStatus::Processing),
        (300, PayoutStatus::Pending),
        (400, PayoutStatus::Completed),
        (500, PayoutStatus::Pending),
    ]
    .into_iter()
    .map(|(amount, status)| {
        let mut payout = Payout::new(fixture.program.id, alice.id, amount);
        payout.status = status;
        payout
    })
    .collect();

    let stored = payouts.clone();
    app.seed(|state| {
        fixture.install(state);
        state.partners.push(alice);
        state.payouts.extend(stored);
    })
    .await;

    (fixture, payouts)
}

async fn get(app: &TestApp, fixture: &Fixture, path: &str) -> reqwest::Response {
    app.client
        .get(app.url(&format!("/programs/{}{}", fixture.program.id, path)))
        .header("X-Workspace-ID", fixture.workspace.id.to_string())
        .send()
        .await
        .expect("Failed to execute request")
}

async fn mark_paid(app: &TestApp, fixture: &Fixture, payout_id: Uuid) -> reqwest::Response {
    app.client
        .post(app.url(&format!(
            "/programs/{}/payouts/{}/mark-paid",
            fixture.program.id, payout_id
        )))
        .header("X-Workspace-ID", fixture.workspace.id.to_string())
        .header("X-User-ID", "user_7")
        .send()
        .await
        .expect("Failed to execute request")
}

fn amounts(rows: &[Value]) -> Vec<i64> {
    rows.iter().map(|r| r["amount"].as_i64().unwrap()).collect()
}

#[tokio::test]
async fn lists_payouts_with_partner_sorted_by_amount_desc() {
    let app = TestApp::spawn().await;
    let (fixture, _) = seed_table(&app).await;

    let response = get(&app, &fixture, "/payouts").await;
    assert_eq!(response.status().as_u16(), 200);

    let rows: Vec<Value> = response.json().await.unwrap();
    assert_eq!(amounts(&rows), vec![500, 400, 300, 200, 100]);
    assert_eq!(rows[0]["partner"]["name"], "Alice");
    assert_eq!(rows[0]["status"], "pending");
}

#[tokio::test]
async fn filters_sorts_and_paginates() {
    let app = TestApp::spawn().await;
    let (fixture, _) = seed_table(&app).await;

    let pending: Vec<Value> = get(&app, &fixture, "/payouts?status=pending&sort_order=asc")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(amounts(&pending), vec![100, 300, 500]);

    let second_page: Vec<Value> = get(&app, &fixture, "/payouts?page=2&page_size=2")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(amounts(&second_page), vec![300, 200]);

    let unknown_status = get(&app, &fixture, "/payouts?status=lost").await;
    assert_eq!(unknown_status.status().as_u16(), 400);
}

#[tokio::test]
async fn counts_payouts_overall_and_by_status() {
    let app = TestApp::spawn().await;
    let (fixture, _) = seed_table(&app).await;

    let total: Value = get(&app, &fixture, "/payouts/count")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(total["count"], 5);

    let pending: Value = get(&app, &fixture, "/payouts/count?status=pending")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(pending["count"], 3);

    let grouped: Vec<Value> = get(&app, &fixture, "/payouts/count?group_by=status")
        .await
        .json()
        .await
        .unwrap();
    let pairs: Vec<(String, i64)> = grouped
        .iter()
        .map(|g| {
            (
                g["status"].as_str().unwrap().to_string(),
                g["count"].as_i64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("pending".to_string(), 3),
            ("processing".to_string(), 1),
            ("completed".to_string(), 1),
            ("failed".to_string(), 0),
            ("canceled".to_string(), 0),
        ]
    );
}

#[tokio::test]
async fn requires_workspace_that_owns_the_program() {
    let app = TestApp::spawn().await;
    let (fixture, _) = seed_table(&app).await;

    let anonymous = app
        .client
        .get(app.url(&format!("/programs/{}/payouts", fixture.program.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);

    let foreign = app
        .client
        .get(app.url(&format!("/programs/{}/payouts", fixture.program.id)))
        .header("X-Workspace-ID", Uuid::new_v4().to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(foreign.status().as_u16(), 404);
}

#[tokio::test]
async fn mark_paid_completes_pending_payout_and_its_commissions() {
    let app = TestApp::spawn().await;
    let (fixture, payouts) = seed_table(&app).await;
    let payout = &payouts[0];

    let commission = Commission {
        id: Uuid::new_v4(),
        program_id: fixture.program.id,
        partner_id: payout.partner_id,
        payout_id: Some(payout.id),
        amount: payout.amount,
        status: CommissionStatus::Processed,
    };
    let commission_id = commission.id;
    app.seed(|state| state.commissions.push(commission)).await;

    let response = mark_paid(&app, &fixture, payout.id).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "completed");

    let stored = app.payout(payout.id).await;
    assert_eq!(stored.status, PayoutStatus::Completed);
    assert!(stored.paid_at.is_some());
    assert_eq!(stored.user_id.as_deref(), Some("user_7"));

    let state = app.store.snapshot().await;
    let commission = state
        .commissions
        .iter()
        .find(|c| c.id == commission_id)
        .unwrap();
    assert_eq!(commission.status, CommissionStatus::Paid);
}

#[tokio::test]
async fn mark_paid_rejects_processing_and_completed_payouts() {
    let app = TestApp::spawn().await;
    let (fixture, payouts) = seed_table(&app).await;

    for payout in [&payouts[1], &payouts[3]] {
        let response = mark_paid(&app, &fixture, payout.id).await;
        assert_eq!(response.status().as_u16(), 400);
        assert_eq!(app.payout(payout.id).await.status, payout.status);
    }

    let missing = mark_paid(&app, &fixture, Uuid::new_v4()).await;
    assert_eq!(missing.status().as_u16(), 404);
}
