//! Confirm-payouts integration tests.

mod common;

use common::{partner, Fixture, TestApp, BANK_METHOD, CARD_METHOD, FOREIGN_METHOD, SEPA_METHOD};
use payout_service::models::{Payout, PayoutStatus};
use serde_json::{json, Value};
use uuid::Uuid;

async fn confirm(app: &TestApp, workspace_id: Uuid, method: &str) -> reqwest::Response {
    confirm_as(app, workspace_id, workspace_id, method).await
}

async fn confirm_as(
    app: &TestApp,
    header_workspace_id: Uuid,
    workspace_id: Uuid,
    method: &str,
) -> reqwest::Response {
    app.client
        .post(app.url("/payouts/confirm"))
        .header("X-Workspace-ID", header_workspace_id.to_string())
        .header("X-User-ID", "user_42")
        .json(&json!({ "workspace_id": workspace_id, "payment_method_id": method }))
        .send()
        .await
        .expect("Failed to execute request")
}

/// Two eligible payouts of 60.00 and 40.00 from partners with email.
async fn seed_two_payouts(app: &TestApp, fixture: &Fixture) -> (Payout, Payout) {
    let alice = partner("Alice", Some("alice@example.com"));
    let bob = partner("Bob", Some("bob@example.com"));
    let first = Payout::new(fixture.program.id, alice.id, 6_000);
    let second = Payout::new(fixture.program.id, bob.id, 4_000);

    let (a, b) = (first.clone(), second.clone());
    app.seed(|state| {
        fixture.install(state);
        state.partners.extend([alice, bob]);
        state.payouts.extend([a, b]);
    })
    .await;

    (first, second)
}

#[tokio::test]
async fn bank_debit_confirmation_creates_invoice_and_charges_total() {
    let app = TestApp::spawn().await;
    let fixture = Fixture::new(Some("business"));
    let (first, second) = seed_two_payouts(&app, &fixture).await;

    let response = confirm(&app, fixture.workspace.id, BANK_METHOD).await;
    assert_eq!(response.status().as_u16(), 201);

    let invoice: Value = response.json().await.unwrap();
    assert_eq!(invoice["number"], "ACME-0001");
    assert_eq!(invoice["amount"], 10_000);
    assert_eq!(invoice["fee"], 500);
    assert_eq!(invoice["total"], 10_500);
    let invoice_id: Uuid = invoice["id"].as_str().unwrap().parse().unwrap();

    for payout_id in [first.id, second.id] {
        let payout = app.payout(payout_id).await;
        assert_eq!(payout.status, PayoutStatus::Processing);
        assert_eq!(payout.invoice_id, Some(invoice_id));
        assert_eq!(payout.user_id.as_deref(), Some("user_42"));
    }

    let charges = app.processor.charges();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].amount, 10_500);
    assert_eq!(charges[0].currency, "usd");
    assert_eq!(charges[0].customer, common::CUSTOMER_ID);
    assert_eq!(charges[0].transfer_group, invoice_id.to_string());
    assert_eq!(charges[0].idempotency_key, invoice_id.to_string());
    assert_eq!(charges[0].payment_method_types.len(), 3);

    app.wait_for_emails(2).await;
    let sent = app.email.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent
        .iter()
        .all(|m| m.subject == "You've got money coming your way!"));
    let mut recipients: Vec<_> = sent.iter().map(|m| m.to.as_str()).collect();
    recipients.sort();
    assert_eq!(recipients, vec!["alice@example.com", "bob@example.com"]);
}

#[tokio::test]
async fn card_confirmation_uses_plan_rate_and_sends_no_email() {
    let app = TestApp::spawn().await;
    let fixture = Fixture::new(Some("Advanced Plus"));
    seed_two_payouts(&app, &fixture).await;

    let response = confirm(&app, fixture.workspace.id, CARD_METHOD).await;
    assert_eq!(response.status().as_u16(), 201);

    let invoice: Value = response.json().await.unwrap();
    assert_eq!(invoice["fee"], 700);
    assert_eq!(invoice["total"], 10_700);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(app.email.send_count(), 0);
}

#[tokio::test]
async fn second_invoice_of_workspace_is_numbered_sequentially() {
    let app = TestApp::spawn().await;
    let fixture = Fixture::new(None);
    seed_two_payouts(&app, &fixture).await;

    let first = confirm(&app, fixture.workspace.id, CARD_METHOD).await;
    assert_eq!(first.status().as_u16(), 201);

    let carol = partner("Carol", None);
    let payout = Payout::new(fixture.program.id, carol.id, 2_500);
    app.seed(|state| {
        state.partners.push(carol);
        state.payouts.push(payout);
    })
    .await;

    let second = confirm(&app, fixture.workspace.id, CARD_METHOD).await;
    assert_eq!(second.status().as_u16(), 201);
    let invoice: Value = second.json().await.unwrap();
    assert_eq!(invoice["number"], "ACME-0002");
    assert_eq!(invoice["amount"], 2_500);
}

#[tokio::test]
async fn confirming_twice_charges_once() {
    let app = TestApp::spawn().await;
    let fixture = Fixture::new(None);
    seed_two_payouts(&app, &fixture).await;

    let first = confirm(&app, fixture.workspace.id, BANK_METHOD).await;
    assert_eq!(first.status().as_u16(), 201);

    let second = confirm(&app, fixture.workspace.id, BANK_METHOD).await;
    assert_eq!(second.status().as_u16(), 400);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["error"], "No pending payouts found.");

    assert_eq!(app.processor.charge_count(), 1);
    assert_eq!(app.store.snapshot().await.invoices.len(), 1);
}

#[tokio::test]
async fn ineligible_payouts_are_left_alone() {
    let app = TestApp::spawn().await;
    let mut fixture = Fixture::new(None);
    fixture.program.min_payout_amount = 1_000;

    let enabled = partner("Enabled", Some("enabled@example.com"));
    let mut disabled = partner("Disabled", Some("disabled@example.com"));
    disabled.payouts_enabled_at = None;

    let eligible = Payout::new(fixture.program.id, enabled.id, 5_000);
    let too_small = Payout::new(fixture.program.id, enabled.id, 999);
    let not_enabled = Payout::new(fixture.program.id, disabled.id, 5_000);
    let mut already_invoiced = Payout::new(fixture.program.id, enabled.id, 5_000);
    already_invoiced.invoice_id = Some(Uuid::new_v4());
    let mut completed = Payout::new(fixture.program.id, enabled.id, 5_000);
    completed.status = PayoutStatus::Completed;

    let payouts = vec![
        eligible.clone(),
        too_small.clone(),
        not_enabled.clone(),
        already_invoiced.clone(),
        completed.clone(),
    ];
    app.seed(|state| {
        fixture.install(state);
        state.partners.extend([enabled, disabled]);
        state.payouts.extend(payouts);
    })
    .await;

    let response = confirm(&app, fixture.workspace.id, CARD_METHOD).await;
    assert_eq!(response.status().as_u16(), 201);
    let invoice: Value = response.json().await.unwrap();
    assert_eq!(invoice["amount"], 5_000);

    assert_eq!(
        app.payout(eligible.id).await.status,
        PayoutStatus::Processing
    );
    for payout in [too_small, not_enabled, already_invoiced] {
        let stored = app.payout(payout.id).await;
        assert_eq!(stored.status, PayoutStatus::Pending);
        assert_eq!(stored.invoice_id, payout.invoice_id);
    }
    assert_eq!(
        app.payout(completed.id).await.status,
        PayoutStatus::Completed
    );
}

#[tokio::test]
async fn no_pending_payouts_is_rejected() {
    let app = TestApp::spawn().await;
    let fixture = Fixture::new(None);
    app.seed(|state| fixture.install(state)).await;

    let response = confirm(&app, fixture.workspace.id, BANK_METHOD).await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No pending payouts found.");
    assert_eq!(app.processor.charge_count(), 0);
}

#[tokio::test]
async fn payment_method_of_another_customer_is_rejected() {
    let app = TestApp::spawn().await;
    let fixture = Fixture::new(None);
    seed_two_payouts(&app, &fixture).await;

    for method in [FOREIGN_METHOD, "pm_does_not_exist"] {
        let response = confirm(&app, fixture.workspace.id, method).await;
        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Invalid payout method.");
    }
    assert!(app.store.snapshot().await.invoices.is_empty());
}

#[tokio::test]
async fn unsupported_method_type_is_rejected() {
    let app = TestApp::spawn().await;
    let fixture = Fixture::new(None);
    seed_two_payouts(&app, &fixture).await;

    let response = confirm(&app, fixture.workspace.id, SEPA_METHOD).await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("We only support ACH and Card for now."));
}

#[tokio::test]
async fn workspace_without_customer_is_rejected() {
    let app = TestApp::spawn().await;
    let mut fixture = Fixture::new(None);
    fixture.workspace.stripe_customer_id = None;
    app.seed(|state| fixture.install(state)).await;

    let response = confirm(&app, fixture.workspace.id, BANK_METHOD).await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Workspace does not have a valid Stripe ID.");
}

#[tokio::test]
async fn unknown_workspace_is_not_found() {
    let app = TestApp::spawn().await;

    let response = confirm(&app, Uuid::new_v4(), BANK_METHOD).await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn workspace_must_match_the_caller() {
    let app = TestApp::spawn().await;
    let fixture = Fixture::new(None);
    let (first, _) = seed_two_payouts(&app, &fixture).await;

    let response = confirm_as(&app, Uuid::new_v4(), fixture.workspace.id, BANK_METHOD).await;
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(app.processor.charge_count(), 0);
    assert!(app.store.snapshot().await.invoices.is_empty());
    assert_eq!(app.payout(first.id).await.status, PayoutStatus::Pending);

    let anonymous = app
        .client
        .post(app.url("/payouts/confirm"))
        .json(&json!({ "workspace_id": fixture.workspace.id, "payment_method_id": BANK_METHOD }))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);
    assert_eq!(app.processor.charge_count(), 0);
}

#[tokio::test]
async fn failed_charge_rolls_back_invoice_and_payouts() {
    let app = TestApp::spawn().await;
    let fixture = Fixture::new(None);
    let (first, second) = seed_two_payouts(&app, &fixture).await;
    app.processor.fail_charges(true);

    let response = confirm(&app, fixture.workspace.id, BANK_METHOD).await;
    assert_eq!(response.status().as_u16(), 502);

    let state = app.store.snapshot().await;
    assert!(state.invoices.is_empty());
    for payout_id in [first.id, second.id] {
        let payout = app.payout(payout_id).await;
        assert_eq!(payout.status, PayoutStatus::Pending);
        assert_eq!(payout.invoice_id, None);
        assert_eq!(payout.user_id, None);
    }

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(app.email.send_count(), 0);
}

#[tokio::test]
async fn commit_failure_after_charge_leaves_payouts_pending() {
    let app = TestApp::spawn().await;
    let fixture = Fixture::new(None);
    let (first, second) = seed_two_payouts(&app, &fixture).await;
    app.store.fail_commits(true);

    let response = confirm(&app, fixture.workspace.id, BANK_METHOD).await;
    assert_eq!(response.status().as_u16(), 500);
    assert_eq!(app.processor.charge_count(), 1);

    app.store.fail_commits(false);
    let state = app.store.snapshot().await;
    assert!(state.invoices.is_empty());
    for payout_id in [first.id, second.id] {
        let payout = app.payout(payout_id).await;
        assert_eq!(payout.status, PayoutStatus::Pending);
        assert_eq!(payout.invoice_id, None);
    }

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(app.email.send_count(), 0);
}

#[tokio::test]
async fn empty_payment_method_fails_validation() {
    let app = TestApp::spawn().await;
    let fixture = Fixture::new(None);
    app.seed(|state| fixture.install(state)).await;

    let response = confirm(&app, fixture.workspace.id, "").await;
    assert_eq!(response.status().as_u16(), 422);
}
