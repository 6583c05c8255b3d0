//! Partner leaderboard integration tests.

mod common;

use common::{enrollment, link, partner, Fixture, TestApp, AVATAR_BASE_URL};
use payout_service::models::{EnrollmentStatus, Partner};
use payout_service::services::names::pseudonym;
use serde_json::Value;
use uuid::Uuid;

async fn get_leaderboard(app: &TestApp, program_id: Uuid) -> reqwest::Response {
    app.client
        .get(app.url(&format!("/programs/{}/leaderboard", program_id)))
        .send()
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn ranks_by_sale_amount_then_leads_then_clicks() {
    let app = TestApp::spawn().await;
    let fixture = Fixture::new(None);

    let top = partner("Top Seller", None);
    let leads = partner("More Leads", None);
    let clicks = partner("More Clicks", None);
    let quiet = partner("No Links", None);
    let program = fixture.program.clone();
    let program_id = program.id;

    let (t, l, c, q) = (top.clone(), leads.clone(), clicks.clone(), quiet.clone());
    app.seed(move |state| {
        fixture.install(state);
        for p in [&t, &l, &c, &q] {
            state.enrollments.push(enrollment(&program, p));
        }
        // Two links for the top seller are summed.
        state.links.push(link(&program, &t, (5, 1, 1, 6_000)));
        state.links.push(link(&program, &t, (5, 1, 1, 4_000)));
        state.links.push(link(&program, &l, (10, 9, 2, 5_000)));
        state.links.push(link(&program, &c, (50, 2, 2, 5_000)));
        state.links.push(link(&program, &c, (50, 1, 0, 0)));
        state.links.push(link(&program, &l, (0, 0, 0, 0)));
        state.partners.extend([t, l, c, q]);
    })
    .await;

    let response = get_leaderboard(&app, program_id).await;
    assert_eq!(response.status().as_u16(), 200);
    let rows: Vec<Value> = response.json().await.unwrap();

    let ids: Vec<String> = rows
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    let expected: Vec<String> = [&top, &leads, &clicks, &quiet]
        .iter()
        .map(|p| p.id.to_string())
        .collect();
    assert_eq!(ids, expected);

    assert_eq!(rows[0]["saleAmount"], 10_000);
    assert_eq!(rows[0]["clicks"], 10);
    assert_eq!(rows[0]["leads"], 2);
    assert_eq!(rows[0]["sales"], 2);
    assert_eq!(rows[3]["saleAmount"], 0);
    assert_eq!(rows[3]["clicks"], 0);
}

#[tokio::test]
async fn names_are_pseudonyms_and_images_are_generated() {
    let app = TestApp::spawn().await;
    let fixture = Fixture::new(None);
    let alice = partner("Alice Realname", Some("alice@example.com"));

    let program = fixture.program.clone();
    let stored = alice.clone();
    app.seed(|state| {
        fixture.install(state);
        state.enrollments.push(enrollment(&program, &stored));
        state.links.push(link(&program, &stored, (3, 2, 1, 100)));
        state.partners.push(stored);
    })
    .await;

    let response = get_leaderboard(&app, program.id).await;
    let rows: Vec<Value> = response.json().await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], pseudonym(alice.id));
    assert_eq!(
        rows[0]["image"],
        format!("{}{}", AVATAR_BASE_URL, alice.id)
    );
    let raw = serde_json::to_string(&rows).unwrap();
    assert!(!raw.contains("Alice Realname"));
    assert!(!raw.contains("alice@example.com"));
}

#[tokio::test]
async fn only_approved_partners_are_listed_and_capped_at_twenty() {
    let app = TestApp::spawn().await;
    let fixture = Fixture::new(None);
    let program = fixture.program.clone();
    let program_id = program.id;

    let approved: Vec<Partner> = (0..25).map(|i| partner(&format!("P{}", i), None)).collect();
    let banned = partner("Banned", None);
    let other_program = partner("Elsewhere", None);

    let (a, b, o) = (approved.clone(), banned.clone(), other_program.clone());
    app.seed(move |state| {
        fixture.install(state);
        for (i, p) in a.iter().enumerate() {
            state.enrollments.push(enrollment(&program, p));
            state.links.push(link(&program, p, (0, 0, 0, i as i64)));
        }
        let mut banned_enrollment = enrollment(&program, &b);
        banned_enrollment.status = EnrollmentStatus::Banned;
        state.enrollments.push(banned_enrollment);
        state.links.push(link(&program, &b, (0, 0, 0, 1_000_000)));

        let mut elsewhere = Fixture::new(None).program;
        elsewhere.workspace_id = program.workspace_id;
        state.enrollments.push(enrollment(&elsewhere, &o));
        state.links.push(link(&elsewhere, &o, (0, 0, 0, 1_000_000)));

        state.partners.extend(a);
        state.partners.extend([b, o]);
    })
    .await;

    let rows: Vec<Value> = get_leaderboard(&app, program_id).await.json().await.unwrap();

    assert_eq!(rows.len(), 20);
    assert_eq!(rows[0]["id"], approved[24].id.to_string());
    assert_eq!(rows[0]["saleAmount"], 24);
    let ids: Vec<String> = rows
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    assert!(!ids.contains(&banned.id.to_string()));
    assert!(!ids.contains(&other_program.id.to_string()));
}

#[tokio::test]
async fn negative_counters_fail_instead_of_being_coerced() {
    let app = TestApp::spawn().await;
    let fixture = Fixture::new(None);
    let program = fixture.program.clone();
    let broken = partner("Broken", None);

    app.seed(|state| {
        fixture.install(state);
        state.enrollments.push(enrollment(&program, &broken));
        state.links.push(link(&program, &broken, (-4, 0, 0, 0)));
        state.partners.push(broken.clone());
    })
    .await;

    let response = get_leaderboard(&app, program.id).await;
    assert_eq!(response.status().as_u16(), 500);
}

#[tokio::test]
async fn unknown_program_is_not_found() {
    let app = TestApp::spawn().await;

    let response = get_leaderboard(&app, Uuid::new_v4()).await;
    assert_eq!(response.status().as_u16(), 404);
}
