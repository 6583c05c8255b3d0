//! Test helper module for payout-service integration tests.
//!
//! Spawns the real HTTP server on a random port, backed by the memory store,
//! the mock payment processor and the mock email provider.

#![allow(dead_code)]

use chrono::Utc;
use payout_service::config::{
    DatabaseConfig, LeaderboardConfig, NotificationConfig, PaypalConfig, PayoutConfig,
    SmtpConfig, StorageBackend, StorageConfig, StripeConfig,
};
use payout_service::models::{
    EnrollmentStatus, Link, Partner, Payout, Program, ProgramEnrollment, Workspace,
};
use payout_service::services::notifications::MockEmailProvider;
use payout_service::services::store::MemoryState;
use payout_service::services::{init_metrics, MemoryStore, MockPaymentProcessor};
use payout_service::startup::{Application, Dependencies};
use reqwest::Client;
use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use service_core::utils::signature::generate_webhook_signature;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const CUSTOMER_ID: &str = "cus_test_123";
pub const BANK_METHOD: &str = "pm_bank";
pub const CARD_METHOD: &str = "pm_card";
pub const LINK_METHOD: &str = "pm_link";
pub const SEPA_METHOD: &str = "pm_sepa";
pub const FOREIGN_METHOD: &str = "pm_foreign";
pub const WEBHOOK_ID: &str = "WH-TEST-1";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const AVATAR_BASE_URL: &str = "https://avatar.example.com/";

pub fn test_config() -> PayoutConfig {
    PayoutConfig {
        common: CoreConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        service_name: "payout-service-test".to_string(),
        log_level: "warn".to_string(),
        otlp_endpoint: None,
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            seed_path: None,
        },
        database: DatabaseConfig {
            url: Secret::new(String::new()),
            max_connections: 1,
            min_connections: 1,
        },
        stripe: StripeConfig {
            secret_key: Secret::new("sk_test".to_string()),
            api_base_url: "http://127.0.0.1:1".to_string(),
            statement_descriptor: "Partner Payouts".to_string(),
            timeout_secs: 5,
        },
        paypal: PaypalConfig {
            webhook_id: WEBHOOK_ID.to_string(),
            webhook_secret: Secret::new(WEBHOOK_SECRET.to_string()),
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 587,
            user: String::new(),
            password: Secret::new(String::new()),
            from_email: "payouts@example.com".to_string(),
            from_name: "Partner Payouts".to_string(),
            enabled: false,
        },
        notifications: NotificationConfig { queue_size: 64 },
        leaderboard: LeaderboardConfig {
            avatar_base_url: AVATAR_BASE_URL.to_string(),
        },
    }
}

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub store: MemoryStore,
    pub processor: Arc<MockPaymentProcessor>,
    pub email: Arc<MockEmailProvider>,
    shutdown_token: CancellationToken,
}

impl TestApp {
    /// Spawn a new test application on a random port.
    pub async fn spawn() -> Self {
        init_metrics();

        let store = MemoryStore::new();
        let processor = Arc::new(
            MockPaymentProcessor::new()
                .with_method(BANK_METHOD, "us_bank_account", Some(CUSTOMER_ID))
                .with_method(CARD_METHOD, "card", Some(CUSTOMER_ID))
                .with_method(LINK_METHOD, "link", Some(CUSTOMER_ID))
                .with_method(SEPA_METHOD, "sepa_debit", Some(CUSTOMER_ID))
                .with_method(FOREIGN_METHOD, "card", Some("cus_someone_else")),
        );
        let email = Arc::new(MockEmailProvider::new());

        let app = Application::build_with(
            test_config(),
            Dependencies {
                store: Arc::new(store.clone()),
                processor: processor.clone(),
                email: email.clone(),
            },
        )
        .await
        .expect("Failed to build test application");

        let address = format!("http://127.0.0.1:{}", app.port());
        let shutdown_token = app.shutdown_token();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = Client::new();
        for _ in 0..50 {
            if client
                .get(format!("{}/health", address))
                .send()
                .await
                .is_ok()
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            client,
            store,
            processor,
            email,
            shutdown_token,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn seed<F>(&self, f: F)
    where
        F: FnOnce(&mut MemoryState),
    {
        self.store.update(f).await;
    }

    pub async fn payout(&self, payout_id: Uuid) -> Payout {
        self.store
            .snapshot()
            .await
            .payouts
            .into_iter()
            .find(|p| p.id == payout_id)
            .expect("payout not found")
    }

    /// Poll the mock email provider until `count` messages were sent.
    pub async fn wait_for_emails(&self, count: usize) {
        for _ in 0..100 {
            if self.email.send_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// POST a PayPal webhook with valid transmission headers.
    pub async fn post_signed_webhook(&self, body: &str) -> reqwest::Response {
        let transmission_id = Uuid::new_v4().to_string();
        let transmission_time = Utc::now().to_rfc3339();
        let signature = generate_webhook_signature(
            WEBHOOK_SECRET,
            &transmission_id,
            &transmission_time,
            WEBHOOK_ID,
            body.as_bytes(),
        )
        .expect("Failed to sign webhook");

        self.client
            .post(self.url("/webhooks/paypal"))
            .header("paypal-transmission-id", transmission_id)
            .header("paypal-transmission-time", transmission_time)
            .header("paypal-transmission-sig", signature)
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

/// A workspace with one program, as most tests need.
pub struct Fixture {
    pub workspace: Workspace,
    pub program: Program,
}

impl Fixture {
    pub fn new(plan: Option<&str>) -> Self {
        let workspace = Workspace {
            id: Uuid::new_v4(),
            name: "Acme Inc".to_string(),
            plan: plan.map(str::to_string),
            stripe_customer_id: Some(CUSTOMER_ID.to_string()),
            invoice_prefix: "ACME".to_string(),
        };
        let program = Program {
            id: Uuid::new_v4(),
            workspace_id: workspace.id,
            name: "Acme Partners".to_string(),
            logo: None,
            min_payout_amount: 0,
            default_reward_id: None,
            created_at: Utc::now(),
        };
        Self { workspace, program }
    }

    pub fn install(&self, state: &mut MemoryState) {
        state.workspaces.push(self.workspace.clone());
        state.programs.push(self.program.clone());
    }
}

pub fn partner(name: &str, email: Option<&str>) -> Partner {
    Partner {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.map(str::to_string),
        image: None,
        payouts_enabled_at: Some(Utc::now()),
    }
}

pub fn enrollment(program: &Program, partner: &Partner) -> ProgramEnrollment {
    ProgramEnrollment {
        program_id: program.id,
        partner_id: partner.id,
        status: EnrollmentStatus::Approved,
    }
}

pub fn link(program: &Program, partner: &Partner, counters: (i64, i64, i64, i64)) -> Link {
    let (clicks, leads, sales, sale_amount) = counters;
    Link {
        id: Uuid::new_v4(),
        program_id: program.id,
        partner_id: partner.id,
        clicks,
        leads,
        sales,
        sale_amount,
    }
}

pub fn webhook_body(event_type: &str, invoice_id: Uuid, payout_id: Uuid) -> String {
    serde_json::json!({
        "id": "WH-EVENT-1",
        "event_type": event_type,
        "resource": {
            "sender_batch_id": invoice_id.to_string(),
            "payout_item_id": "PAYPAL-ITEM-42",
            "payout_item_fee": { "currency": "USD", "value": "0.25" },
            "payout_item": {
                "receiver": "partner@example.com",
                "sender_item_id": payout_id.to_string()
            }
        }
    })
    .to_string()
}
