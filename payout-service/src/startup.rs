//! Application startup and lifecycle management.

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::{PayoutConfig, StorageBackend};
use crate::handlers;
use crate::services::notifications::{EmailProvider, SmtpProvider};
use crate::services::{
    init_metrics, LeaderboardService, MemoryStore, NotificationQueue, NotificationWorker,
    PaymentProcessor, PaypalWebhookService, PayoutService, PgStore, RewardService, Store,
    StripeClient,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PayoutConfig>,
    pub store: Arc<dyn Store>,
    pub payouts: PayoutService,
    pub webhooks: PaypalWebhookService,
    pub leaderboard: LeaderboardService,
    pub rewards: RewardService,
}

/// External collaborators of the service. Tests substitute in-memory ones.
pub struct Dependencies {
    pub store: Arc<dyn Store>,
    pub processor: Arc<dyn PaymentProcessor>,
    pub email: Arc<dyn EmailProvider>,
}

impl Dependencies {
    pub async fn from_config(config: &PayoutConfig) -> Result<Self, AppError> {
        let store: Arc<dyn Store> = match config.storage.backend {
            StorageBackend::Postgres => {
                let store = PgStore::connect(
                    config.database.url.expose_secret(),
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    e
                })?;

                store.run_migrations().await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to run migrations");
                    e
                })?;
                Arc::new(store)
            }
            StorageBackend::Memory => {
                let store = match config.storage.seed_path.as_deref() {
                    Some(path) => MemoryStore::from_seed_file(path).await?,
                    None => MemoryStore::new(),
                };
                tracing::warn!("Using in-memory store - data is lost on restart");
                Arc::new(store)
            }
        };

        let stripe = StripeClient::new(config.stripe.clone())
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;
        if stripe.is_configured() {
            tracing::info!("Stripe client initialized");
        } else {
            tracing::warn!("Stripe credentials not configured - payout confirmation will fail");
        }

        let email = SmtpProvider::new(config.smtp.clone())
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;
        if !email.is_enabled() {
            tracing::warn!("SMTP disabled - partner emails will only be logged");
        }

        Ok(Self {
            store,
            processor: Arc::new(stripe),
            email: Arc::new(email),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route("/payouts/confirm", post(handlers::payouts::confirm_payouts))
        .route("/webhooks/paypal", post(handlers::paypal::webhook))
        .route(
            "/programs/:program_id/leaderboard",
            get(handlers::leaderboard::get_leaderboard),
        )
        .route(
            "/programs/:program_id/payouts",
            get(handlers::payouts::list_payouts),
        )
        .route(
            "/programs/:program_id/payouts/count",
            get(handlers::payouts::count_payouts),
        )
        .route(
            "/programs/:program_id/payouts/:payout_id/mark-paid",
            post(handlers::payouts::mark_payout_paid),
        )
        .route(
            "/programs/:program_id/rewards",
            get(handlers::rewards::list_rewards).post(handlers::rewards::create_reward),
        )
        .route(
            "/programs/:program_id/rewards/:reward_id",
            patch(handlers::rewards::update_reward).delete(handlers::rewards::delete_reward),
        )
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    workspace_id = tracing::field::Empty,
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    worker: JoinHandle<()>,
    shutdown_token: CancellationToken,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: PayoutConfig) -> Result<Self, AppError> {
        init_metrics();
        let deps = Dependencies::from_config(&config).await?;
        Self::build_with(config, deps).await
    }

    /// Build the application around the given collaborators.
    pub async fn build_with(config: PayoutConfig, deps: Dependencies) -> Result<Self, AppError> {
        let shutdown_token = CancellationToken::new();

        let (notifications, rx) = NotificationQueue::new(config.notifications.queue_size);
        let worker = NotificationWorker::new(rx, deps.email, shutdown_token.clone()).start();

        let state = AppState {
            payouts: PayoutService::new(
                deps.store.clone(),
                deps.processor,
                notifications.clone(),
                config.stripe.statement_descriptor.clone(),
            ),
            webhooks: PaypalWebhookService::new(
                deps.store.clone(),
                notifications,
                config.paypal.webhook_id.clone(),
                config.paypal.webhook_secret.clone(),
            ),
            leaderboard: LeaderboardService::new(
                deps.store.clone(),
                config.leaderboard.avatar_base_url.clone(),
            ),
            rewards: RewardService::new(deps.store.clone()),
            store: deps.store,
            config: Arc::new(config.clone()),
        };

        let addr: SocketAddr = config.common.bind_address().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Invalid bind address: {}", e))
        })?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Payout service listener bound");

        Ok(Self {
            port,
            listener,
            router: router(state),
            worker,
            shutdown_token,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Cancelling this token stops the server and the notification worker.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Run the application until the shutdown token is cancelled.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!(
            service = "payout-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        let token = self.shutdown_token.clone();
        let result = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await;

        self.shutdown_token.cancel();
        if let Err(e) = self.worker.await {
            tracing::error!(error = %e, "Notification worker panicked");
        }

        result
    }
}
