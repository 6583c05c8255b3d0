pub mod leaderboard;
pub mod metrics;
pub mod names;
pub mod notifications;
pub mod payouts;
pub mod processor;
pub mod rewards;
pub mod store;
pub mod webhook;

pub use leaderboard::LeaderboardService;
pub use metrics::{get_metrics, init_metrics};
pub use notifications::{NotificationQueue, NotificationWorker};
pub use payouts::{ConfirmPayouts, PayoutService};
pub use processor::{MockPaymentProcessor, PaymentProcessor, StripeClient};
pub use rewards::RewardService;
pub use store::{MemoryStore, PgStore, Store};
pub use webhook::{PaypalWebhookService, Transmission, WebhookError, WebhookOutcome};
