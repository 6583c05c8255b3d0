//! Domain models for payout-service.

mod commission;
pub mod fees;
mod invoice;
mod leaderboard;
mod payout;
mod program;
mod reward;

pub use commission::{Commission, CommissionStatus};
pub use fees::{MethodCategory, PaymentMethodType, PlanTier};
pub use invoice::{CreateInvoice, Invoice};
pub use leaderboard::LeaderboardRow;
pub use payout::{
    EligiblePayout, Payout, PayoutFilter, PayoutSortBy, PayoutStatus, PayoutUpdate,
    PayoutWithPartner, SortOrder,
};
pub use program::{
    EnrollmentStatus, Link, Partner, PartnerSummary, Program, ProgramEnrollment, ProgramSummary,
    Workspace,
};
pub use reward::{CreateReward, Reward, RewardEvent, RewardType, UpdateReward};
