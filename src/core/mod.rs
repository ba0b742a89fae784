//! Request plumbing, domain models and analysis.

pub mod analysis;
pub mod clock;
pub mod http;
pub mod logging;
pub mod models;
pub mod retry;
pub mod token;
pub mod usage;

pub use analysis::{
    InvestmentScore, OrderSummary, PortfolioMetrics, PropertyAnalysis, analyze_property,
    order_summary, portfolio_metrics,
};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock, system_clock};
pub use http::{ApiClient, ApiRequest, Authenticator, CallOutcome, build_client};
pub use models::{
    AddressQuery, ErrorReport, Order, PropertyDetails, PropertyRecord, RobotOutput, UsageAction,
    UsageOutcome, UsageRecord,
};
pub use retry::RetryPolicy;
pub use token::{AuthToken, TokenManager, UserSession};
pub use usage::{UsageRecorder, UsageSummary};
