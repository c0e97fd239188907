//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{x}^\top \Sigma \mathbf{x}
//! $$
//!
//! Rolling minimum-variance index tracking: covariance estimation, the tracking
//! optimizer, the rebalance schedule and its performance analytics.

pub mod covariance;
pub mod data;
pub mod engine;
pub mod optimizer;
pub mod performance;
pub mod scheduler;
pub mod types;

pub use covariance::sample_covariance;
pub use data::aggregate_returns;
pub use data::correlation_from_covariance;
pub use data::cumulative_returns;
pub use data::dividend_weights;
pub use data::dollar_volume_weights;
pub use data::generate_returns;
pub use data::hold_rebalance_weights;
pub use data::weighted_returns;
pub use engine::PortfolioEngine;
pub use engine::PortfolioEngineConfig;
pub use optimizer::optimal_weights;
pub use optimizer::optimal_weights_with;
pub use optimizer::ClarabelSolver;
pub use optimizer::SolverSettings;
pub use optimizer::DEFAULT_SCALE;
pub use performance::portfolio_turnover;
pub use performance::tracking_error;
pub use performance::tracking_error_with_periods;
pub use scheduler::RebalanceScheduler;
pub use types::RebalanceEvent;
pub use types::RebalanceReport;
pub use types::ReturnSeries;
pub use types::TimePanel;
pub use types::WeightPanel;
