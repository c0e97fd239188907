//! # smart-beta-rs
//!
//! $$
//! \mathbf{x}^\*_t=\arg\min_{\mathbf{x}\in\Delta}\ \mathbf{x}^\top\Sigma_t\mathbf{x}+\lambda\lVert\mathbf{x}-\mathbf{w}^{idx}_t\rVert_2
//! $$
//!
//! Periodically rebalanced long-only portfolios that trade portfolio variance off
//! against tracking distance to a benchmark weighting, together with the turnover
//! and tracking-error analytics of the resulting weight sequence.
//!
//! The pipeline is a chain of pure components:
//!
//! - [`portfolio::covariance`] estimates a sample covariance over a rolling window.
//! - [`portfolio::optimizer`] solves the tracking QP through a pluggable [`traits::TrackingSolver`].
//! - [`portfolio::scheduler`] walks the history and produces [`portfolio::RebalanceEvent`]s.
//! - [`portfolio::performance`] turns weights and returns into scalar metrics.
//!
//! [`portfolio::PortfolioEngine`] wires them together behind a single configuration.

pub mod error;
pub mod portfolio;
pub mod traits;

pub use error::PortfolioError;
pub use error::PortfolioResult;

/// Trading days used to annualise daily statistics.
pub const TRADING_DAYS_PER_YEAR: usize = 252;
