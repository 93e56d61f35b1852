//! Mean-reversion trade recommendations
//!
//! Scores intraday timeframes for a short-horizon mean-reversion entry,
//! backtests the rule with a no-lookahead simulator, grid-searches its entry
//! and stop parameters, and composes a ranked recommendation with a priced
//! trade plan.

pub mod alerts;
pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod optimizer;
pub mod recommend;
pub mod resample;
pub mod scoring;
pub mod signal;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{RecoError, Result};
pub use recommend::{RecommendResponse, Recommender};
pub use types::*;
