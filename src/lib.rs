//! SushiDash Library
//!
//! Data service behind the SushiSwap analytics dashboard

pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod scheduler;
pub mod series;
pub mod sources;
pub mod store;
pub mod subgraph;
pub mod types;
pub mod view;

#[cfg(feature = "dashboard")]
pub mod dashboard;

pub use error::{AnalyticsError, FetchError};
