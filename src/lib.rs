pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod types;

pub mod fetch;
pub mod identity;
pub mod join;
pub mod metrics;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod rank;
pub mod resolve;

// Ports and their adapters
pub mod app;
pub mod infra;
