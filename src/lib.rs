//! Library exports for postpulse, shared between the binary and tests.

pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod models;
pub mod posts;
pub mod routes;
pub mod session;
pub mod startup;
pub mod state;
pub mod utils;
