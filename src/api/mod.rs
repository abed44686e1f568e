//! HTTP clients for the serverless functions.

pub mod client;
pub mod dashboard;
pub mod partners;
pub mod posts;
pub mod users;

pub use client::ApiClient;
pub use dashboard::DashboardClient;
pub use partners::PartnerClient;
pub use posts::HttpPostSource;
pub use users::HttpUserIdResolver;
