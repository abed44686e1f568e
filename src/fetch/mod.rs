//! Keyed TTL caches with background refresh, shared by the data clients.

pub mod query_cache;
pub mod timer;

pub use query_cache::{FetchFn, Fetched, QueryCache};
pub use timer::RefreshTimer;
