//! The post browser: cached fetches, filtering and pagination.

pub mod filters;
pub mod paginate;
pub mod pipeline;

pub use filters::{apply_filters, Filters, MediaTypeFilter, SortOrder, TimeWindow};
pub use paginate::{paginate, Pagination, PostPage};
pub use pipeline::{CacheMeta, CachedPostSet, LoadState, PostLoad, PostPipeline, PostScope, PostSource};
