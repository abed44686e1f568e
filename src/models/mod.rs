pub mod dashboard;
pub mod partner;
pub mod post;

pub use dashboard::DashboardData;
pub use partner::{Invitation, InvitationStatus, Partner, UserSummary};
pub use post::{MediaType, Post, PostsResponse};
