//! Browser session: tokens, the OAuth callback, user id resolution and
//! screen gating.

pub mod callback;
pub mod gate;
pub mod resolver;
pub mod store;

pub use callback::{scrub_url, CallbackOutcome, CallbackParams, CallbackProcessor};
pub use gate::{route, Screen};
pub use resolver::{ResolveUserId, ResolverPolicy, UserIdResolver};
pub use store::{AuthState, ResolutionStatus, Session, TokenStore, TokenUpdate};
