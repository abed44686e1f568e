//! Screen selection from the authentication flags.

use serde::Serialize;

use super::store::{ResolutionStatus, Session};

/// Next step offered inside the two-step sign-in.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthStep {
    ConnectDma,
}

/// What the shell knows about the user id.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UserIdStatus {
    Pending,
    Resolved { user_id: String },
    NeedsReconnect { message: String },
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    Landing,
    AuthFlow { step: AuthStep },
    Shell { user: UserIdStatus },
}

/// Picks the screen. Only the two authentication flags decide which one;
/// the resolution status just annotates the shell.
pub fn route(session: &Session) -> Screen {
    if session.is_fully_authenticated() {
        Screen::Shell {
            user: user_id_status(session),
        }
    } else if session.is_basic_authenticated() {
        Screen::AuthFlow {
            step: AuthStep::ConnectDma,
        }
    } else {
        Screen::Landing
    }
}

fn user_id_status(session: &Session) -> UserIdStatus {
    if let Some(user_id) = session.user_id() {
        return UserIdStatus::Resolved {
            user_id: user_id.to_string(),
        };
    }
    match session.resolution() {
        ResolutionStatus::NeedsReconnect { last_error, .. } => UserIdStatus::NeedsReconnect {
            message: last_error.clone(),
        },
        _ => UserIdStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::{TokenStore, TokenUpdate};
    use serde_json::json;

    fn store_with(access: Option<&str>, dma: Option<&str>) -> TokenStore {
        let store = TokenStore::new();
        store.set_tokens(TokenUpdate {
            access_token: access.map(str::to_string),
            dma_token: dma.map(str::to_string),
        });
        store
    }

    #[test]
    fn screens_follow_the_flags() {
        assert_eq!(route(&store_with(None, None).snapshot()), Screen::Landing);
        assert_eq!(
            route(&store_with(Some("a"), None).snapshot()),
            Screen::AuthFlow {
                step: AuthStep::ConnectDma
            }
        );
        assert_eq!(
            route(&store_with(Some("a"), Some("d")).snapshot()),
            Screen::Shell {
                user: UserIdStatus::Pending
            }
        );
        // DMA arriving first still lands in the shell.
        assert!(matches!(
            route(&store_with(None, Some("d")).snapshot()),
            Screen::Shell { .. }
        ));
    }

    #[test]
    fn shell_reports_resolution() {
        let store = store_with(Some("a"), Some("d"));
        store.set_user_id("d", "u1");
        assert_eq!(
            route(&store.snapshot()),
            Screen::Shell {
                user: UserIdStatus::Resolved {
                    user_id: "u1".into()
                }
            }
        );

        let store = store_with(None, Some("d"));
        let epoch = store.snapshot().epoch();
        store.set_resolution(
            epoch,
            ResolutionStatus::NeedsReconnect {
                attempts: 3,
                last_error: "boom".into(),
            },
        );
        assert_eq!(
            route(&store.snapshot()),
            Screen::Shell {
                user: UserIdStatus::NeedsReconnect {
                    message: "boom".into()
                }
            }
        );
    }

    #[test]
    fn serializes_with_screen_tag() {
        let v = serde_json::to_value(route(&store_with(Some("a"), None).snapshot())).unwrap();
        assert_eq!(v, json!({"screen": "auth_flow", "step": "connect_dma"}));
    }
}
