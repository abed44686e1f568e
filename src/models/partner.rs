use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::value::{opt_string, string_or_default, timestamp};

/// Another user as returned by search and partner listings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub headline: Option<String>,
    pub avatar_url: Option<String>,
}

impl UserSummary {
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(UserSummary {
            id: opt_string(value, &["id", "userId", "user_id"])?,
            name: string_or_default(value, &["name", "fullName", "full_name"]),
            headline: opt_string(value, &["headline"]),
            avatar_url: opt_string(value, &["avatarUrl", "avatar_url"]),
        })
    }
}

/// An established synergy partnership.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Partner {
    pub user: UserSummary,
    pub since: Option<DateTime<Utc>>,
}

impl Partner {
    /// Partner rows carry the other user either nested under `partner` or flat.
    pub fn from_value(value: &Value) -> Option<Self> {
        let user_value = value.get("partner").filter(|v| v.is_object()).unwrap_or(value);
        Some(Partner {
            user: UserSummary::from_value(user_value)?,
            since: timestamp(value, &["since", "createdAt", "created_at"]),
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

impl InvitationStatus {
    fn from_remote(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "accepted" => InvitationStatus::Accepted,
            "declined" | "rejected" => InvitationStatus::Declined,
            _ => InvitationStatus::Pending,
        }
    }
}

/// A partnership invitation, sent or received by the current user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub status: InvitationStatus,
    pub message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Invitation {
            id: opt_string(value, &["id", "invitationId"])?,
            from_user_id: string_or_default(value, &["fromUserId", "from_user_id", "inviter_id"]),
            to_user_id: string_or_default(value, &["toUserId", "to_user_id", "invitee_id"]),
            status: InvitationStatus::from_remote(&string_or_default(value, &["status"])),
            message: opt_string(value, &["message"]),
            created_at: timestamp(value, &["createdAt", "created_at"]),
        })
    }

    /// Received by `user_id` and still awaiting an answer.
    pub fn is_pending_for(&self, user_id: &str) -> bool {
        self.status == InvitationStatus::Pending && self.to_user_id == user_id
    }
}
