use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::{MessagePayload, SearchScope, UserId};

/// Request to enter the matchmaking queue
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(range(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: UserId,
    #[serde(default = "default_scope")]
    pub scope: SearchScope,
}

fn default_scope() -> SearchScope {
    SearchScope::Global
}

/// Request naming only the acting user (cancel, stop)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UserActionRequest {
    #[validate(range(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: UserId,
}

/// Inbound message to relay to the session partner
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RelayRequest {
    #[validate(range(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: UserId,
    /// Platform display name, used when the sender is not anonymous.
    #[serde(alias = "displayName", rename = "displayName", default)]
    pub display_name: Option<String>,
    pub payload: MessagePayload,
}

/// Like/dislike judgment about an ex-partner
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RateRequest {
    #[validate(range(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: UserId,
    #[validate(range(min = 1))]
    #[serde(alias = "targetId", rename = "targetId")]
    pub target_id: UserId,
    pub positive: bool,
}

/// Request to add a user to the caller's blacklist
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BlacklistRequest {
    #[validate(range(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: UserId,
    #[validate(range(min = 1))]
    #[serde(alias = "targetId", rename = "targetId")]
    pub target_id: UserId,
}

/// Administrative broadcast to a recipient list
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BroadcastRequest {
    #[validate(length(min = 1))]
    pub text: String,
    #[validate(length(min = 1))]
    pub recipients: Vec<UserId>,
}

/// Manual ban with a reason
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BanRequest {
    #[validate(length(min = 1))]
    pub reason: String,
}
