use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform-assigned numeric user identifier.
pub type UserId = i64;

/// User profile with reputation counters, owned by the profile store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub nickname: String,
    pub district: String,
    #[serde(default = "default_true")]
    pub anonymous: bool,
    #[serde(default)]
    pub banned: bool,
    #[serde(rename = "banReason", default)]
    pub ban_reason: Option<String>,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub dislikes: i64,
    #[serde(default = "default_rating")]
    pub rating: f64,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Rating derived from the counters: likes / (likes + dislikes) * 100,
    /// or the neutral default while no judgments exist.
    pub fn computed_rating(likes: i64, dislikes: i64) -> f64 {
        let total = likes + dislikes;
        if total > 0 {
            likes as f64 * 100.0 / total as f64
        } else {
            default_rating()
        }
    }
}

fn default_true() -> bool {
    true
}

pub(crate) fn default_rating() -> f64 {
    50.0
}

/// Matchmaking breadth requested by a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    /// Any eligible partner, regardless of district.
    Global,
    /// Only partners whose profile district equals the requester's.
    District,
}

/// A user waiting for a partner
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub user_id: UserId,
    pub scope: SearchScope,
    pub enqueued_at: DateTime<Utc>,
}

/// District classification of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "district", rename_all = "lowercase")]
pub enum DistrictRelation {
    /// Both participants share the named district.
    Same(String),
    /// Participants come from different districts.
    Cross,
}

impl DistrictRelation {
    pub fn of(district_a: &str, district_b: &str) -> Self {
        if district_a == district_b {
            DistrictRelation::Same(district_a.to_string())
        } else {
            DistrictRelation::Cross
        }
    }

    /// Label persisted with the chat record.
    pub fn label(&self) -> &str {
        match self {
            DistrictRelation::Same(district) => district,
            DistrictRelation::Cross => "cross-district",
        }
    }
}

/// An active two-party pairing
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    #[serde(rename = "userA")]
    pub user_a: UserId,
    #[serde(rename = "userB")]
    pub user_b: UserId,
    pub district: DistrictRelation,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn partner_of(&self, user_id: UserId) -> Option<UserId> {
        if user_id == self.user_a {
            Some(self.user_b)
        } else if user_id == self.user_b {
            Some(self.user_a)
        } else {
            None
        }
    }
}

/// Where a user sits in the matchmaking state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserState {
    Idle,
    Queued,
    Paired,
}

/// Relayed message content, one variant per supported media kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePayload {
    Text { text: String },
    Sticker { file_id: String },
    Photo { file_id: String, caption: Option<String> },
    Video { file_id: String, caption: Option<String> },
    Voice { file_id: String },
    Animation { file_id: String, caption: Option<String> },
    VideoNote { file_id: String },
    Audio { file_id: String, caption: Option<String> },
    Document { file_id: String, caption: Option<String> },
}

impl MessagePayload {
    /// Kind tag persisted with the transcript entry.
    pub fn kind(&self) -> &'static str {
        match self {
            MessagePayload::Text { .. } => "text",
            MessagePayload::Sticker { .. } => "sticker",
            MessagePayload::Photo { .. } => "photo",
            MessagePayload::Video { .. } => "video",
            MessagePayload::Voice { .. } => "voice",
            MessagePayload::Animation { .. } => "animation",
            MessagePayload::VideoNote { .. } => "video_note",
            MessagePayload::Audio { .. } => "audio",
            MessagePayload::Document { .. } => "document",
        }
    }

    /// Message text or caption, when the kind carries one.
    pub fn text(&self) -> Option<&str> {
        match self {
            MessagePayload::Text { text } => Some(text),
            MessagePayload::Photo { caption, .. }
            | MessagePayload::Video { caption, .. }
            | MessagePayload::Animation { caption, .. }
            | MessagePayload::Audio { caption, .. }
            | MessagePayload::Document { caption, .. } => caption.as_deref(),
            _ => None,
        }
    }

    /// Media reference, for every kind except plain text.
    pub fn media_ref(&self) -> Option<&str> {
        match self {
            MessagePayload::Text { .. } => None,
            MessagePayload::Sticker { file_id }
            | MessagePayload::Voice { file_id }
            | MessagePayload::VideoNote { file_id }
            | MessagePayload::Photo { file_id, .. }
            | MessagePayload::Video { file_id, .. }
            | MessagePayload::Animation { file_id, .. }
            | MessagePayload::Audio { file_id, .. }
            | MessagePayload::Document { file_id, .. } => Some(file_id),
        }
    }
}

/// What the partner receives: the sender's display identity plus the payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayedMessage {
    #[serde(rename = "fromDisplay")]
    pub from_display: String,
    #[serde(flatten)]
    pub payload: MessagePayload,
}

/// Result of applying a rating event to a user
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RatingSnapshot {
    pub likes: i64,
    pub dislikes: i64,
    pub rating: f64,
    pub banned: bool,
}

/// Interactive control attached to an outbound notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub label: String,
    pub action: String,
}

impl Control {
    pub fn new(label: &str, action: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            action: action.into(),
        }
    }
}
