use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::domain::{RatingSnapshot, UserId, UserState};

/// Outcome of a search request: paired immediately, or queued with a position
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SearchResponse {
    Paired {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "partnerNickname")]
        partner_nickname: String,
        #[serde(rename = "districtLabel")]
        district_label: String,
    },
    Queued {
        /// 1-indexed position in the waiting queue.
        position: usize,
    },
}

/// Outcome of a stop/cancel action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub state: UserState,
}

/// Outcome of a rating event
#[derive(Debug, Clone, Serialize)]
pub struct RateResponse {
    #[serde(rename = "targetId")]
    pub target_id: UserId,
    #[serde(flatten)]
    pub snapshot: RatingSnapshot,
}

/// Broadcast fan-out tally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastResponse {
    pub sent: usize,
    pub failed: usize,
    #[serde(rename = "skippedBanned")]
    pub skipped_banned: usize,
}

/// Live engine statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub online: usize,
    pub queued: usize,
    #[serde(rename = "activeSessions")]
    pub active_sessions: usize,
    #[serde(rename = "onlineByDistrict")]
    pub online_by_district: HashMap<String, usize>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
