use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::models::{UserId, UserProfile};
use crate::services::store::{ProfileStore, StoreError};

/// Persisted chat record
#[derive(Debug, Clone)]
pub struct ChatRecord {
    pub session_id: String,
    pub user1_id: UserId,
    pub user2_id: UserId,
    pub user1_nick: String,
    pub user2_nick: String,
    pub district: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub message_count: u64,
}

/// Persisted transcript entry
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub session_id: String,
    pub from_user: UserId,
    pub to_user: UserId,
    pub from_display: String,
    pub to_display: String,
    pub text: Option<String>,
    pub kind: String,
    pub media_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    profiles: HashMap<UserId, UserProfile>,
    blacklist: HashSet<(UserId, UserId)>,
    chats: HashMap<String, ChatRecord>,
    messages: Vec<MessageRecord>,
}

/// In-memory profile store
///
/// Backs single-process deployments that run without a database, and doubles
/// as the store used by the test suite. Semantics mirror the PostgreSQL
/// implementation, including upsert-style rating/ban writes.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a profile. Registration itself happens outside the core.
    pub fn insert_profile(&self, profile: UserProfile) {
        let mut inner = self.inner.write().unwrap();
        inner.profiles.insert(profile.user_id, profile);
    }

    pub fn chat(&self, session_id: &str) -> Option<ChatRecord> {
        self.inner.read().unwrap().chats.get(session_id).cloned()
    }

    pub fn messages(&self, session_id: &str) -> Vec<MessageRecord> {
        self.inner
            .read()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.inner.read().unwrap().profiles.get(&user_id).cloned())
    }

    async fn is_banned(&self, user_id: UserId) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .profiles
            .get(&user_id)
            .map(|p| p.banned)
            .unwrap_or(false))
    }

    async fn set_ban(&self, user_id: UserId, reason: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let profile = inner
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;
        profile.banned = true;
        profile.ban_reason = Some(reason.to_string());
        Ok(())
    }

    async fn clear_ban(&self, user_id: UserId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let profile = inner
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;
        profile.banned = false;
        profile.ban_reason = None;
        Ok(())
    }

    async fn update_rating_counters(
        &self,
        user_id: UserId,
        likes: i64,
        dislikes: i64,
        rating: f64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let profile = inner
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;
        profile.likes = likes;
        profile.dislikes = dislikes;
        profile.rating = rating;
        Ok(())
    }

    async fn record_chat_start(
        &self,
        session_id: &str,
        user_a: UserId,
        user_b: UserId,
        nick_a: &str,
        nick_b: &str,
        district_label: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.chats.insert(
            session_id.to_string(),
            ChatRecord {
                session_id: session_id.to_string(),
                user1_id: user_a,
                user2_id: user_b,
                user1_nick: nick_a.to_string(),
                user2_nick: nick_b.to_string(),
                district: district_label.to_string(),
                start_time: Utc::now(),
                end_time: None,
                message_count: 0,
            },
        );
        Ok(())
    }

    async fn record_chat_end(&self, session_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if let Some(chat) = inner.chats.get_mut(session_id) {
            if chat.end_time.is_none() {
                chat.end_time = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn record_message(
        &self,
        session_id: &str,
        from_user: UserId,
        to_user: UserId,
        from_display: &str,
        to_display: &str,
        text: Option<&str>,
        kind: &str,
        media_ref: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.messages.push(MessageRecord {
            session_id: session_id.to_string(),
            from_user,
            to_user,
            from_display: from_display.to_string(),
            to_display: to_display.to_string(),
            text: text.map(str::to_string),
            kind: kind.to_string(),
            media_ref: media_ref.map(str::to_string),
            created_at: Utc::now(),
        });
        if let Some(chat) = inner.chats.get_mut(session_id) {
            chat.message_count += 1;
        }
        Ok(())
    }

    async fn is_blocked(&self, blocker: UserId, blocked: UserId) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .blacklist
            .contains(&(blocker, blocked)))
    }

    async fn add_block(&self, blocker: UserId, blocked: UserId) -> Result<(), StoreError> {
        self.inner.write().unwrap().blacklist.insert((blocker, blocked));
        Ok(())
    }

    async fn remove_block(&self, blocker: UserId, blocked: UserId) -> Result<(), StoreError> {
        self.inner.write().unwrap().blacklist.remove(&(blocker, blocked));
        Ok(())
    }
}
