use async_trait::async_trait;
use moka::future::Cache;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use thiserror::Error;

use crate::models::{UserId, UserProfile};

/// Errors that can occur when interacting with the profile store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Durable user/session records consumed by the core.
///
/// The core references users by id only; profile creation and edits happen
/// outside this service. Everything here is keyed by user or session id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Backend connectivity probe. Stores without a backend are always
    /// healthy.
    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError>;

    async fn is_banned(&self, user_id: UserId) -> Result<bool, StoreError>;

    async fn set_ban(&self, user_id: UserId, reason: &str) -> Result<(), StoreError>;

    async fn clear_ban(&self, user_id: UserId) -> Result<(), StoreError>;

    async fn update_rating_counters(
        &self,
        user_id: UserId,
        likes: i64,
        dislikes: i64,
        rating: f64,
    ) -> Result<(), StoreError>;

    async fn record_chat_start(
        &self,
        session_id: &str,
        user_a: UserId,
        user_b: UserId,
        nick_a: &str,
        nick_b: &str,
        district_label: &str,
    ) -> Result<(), StoreError>;

    async fn record_chat_end(&self, session_id: &str) -> Result<(), StoreError>;

    #[allow(clippy::too_many_arguments)]
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
    ) -> Result<(), StoreError>;

    async fn is_blocked(&self, blocker: UserId, blocked: UserId) -> Result<bool, StoreError>;

    async fn add_block(&self, blocker: UserId, blocked: UserId) -> Result<(), StoreError>;

    async fn remove_block(&self, blocker: UserId, blocked: UserId) -> Result<(), StoreError>;
}

/// PostgreSQL-backed profile store
///
/// Profile reads are fronted by an in-process moka cache; every write that
/// can change a profile (rating counters, ban flag) invalidates the entry.
pub struct PostgresStore {
    pool: PgPool,
    profiles: Cache<UserId, UserProfile>,
}

impl PostgresStore {
    /// Connect, run migrations, and build the profile cache.
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        cache_size: u64,
        cache_ttl_secs: u64,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let profiles = Cache::builder()
            .max_capacity(cache_size)
            .time_to_live(Duration::from_secs(cache_ttl_secs))
            .build();

        Ok(Self { pool, profiles })
    }

    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT u.user_id, u.nickname, u.district, u.anonymous, u.created_at,
                   COALESCE(r.likes, 0) AS likes,
                   COALESCE(r.dislikes, 0) AS dislikes,
                   COALESCE(r.rating, 50.0) AS rating,
                   COALESCE(r.banned, FALSE) AS banned,
                   r.ban_reason
            FROM users u
            LEFT JOIN ratings r ON u.user_id = r.user_id
            WHERE u.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| UserProfile {
            user_id: row.get("user_id"),
            nickname: row.get("nickname"),
            district: row.get("district"),
            anonymous: row.get("anonymous"),
            banned: row.get("banned"),
            ban_reason: row.get("ban_reason"),
            likes: row.get("likes"),
            dislikes: row.get("dislikes"),
            rating: row.get("rating"),
            created_at: row.get("created_at"),
        }))
    }

}

#[async_trait]
impl ProfileStore for PostgresStore {
    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }

    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
        if let Some(profile) = self.profiles.get(&user_id).await {
            tracing::trace!("profile cache hit: {}", user_id);
            return Ok(Some(profile));
        }

        let profile = self.fetch_profile(user_id).await?;
        if let Some(profile) = &profile {
            self.profiles.insert(user_id, profile.clone()).await;
        }
        Ok(profile)
    }

    async fn is_banned(&self, user_id: UserId) -> Result<bool, StoreError> {
        Ok(self
            .get_profile(user_id)
            .await?
            .map(|p| p.banned)
            .unwrap_or(false))
    }

    async fn set_ban(&self, user_id: UserId, reason: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ratings (user_id, banned, ban_date, ban_reason)
            VALUES ($1, TRUE, NOW(), $2)
            ON CONFLICT (user_id)
            DO UPDATE SET banned = TRUE, ban_date = NOW(), ban_reason = EXCLUDED.ban_reason
            "#,
        )
        .bind(user_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        self.profiles.invalidate(&user_id).await;
        tracing::info!("banned user {}: {}", user_id, reason);
        Ok(())
    }

    async fn clear_ban(&self, user_id: UserId) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE ratings SET banned = FALSE, ban_date = NULL, ban_reason = NULL WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        self.profiles.invalidate(&user_id).await;
        tracing::info!("unbanned user {}", user_id);
        Ok(())
    }

    async fn update_rating_counters(
        &self,
        user_id: UserId,
        likes: i64,
        dislikes: i64,
        rating: f64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ratings (user_id, likes, dislikes, rating)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id)
            DO UPDATE SET likes = EXCLUDED.likes,
                          dislikes = EXCLUDED.dislikes,
                          rating = EXCLUDED.rating
            "#,
        )
        .bind(user_id)
        .bind(likes)
        .bind(dislikes)
        .bind(rating)
        .execute(&self.pool)
        .await?;

        self.profiles.invalidate(&user_id).await;
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
        sqlx::query(
            r#"
            INSERT INTO chats (session_id, user1_id, user2_id, user1_nick, user2_nick, district)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(session_id)
        .bind(user_a)
        .bind(user_b)
        .bind(nick_a)
        .bind(nick_b)
        .bind(district_label)
        .execute(&self.pool)
        .await?;

        tracing::debug!("chat {} started: {} <-> {}", session_id, user_a, user_b);
        Ok(())
    }

    async fn record_chat_end(&self, session_id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE chats SET end_time = NOW() WHERE session_id = $1 AND end_time IS NULL")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        tracing::debug!("chat {} ended", session_id);
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
        sqlx::query(
            r#"
            INSERT INTO messages
                (session_id, from_user, to_user, from_display, to_display, message_text, message_kind, media_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(session_id)
        .bind(from_user)
        .bind(to_user)
        .bind(from_display)
        .bind(to_display)
        .bind(text)
        .bind(kind)
        .bind(media_ref)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE chats SET message_count = message_count + 1 WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn is_blocked(&self, blocker: UserId, blocked: UserId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM blacklist WHERE blocker_id = $1 AND blocked_id = $2")
            .bind(blocker)
            .bind(blocked)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    async fn add_block(&self, blocker: UserId, blocked: UserId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO blacklist (blocker_id, blocked_id)
            VALUES ($1, $2)
            ON CONFLICT (blocker_id, blocked_id) DO NOTHING
            "#,
        )
        .bind(blocker)
        .bind(blocked)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_block(&self, blocker: UserId, blocked: UserId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM blacklist WHERE blocker_id = $1 AND blocked_id = $2")
            .bind(blocker)
            .bind(blocked)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
