use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::MatchError;
use crate::models::{RatingSnapshot, UserId, UserProfile};
use crate::services::{ProfileStore, Transport};

/// Optional collaborator that amplifies a single judgment.
#[async_trait]
pub trait ReputationBoost: Send + Sync {
    /// How many times the increment is applied for this target (>= 1).
    async fn multiplier(&self, target: UserId) -> i64;
}

/// Optional collaborator that can absorb a dislike.
#[async_trait]
pub trait DislikeProtection: Send + Sync {
    /// Consume one protection charge; true means the dislike is absorbed
    /// and no counter changes.
    async fn absorb_dislike(&self, target: UserId) -> bool;
}

/// Reputation engine: like/dislike counters, derived rating, auto-ban.
pub struct RatingEngine {
    store: Arc<dyn ProfileStore>,
    // Counter writes are absolute values, so the read-recompute-write cycle
    // must not interleave; one guard per engine serializes every judgment.
    update_lock: Mutex<()>,
    notifier: Option<Arc<dyn Transport>>,
    boost: Option<Arc<dyn ReputationBoost>>,
    protection: Option<Arc<dyn DislikeProtection>>,
    auto_ban_dislikes: i64,
    auto_ban_min_rating: f64,
}

impl RatingEngine {
    pub fn new(store: Arc<dyn ProfileStore>, auto_ban_dislikes: i64, auto_ban_min_rating: f64) -> Self {
        Self {
            store,
            update_lock: Mutex::new(()),
            notifier: None,
            boost: None,
            protection: None,
            auto_ban_dislikes,
            auto_ban_min_rating,
        }
    }

    /// Transport used to tell a user they were auto-banned. Best-effort.
    pub fn with_notifier(mut self, notifier: Arc<dyn Transport>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_boost(mut self, boost: Arc<dyn ReputationBoost>) -> Self {
        self.boost = Some(boost);
        self
    }

    pub fn with_protection(mut self, protection: Arc<dyn DislikeProtection>) -> Self {
        self.protection = Some(protection);
        self
    }

    /// Apply one judgment to the target and return the updated counters.
    ///
    /// Deliberately not idempotent: every call is a distinct judgment event.
    /// The auto-ban threshold is re-checked after every update, likes
    /// included, so a like can still trip the ban when historical dislikes
    /// already sit over the threshold.
    pub async fn apply_rating(
        &self,
        target: UserId,
        positive: bool,
    ) -> Result<RatingSnapshot, MatchError> {
        let _guard = self.update_lock.lock().await;

        let profile = self
            .store
            .get_profile(target)
            .await?
            .ok_or_else(|| MatchError::NotFound(format!("user {}", target)))?;

        let step = match &self.boost {
            Some(boost) => boost.multiplier(target).await.max(1),
            None => 1,
        };

        let mut likes = profile.likes;
        let mut dislikes = profile.dislikes;

        if positive {
            likes += step;
        } else {
            let absorbed = match &self.protection {
                Some(protection) => protection.absorb_dislike(target).await,
                None => false,
            };
            if absorbed {
                tracing::debug!("dislike absorbed by protection for user {}", target);
            } else {
                dislikes += step;
            }
        }

        let rating = UserProfile::computed_rating(likes, dislikes);
        self.store
            .update_rating_counters(target, likes, dislikes, rating)
            .await?;

        let mut banned = profile.banned;
        if !banned && dislikes >= self.auto_ban_dislikes && rating < self.auto_ban_min_rating {
            let reason = format!("Automatic ban ({}+ dislikes)", self.auto_ban_dislikes);
            self.store.set_ban(target, &reason).await?;
            banned = true;
            tracing::warn!(
                "auto-ban triggered for user {}: {} dislikes, rating {:.1}",
                target,
                dislikes,
                rating
            );
            if let Some(notifier) = &self.notifier {
                let text = "You have been banned for receiving too many dislikes";
                if let Err(e) = notifier.notify(target, text, &[]).await {
                    tracing::warn!("ban notification to {} failed: {}", target, e);
                }
            }
        }

        Ok(RatingSnapshot {
            likes,
            dislikes,
            rating,
            banned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemoryStore;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn profile(id: UserId, likes: i64, dislikes: i64) -> UserProfile {
        UserProfile {
            user_id: id,
            nickname: format!("User {}", id),
            district: "Central".to_string(),
            anonymous: true,
            banned: false,
            ban_reason: None,
            likes,
            dislikes,
            rating: UserProfile::computed_rating(likes, dislikes),
            created_at: None,
        }
    }

    fn engine(store: Arc<MemoryStore>) -> RatingEngine {
        RatingEngine::new(store, 30, 50.0)
    }

    #[tokio::test]
    async fn test_like_increments_and_recomputes() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, 0, 0));
        let engine = engine(store.clone());

        let snap = engine.apply_rating(1, true).await.unwrap();
        assert_eq!(snap.likes, 1);
        assert_eq!(snap.dislikes, 0);
        assert_eq!(snap.rating, 100.0);
        assert!(!snap.banned);

        let stored = store.get_profile(1).await.unwrap().unwrap();
        assert_eq!(stored.likes, 1);
        assert_eq!(stored.rating, 100.0);
    }

    #[tokio::test]
    async fn test_thirtieth_dislike_bans_below_threshold_rating() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, 0, 29));
        let engine = engine(store.clone());

        let snap = engine.apply_rating(1, false).await.unwrap();
        assert_eq!(snap.dislikes, 30);
        assert!(snap.rating < 50.0);
        assert!(snap.banned);
        assert!(store.is_banned(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_high_rating_survives_thirty_dislikes() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, 40, 29));
        let engine = engine(store.clone());

        let snap = engine.apply_rating(1, false).await.unwrap();
        assert_eq!(snap.dislikes, 30);
        assert!(snap.rating >= 50.0);
        assert!(!snap.banned);
    }

    #[tokio::test]
    async fn test_like_can_trip_ban_with_historical_dislikes() {
        // 1 like / 35 dislikes: the like itself triggers the re-check.
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, 0, 35));
        let engine = engine(store.clone());

        let snap = engine.apply_rating(1, true).await.unwrap();
        assert_eq!(snap.likes, 1);
        assert_eq!(snap.dislikes, 35);
        assert!(snap.rating < 50.0);
        assert!(snap.banned);
    }

    struct DoubleBoost;

    #[async_trait]
    impl ReputationBoost for DoubleBoost {
        async fn multiplier(&self, _target: UserId) -> i64 {
            2
        }
    }

    #[tokio::test]
    async fn test_boost_multiplies_increment() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, 0, 0));
        let engine = engine(store.clone()).with_boost(Arc::new(DoubleBoost));

        let snap = engine.apply_rating(1, true).await.unwrap();
        assert_eq!(snap.likes, 2);
    }

    struct OneCharge(AtomicI64);

    #[async_trait]
    impl DislikeProtection for OneCharge {
        async fn absorb_dislike(&self, _target: UserId) -> bool {
            self.0.fetch_sub(1, Ordering::SeqCst) > 0
        }
    }

    #[tokio::test]
    async fn test_protection_absorbs_one_dislike() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, 0, 0));
        let engine = engine(store.clone()).with_protection(Arc::new(OneCharge(AtomicI64::new(1))));

        let snap = engine.apply_rating(1, false).await.unwrap();
        assert_eq!(snap.dislikes, 0, "first dislike absorbed");

        let snap = engine.apply_rating(1, false).await.unwrap();
        assert_eq!(snap.dislikes, 1, "charges exhausted");
    }

    struct NoticeLog(std::sync::Mutex<Vec<(UserId, String)>>);

    #[async_trait]
    impl Transport for NoticeLog {
        async fn notify(
            &self,
            user_id: UserId,
            text: &str,
            _controls: &[crate::models::Control],
        ) -> Result<(), crate::services::TransportError> {
            self.0.lock().unwrap().push((user_id, text.to_string()));
            Ok(())
        }

        async fn deliver(
            &self,
            _user_id: UserId,
            _message: &crate::models::RelayedMessage,
        ) -> Result<(), crate::services::TransportError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_auto_ban_notifies_target() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, 0, 29));
        let notices = Arc::new(NoticeLog(std::sync::Mutex::new(Vec::new())));
        let engine = engine(store).with_notifier(notices.clone());

        engine.apply_rating(1, false).await.unwrap();

        let notices = notices.0.lock().unwrap();
        assert!(notices.iter().any(|(to, text)| *to == 1 && text.contains("banned")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_judgments_all_counted() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, 0, 0));
        let engine = Arc::new(engine(store.clone()));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..250 {
                    engine.apply_rating(1, true).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let stored = store.get_profile(1).await.unwrap().unwrap();
        assert_eq!(stored.likes, 2000);
        assert_eq!(stored.rating, 100.0);
    }

    #[tokio::test]
    async fn test_unknown_target_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store);
        assert!(matches!(
            engine.apply_rating(404, true).await,
            Err(MatchError::NotFound(_))
        ));
    }
}
