use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::queue::{CandidateFilter, WaitQueue};
use crate::core::registry::{EndedSession, SessionRegistry};
use crate::core::MatchError;
use crate::models::{Control, DistrictRelation, QueueEntry, SearchScope, Session, UserId, UserState};
use crate::services::{ProfileStore, Transport};

/// Queue and registry behind one lock.
///
/// Every pairing mutation goes through this single guarded domain, so the
/// queue and the reverse-pointer index can never disagree about a user.
#[derive(Debug, Default)]
pub struct PairState {
    pub queue: WaitQueue,
    pub registry: SessionRegistry,
}

/// Result of a search request
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Paired {
        session: Session,
        partner_nickname: String,
    },
    Queued {
        /// 1-indexed position in the waiting queue.
        position: usize,
    },
}

/// Live counters for the stats surface
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub queued: usize,
    pub active_sessions: usize,
    pub online: Vec<UserId>,
}

/// Per-request eligibility: scope, ban status, and the mutual blacklist.
struct MatchFilter<'a> {
    store: &'a dyn ProfileStore,
    requester: UserId,
    requester_district: &'a str,
    scope: SearchScope,
}

#[async_trait]
impl CandidateFilter for MatchFilter<'_> {
    async fn eligible(&self, candidate: UserId) -> bool {
        let profile = match self.store.get_profile(candidate).await {
            Ok(Some(profile)) => profile,
            _ => return false,
        };
        if profile.banned {
            return false;
        }
        if self.scope == SearchScope::District && profile.district != self.requester_district {
            return false;
        }
        // Mutual exclusion: either direction of a block disqualifies.
        // A store failure counts as blocked rather than letting the pair through.
        if self
            .store
            .is_blocked(self.requester, candidate)
            .await
            .unwrap_or(true)
        {
            return false;
        }
        if self
            .store
            .is_blocked(candidate, self.requester)
            .await
            .unwrap_or(true)
        {
            return false;
        }
        true
    }
}

enum LockStep {
    Paired {
        session: Session,
        partner_nickname: String,
        partner_district: String,
        taken: QueueEntry,
    },
    Queued(usize),
}

/// Matchmaking state machine: Idle -> Queued -> Paired -> Idle.
///
/// Owns the guarded pair state; the relay shares it through
/// [`Matchmaker::state`]. Transport calls always happen after the lock is
/// released and never roll back committed state.
pub struct Matchmaker {
    state: Arc<Mutex<PairState>>,
    store: Arc<dyn ProfileStore>,
    transport: Arc<dyn Transport>,
}

impl Matchmaker {
    pub fn new(store: Arc<dyn ProfileStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            state: Arc::new(Mutex::new(PairState::default())),
            store,
            transport,
        }
    }

    /// Shared handle to the pair state, for wiring up the relay.
    pub fn state(&self) -> Arc<Mutex<PairState>> {
        Arc::clone(&self.state)
    }

    /// Handle a search request.
    ///
    /// Any prior queue entry or session is always superseded first, then the
    /// queue is scanned FIFO for the earliest eligible candidate; with no
    /// candidate the requester is queued and told their position.
    pub async fn request_match(
        &self,
        user_id: UserId,
        scope: SearchScope,
    ) -> Result<MatchOutcome, MatchError> {
        self.force_cleanup(user_id).await?;

        let requester = self
            .store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| MatchError::NotFound(format!("user {}", user_id)))?;
        if requester.banned {
            return Err(MatchError::Banned);
        }

        let step = {
            let mut state = self.state.lock().await;
            let filter = MatchFilter {
                store: self.store.as_ref(),
                requester: user_id,
                requester_district: &requester.district,
                scope,
            };
            match state.queue.find_candidate(user_id, &filter).await {
                Some(candidate_id) => {
                    let candidate = self
                        .store
                        .get_profile(candidate_id)
                        .await?
                        .ok_or_else(|| MatchError::NotFound(format!("user {}", candidate_id)))?;
                    let taken = state
                        .queue
                        .take(candidate_id)
                        .ok_or_else(|| MatchError::NotFound(format!("user {}", candidate_id)))?;
                    let relation = DistrictRelation::of(&requester.district, &candidate.district);
                    let session = state.registry.create(user_id, candidate_id, relation)?;
                    LockStep::Paired {
                        session,
                        partner_nickname: candidate.nickname,
                        partner_district: candidate.district,
                        taken,
                    }
                }
                None => {
                    let position = state.queue.enqueue(user_id, scope)?;
                    LockStep::Queued(position)
                }
            }
        };

        match step {
            LockStep::Paired {
                session,
                partner_nickname,
                partner_district,
                taken,
            } => {
                let recorded = self
                    .store
                    .record_chat_start(
                        &session.id,
                        session.user_a,
                        session.user_b,
                        &requester.nickname,
                        &partner_nickname,
                        session.district.label(),
                    )
                    .await;
                if let Err(err) = recorded {
                    // The session must not outlive its chat record; tear it
                    // down and put the candidate back in their queue slot.
                    let mut state = self.state.lock().await;
                    state.registry.end(user_id);
                    state.queue.restore(taken);
                    tracing::warn!(
                        "unwound session {} after chat record failure: {}",
                        session.id,
                        err
                    );
                    return Err(err.into());
                }

                let partner_id = session
                    .partner_of(user_id)
                    .unwrap_or(session.user_b);
                self.send_pairing_notice(
                    user_id,
                    &partner_nickname,
                    &requester.district,
                    &partner_district,
                    &session.district,
                )
                .await;
                self.send_pairing_notice(
                    partner_id,
                    &requester.nickname,
                    &partner_district,
                    &requester.district,
                    &session.district,
                )
                .await;

                tracing::info!(
                    "paired {} with {} in session {} ({})",
                    user_id,
                    partner_id,
                    session.id,
                    session.district.label()
                );
                Ok(MatchOutcome::Paired {
                    session,
                    partner_nickname,
                })
            }
            LockStep::Queued(position) => {
                tracing::debug!("queued {} at position {} ({:?})", user_id, position, scope);
                Ok(MatchOutcome::Queued { position })
            }
        }
    }

    /// Leave the waiting queue. No-op when the user is not queued.
    pub async fn cancel(&self, user_id: UserId) -> bool {
        let removed = self.state.lock().await.queue.dequeue(user_id);
        if removed {
            tracing::debug!("cancelled search for {}", user_id);
        }
        removed
    }

    /// End the caller's active session.
    ///
    /// Notifies the partner of abandonment, acknowledges the caller, then
    /// prompts both sides (independently, unbanned sides only) to rate each
    /// other. Idempotent: returns false without touching anything when the
    /// user has no session.
    pub async fn stop(&self, user_id: UserId) -> Result<bool, MatchError> {
        let ended = self.state.lock().await.registry.end(user_id);
        let Some(ended) = ended else {
            return Ok(false);
        };

        self.store.record_chat_end(&ended.session_id).await?;
        self.notify_best_effort(ended.user_id, "Chat ended", &[]).await;
        self.notify_best_effort(ended.partner_id, "Your partner left the chat", &[])
            .await;
        self.dispatch_rating_prompts(&ended).await?;

        tracing::info!("session {} stopped by {}", ended.session_id, user_id);
        Ok(true)
    }

    /// Current state-machine position of a user.
    pub async fn state_of(&self, user_id: UserId) -> UserState {
        let state = self.state.lock().await;
        if state.registry.contains(user_id) {
            UserState::Paired
        } else if state.queue.contains(user_id) {
            UserState::Queued
        } else {
            UserState::Idle
        }
    }

    pub async fn stats(&self) -> EngineStats {
        let state = self.state.lock().await;
        let mut online = state.queue.user_ids();
        online.extend(state.registry.user_ids());
        EngineStats {
            queued: state.queue.len(),
            active_sessions: state.registry.session_count(),
            online,
        }
    }

    /// Tear down any prior queue entry or session before a new action.
    async fn force_cleanup(&self, user_id: UserId) -> Result<(), MatchError> {
        let ended = {
            let mut state = self.state.lock().await;
            state.queue.dequeue(user_id);
            state.registry.end(user_id)
        };

        if let Some(ended) = ended {
            self.store.record_chat_end(&ended.session_id).await?;
            self.notify_best_effort(ended.partner_id, "Your partner left the chat", &[])
                .await;
            self.dispatch_rating_prompts(&ended).await?;
            tracing::debug!(
                "session {} superseded by a new action from {}",
                ended.session_id,
                user_id
            );
        }
        Ok(())
    }

    async fn dispatch_rating_prompts(&self, ended: &EndedSession) -> Result<(), MatchError> {
        for (to, about) in [
            (ended.user_id, ended.partner_id),
            (ended.partner_id, ended.user_id),
        ] {
            if self.store.is_banned(to).await? {
                continue;
            }
            let Some(about_profile) = self.store.get_profile(about).await? else {
                continue;
            };
            let controls = vec![
                Control::new("👍", format!("like_{}", about)),
                Control::new("👎", format!("dislike_{}", about)),
                Control::new("Block", format!("blacklist_add_{}", about)),
                Control::new("New search", "search_menu"),
            ];
            self.notify_best_effort(
                to,
                &format!(
                    "How was your chat with {}? Rate your partner:",
                    about_profile.nickname
                ),
                &controls,
            )
            .await;
        }
        Ok(())
    }

    async fn send_pairing_notice(
        &self,
        to: UserId,
        partner_nickname: &str,
        own_district: &str,
        partner_district: &str,
        relation: &DistrictRelation,
    ) {
        let district_line = match relation {
            DistrictRelation::Same(district) => {
                format!("You are both from {}!", district)
            }
            DistrictRelation::Cross => format!(
                "You are from {}, your partner is from {}",
                own_district, partner_district
            ),
        };
        let text = format!(
            "Partner found!\n\nYou are chatting with: {}\n{}",
            partner_nickname, district_line
        );
        let controls = vec![Control::new("Stop chat", "stop")];
        self.notify_best_effort(to, &text, &controls).await;
    }

    async fn notify_best_effort(&self, user_id: UserId, text: &str, controls: &[Control]) {
        if let Err(e) = self.transport.notify(user_id, text, controls).await {
            tracing::warn!("notify {} failed: {}", user_id, e);
        }
    }
}
