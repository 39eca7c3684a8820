use chrono::Utc;
use std::collections::HashMap;

use crate::core::MatchError;
use crate::models::{DistrictRelation, Session, UserId};

/// A session removed from the registry, handed back so the owner can
/// persist the end timestamp and notify the partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndedSession {
    pub session_id: String,
    pub user_id: UserId,
    pub partner_id: UserId,
}

/// Registry of active pairings.
///
/// Holds the session records plus a per-user reverse index. Both directions
/// of a pairing live and die together: `create` installs them in one call
/// and `end` removes them in one call, so callers can never observe a
/// half-removed pair.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    by_user: HashMap<UserId, String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.by_user.keys().copied().collect()
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.by_user.contains_key(&user_id)
    }

    /// Create a session for two users and install both reverse pointers.
    ///
    /// The identifier is the ordered id pair plus the creation instant,
    /// unique for any realistic pairing rate. The format itself is not a
    /// contract.
    pub fn create(
        &mut self,
        user_a: UserId,
        user_b: UserId,
        district: DistrictRelation,
    ) -> Result<Session, MatchError> {
        if self.contains(user_a) || self.contains(user_b) {
            return Err(MatchError::AlreadyInSession);
        }

        let started_at = Utc::now();
        let (lo, hi) = if user_a <= user_b {
            (user_a, user_b)
        } else {
            (user_b, user_a)
        };
        let id = format!("{}-{}-{}", lo, hi, started_at.timestamp_millis());

        let session = Session {
            id: id.clone(),
            user_a,
            user_b,
            district,
            started_at,
        };

        self.by_user.insert(user_a, id.clone());
        self.by_user.insert(user_b, id.clone());
        self.sessions.insert(id, session.clone());
        Ok(session)
    }

    pub fn get_partner(&self, user_id: UserId) -> Option<UserId> {
        let session = self.session_of(user_id)?;
        session.partner_of(user_id)
    }

    pub fn session_of(&self, user_id: UserId) -> Option<&Session> {
        let id = self.by_user.get(&user_id)?;
        self.sessions.get(id)
    }

    /// Tear down the session a user participates in.
    ///
    /// Removes the session record and both reverse pointers; no-op when the
    /// user has no session. Persisting the end timestamp is the caller's job.
    pub fn end(&mut self, user_id: UserId) -> Option<EndedSession> {
        let session_id = self.by_user.get(&user_id)?.clone();
        let session = self.sessions.remove(&session_id)?;

        self.by_user.remove(&session.user_a);
        self.by_user.remove(&session.user_b);

        let partner_id = if session.user_a == user_id {
            session.user_b
        } else {
            session.user_a
        };
        Some(EndedSession {
            session_id,
            user_id,
            partner_id,
        })
    }

    /// Drop a dangling reverse pointer whose session record is gone.
    ///
    /// Repair hook for the relay's defensive check; with `end` removing both
    /// directions together this should never fire, but a stale pointer must
    /// not wedge the user.
    pub fn remove_stale(&mut self, user_id: UserId) -> bool {
        match self.by_user.get(&user_id) {
            Some(id) if !self.sessions.contains_key(id) => {
                self.by_user.remove(&user_id);
                true
            }
            _ => false,
        }
    }
}
