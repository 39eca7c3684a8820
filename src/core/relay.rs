use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::matchmaker::PairState;
use crate::core::MatchError;
use crate::models::{MessagePayload, RelayedMessage, UserId};
use crate::services::{ProfileStore, Transport};

/// What became of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered { session_id: String, to: UserId },
    /// Sender has no live session (or is banned); nothing forwarded.
    Dropped,
}

/// Forwards messages between session participants and keeps the transcript.
///
/// Shares the pair state with the matchmaker. Delivery failures are logged
/// and never tear the session down; the transcript record is written either
/// way.
pub struct Relay {
    state: Arc<Mutex<PairState>>,
    store: Arc<dyn ProfileStore>,
    transport: Arc<dyn Transport>,
}

impl Relay {
    pub fn new(
        state: Arc<Mutex<PairState>>,
        store: Arc<dyn ProfileStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            state,
            store,
            transport,
        }
    }

    pub async fn relay(
        &self,
        sender: UserId,
        display_name: Option<&str>,
        payload: MessagePayload,
    ) -> Result<RelayOutcome, MatchError> {
        if self.store.is_banned(sender).await? {
            tracing::debug!("dropping message from banned user {}", sender);
            return Ok(RelayOutcome::Dropped);
        }

        let routed = {
            let mut state = self.state.lock().await;
            match state.registry.session_of(sender) {
                Some(session) => match session.partner_of(sender) {
                    Some(partner) if state.registry.contains(partner) => {
                        Some((session.id.clone(), partner))
                    }
                    _ => {
                        // Partner's pointer is gone: the pairing is broken,
                        // so clear the sender's side rather than relay into
                        // a half-dead session.
                        state.registry.remove_stale(sender);
                        tracing::warn!("repaired stale session pointer for {}", sender);
                        None
                    }
                },
                None => None,
            }
        };

        let Some((session_id, partner)) = routed else {
            return Ok(RelayOutcome::Dropped);
        };

        let sender_profile = self
            .store
            .get_profile(sender)
            .await?
            .ok_or_else(|| MatchError::NotFound(format!("user {}", sender)))?;
        let partner_profile = self
            .store
            .get_profile(partner)
            .await?
            .ok_or_else(|| MatchError::NotFound(format!("user {}", partner)))?;

        // Anonymous participants are shown under their nickname; everyone
        // else under their platform display name when we have one.
        let from_display = if sender_profile.anonymous {
            sender_profile.nickname.clone()
        } else {
            display_name
                .map(str::to_string)
                .unwrap_or_else(|| sender_profile.nickname.clone())
        };

        let message = RelayedMessage {
            from_display: from_display.clone(),
            payload,
        };
        if let Err(e) = self.transport.deliver(partner, &message).await {
            tracing::warn!(
                "delivery to {} failed in session {}: {}",
                partner,
                session_id,
                e
            );
        }

        self.store
            .record_message(
                &session_id,
                sender,
                partner,
                &from_display,
                &partner_profile.nickname,
                message.payload.text(),
                message.payload.kind(),
                message.payload.media_ref(),
            )
            .await?;

        Ok(RelayOutcome::Delivered {
            session_id,
            to: partner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Matchmaker;
    use crate::models::{Control, RelayedMessage, SearchScope, UserProfile};
    use crate::services::{MemoryStore, TransportError};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingTransport {
        delivered: StdMutex<Vec<(UserId, String, String)>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn notify(
            &self,
            _user_id: UserId,
            _text: &str,
            _controls: &[Control],
        ) -> Result<(), TransportError> {
            Ok(())
        }

        async fn deliver(
            &self,
            user_id: UserId,
            message: &RelayedMessage,
        ) -> Result<(), TransportError> {
            self.delivered.lock().unwrap().push((
                user_id,
                message.from_display.clone(),
                message.payload.kind().to_string(),
            ));
            Ok(())
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl Transport for FailingTransport {
        async fn notify(
            &self,
            _user_id: UserId,
            _text: &str,
            _controls: &[Control],
        ) -> Result<(), TransportError> {
            Ok(())
        }

        async fn deliver(
            &self,
            _user_id: UserId,
            _message: &RelayedMessage,
        ) -> Result<(), TransportError> {
            Err(TransportError::ApiError("gateway unavailable".to_string()))
        }
    }

    fn profile(id: UserId, anonymous: bool) -> UserProfile {
        UserProfile {
            user_id: id,
            nickname: format!("User {}", id),
            district: "Central".to_string(),
            anonymous,
            banned: false,
            ban_reason: None,
            likes: 0,
            dislikes: 0,
            rating: 50.0,
            created_at: None,
        }
    }

    async fn paired_setup(
        store: Arc<MemoryStore>,
        transport: Arc<dyn Transport>,
    ) -> (Relay, String) {
        let matchmaker = Matchmaker::new(store.clone(), transport.clone());
        matchmaker.request_match(1, SearchScope::Global).await.unwrap();
        let outcome = matchmaker.request_match(2, SearchScope::Global).await.unwrap();
        let crate::core::MatchOutcome::Paired { session, .. } = outcome else {
            panic!("expected pairing");
        };
        let relay = Relay::new(matchmaker.state(), store, transport);
        (relay, session.id)
    }

    #[tokio::test]
    async fn test_relays_to_partner_and_persists() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, true));
        store.insert_profile(profile(2, true));
        let transport = Arc::new(RecordingTransport::default());
        let (relay, session_id) = paired_setup(store.clone(), transport.clone()).await;

        let outcome = relay
            .relay(1, None, MessagePayload::Text { text: "hi".to_string() })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RelayOutcome::Delivered { session_id: session_id.clone(), to: 2 }
        );

        let delivered = transport.delivered.lock().unwrap();
        assert_eq!(delivered.as_slice(), &[(2, "User 1".to_string(), "text".to_string())]);
        let messages = store.messages(&session_id);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_no_session_drops_silently() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, true));
        let transport = Arc::new(RecordingTransport::default());
        let matchmaker = Matchmaker::new(store.clone(), transport.clone());
        let relay = Relay::new(matchmaker.state(), store, transport.clone());

        let outcome = relay
            .relay(1, None, MessagePayload::Text { text: "hi".to_string() })
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome::Dropped);
        assert!(transport.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_banned_sender_dropped() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, true));
        store.insert_profile(profile(2, true));
        let transport = Arc::new(RecordingTransport::default());
        let (relay, _) = paired_setup(store.clone(), transport.clone()).await;
        store.set_ban(1, "test").await.unwrap();

        let outcome = relay
            .relay(1, None, MessagePayload::Text { text: "hi".to_string() })
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome::Dropped);
        assert!(transport.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_named_sender_uses_display_name() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, false));
        store.insert_profile(profile(2, true));
        let transport = Arc::new(RecordingTransport::default());
        let (relay, _) = paired_setup(store.clone(), transport.clone()).await;

        relay
            .relay(1, Some("Alex"), MessagePayload::Text { text: "hi".to_string() })
            .await
            .unwrap();

        let delivered = transport.delivered.lock().unwrap();
        assert_eq!(delivered[0].1, "Alex");
    }

    #[tokio::test]
    async fn test_anonymous_sender_hides_display_name() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, true));
        store.insert_profile(profile(2, true));
        let transport = Arc::new(RecordingTransport::default());
        let (relay, _) = paired_setup(store.clone(), transport.clone()).await;

        relay
            .relay(1, Some("Alex"), MessagePayload::Text { text: "hi".to_string() })
            .await
            .unwrap();

        let delivered = transport.delivered.lock().unwrap();
        assert_eq!(delivered[0].1, "User 1");
    }

    #[tokio::test]
    async fn test_delivery_failure_still_records_transcript() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, true));
        store.insert_profile(profile(2, true));
        let (relay, session_id) = paired_setup(store.clone(), Arc::new(FailingTransport)).await;

        let outcome = relay
            .relay(1, None, MessagePayload::Text { text: "hi".to_string() })
            .await
            .unwrap();
        assert!(matches!(outcome, RelayOutcome::Delivered { .. }));
        assert_eq!(store.messages(&session_id).len(), 1);
    }

    #[tokio::test]
    async fn test_media_payload_kind_and_ref_recorded() {
        let store = Arc::new(MemoryStore::new());
        store.insert_profile(profile(1, true));
        store.insert_profile(profile(2, true));
        let transport = Arc::new(RecordingTransport::default());
        let (relay, session_id) = paired_setup(store.clone(), transport.clone()).await;

        relay
            .relay(
                1,
                None,
                MessagePayload::Photo {
                    file_id: "ph-123".to_string(),
                    caption: Some("sunset".to_string()),
                },
            )
            .await
            .unwrap();

        let messages = store.messages(&session_id);
        assert_eq!(messages[0].kind, "photo");
        assert_eq!(messages[0].media_ref.as_deref(), Some("ph-123"));
        assert_eq!(messages[0].text.as_deref(), Some("sunset"));
    }
}
