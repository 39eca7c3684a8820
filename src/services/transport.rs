use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Control, RelayedMessage, UserId};
use crate::services::store::ProfileStore;

/// Errors that can occur when delivering to the outbound transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Transport returned error: {0}")]
    ApiError(String),
}

/// Outbound side of the messaging platform.
///
/// Delivery is best-effort: callers treat failures as non-fatal, log them,
/// and never roll back core state because a send failed.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a service notification, optionally with interactive controls.
    async fn notify(
        &self,
        user_id: UserId,
        text: &str,
        controls: &[Control],
    ) -> Result<(), TransportError>;

    /// Forward a relayed chat message to a session participant.
    async fn deliver(&self, user_id: UserId, message: &RelayedMessage)
        -> Result<(), TransportError>;
}

/// Webhook-based transport
///
/// Posts JSON envelopes to the configured gateway, which owns the actual
/// platform delivery (bot API, push, whatever fronts the users).
pub struct WebhookTransport {
    base_url: String,
    client: Client,
}

impl WebhookTransport {
    pub fn new(base_url: String, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), TransportError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(TransportError::ApiError(format!(
                "{} returned {}",
                path,
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    async fn notify(
        &self,
        user_id: UserId,
        text: &str,
        controls: &[Control],
    ) -> Result<(), TransportError> {
        self.post(
            "notify",
            json!({
                "userId": user_id,
                "text": text,
                "controls": controls,
            }),
        )
        .await
    }

    async fn deliver(
        &self,
        user_id: UserId,
        message: &RelayedMessage,
    ) -> Result<(), TransportError> {
        self.post(
            "deliver",
            json!({
                "userId": user_id,
                "message": message,
            }),
        )
        .await
    }
}

/// Fan-out tally returned by [`broadcast`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcastOutcome {
    pub sent: usize,
    pub failed: usize,
    pub skipped_banned: usize,
}

/// Send `text` to every recipient, skipping banned users.
///
/// Sleeps `delay` between sends to stay under transport rate limits; a failed
/// send is counted and logged but never aborts the remaining fan-out.
pub async fn broadcast(
    transport: &dyn Transport,
    store: &dyn ProfileStore,
    recipients: &[UserId],
    text: &str,
    delay: Duration,
) -> BroadcastOutcome {
    let mut outcome = BroadcastOutcome::default();

    for &user_id in recipients {
        if store.is_banned(user_id).await.unwrap_or(false) {
            outcome.skipped_banned += 1;
            continue;
        }

        match transport.notify(user_id, text, &[]).await {
            Ok(()) => outcome.sent += 1,
            Err(e) => {
                outcome.failed += 1;
                tracing::error!("broadcast to {} failed: {}", user_id, e);
            }
        }

        tokio::time::sleep(delay).await;
    }

    tracing::info!(
        "broadcast finished: sent={} failed={} skipped={}",
        outcome.sent,
        outcome.failed,
        outcome.skipped_banned
    );
    outcome
}
