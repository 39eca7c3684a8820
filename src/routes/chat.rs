use actix_web::{web, HttpResponse, Responder};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

use crate::core::{MatchError, MatchOutcome, Matchmaker, RatingEngine, Relay};
use crate::models::{
    ActionResponse, BanRequest, BlacklistRequest, BroadcastRequest, BroadcastResponse,
    ErrorResponse, HealthResponse, RateRequest, RateResponse, RelayRequest, SearchRequest,
    SearchResponse, StatsResponse, UserActionRequest, UserId,
};
use crate::services::{broadcast, ProfileStore, Transport};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub matchmaker: Arc<Matchmaker>,
    pub relay: Arc<Relay>,
    pub rating: Arc<RatingEngine>,
    pub store: Arc<dyn ProfileStore>,
    pub transport: Arc<dyn Transport>,
    pub broadcast_delay: Duration,
}

/// Configure all chat-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/chat/search", web::post().to(search))
        .route("/chat/cancel", web::post().to(cancel))
        .route("/chat/stop", web::post().to(stop))
        .route("/chat/message", web::post().to(message))
        .route("/rating/rate", web::post().to(rate))
        .route("/blacklist/add", web::post().to(blacklist_add))
        .route("/blacklist/remove", web::post().to(blacklist_remove))
        .route("/stats", web::get().to(stats))
        .route("/broadcast", web::post().to(admin_broadcast))
        .route("/users/{user_id}/ban", web::post().to(admin_ban))
        .route("/users/{user_id}/unban", web::post().to(admin_unban));
}

fn validation_error(errors: validator::ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "Validation failed".to_string(),
        message: errors.to_string(),
        status_code: 400,
    })
}

fn match_error(e: MatchError) -> HttpResponse {
    let (status_code, error) = match &e {
        MatchError::Banned => (403, "Banned"),
        MatchError::NotFound(_) => (404, "Not found"),
        MatchError::AlreadyQueued | MatchError::AlreadyInSession => (409, "Conflict"),
        MatchError::Store(_) => (500, "Storage failure"),
    };
    if status_code == 500 {
        tracing::error!("request failed: {}", e);
    }
    let body = ErrorResponse {
        error: error.to_string(),
        message: e.to_string(),
        status_code,
    };
    match status_code {
        403 => HttpResponse::Forbidden().json(body),
        404 => HttpResponse::NotFound().json(body),
        409 => HttpResponse::Conflict().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

fn store_error(e: impl std::fmt::Display) -> HttpResponse {
    tracing::error!("storage failure: {}", e);
    HttpResponse::InternalServerError().json(ErrorResponse {
        error: "Storage failure".to_string(),
        message: e.to_string(),
        status_code: 500,
    })
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store_healthy = state.store.health_check().await.unwrap_or(false);
    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Request a chat partner
///
/// POST /api/v1/chat/search
async fn search(state: web::Data<AppState>, req: web::Json<SearchRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    match state.matchmaker.request_match(req.user_id, req.scope).await {
        Ok(MatchOutcome::Paired {
            session,
            partner_nickname,
        }) => HttpResponse::Ok().json(SearchResponse::Paired {
            district_label: session.district.label().to_string(),
            session_id: session.id,
            partner_nickname,
        }),
        Ok(MatchOutcome::Queued { position }) => {
            HttpResponse::Ok().json(SearchResponse::Queued { position })
        }
        Err(e) => match_error(e),
    }
}

/// Leave the waiting queue
///
/// POST /api/v1/chat/cancel
async fn cancel(state: web::Data<AppState>, req: web::Json<UserActionRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    let removed = state.matchmaker.cancel(req.user_id).await;
    let user_state = state.matchmaker.state_of(req.user_id).await;
    HttpResponse::Ok().json(ActionResponse {
        success: removed,
        state: user_state,
    })
}

/// End the active chat
///
/// POST /api/v1/chat/stop
async fn stop(state: web::Data<AppState>, req: web::Json<UserActionRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    match state.matchmaker.stop(req.user_id).await {
        Ok(ended) => {
            let user_state = state.matchmaker.state_of(req.user_id).await;
            HttpResponse::Ok().json(ActionResponse {
                success: ended,
                state: user_state,
            })
        }
        Err(e) => match_error(e),
    }
}

/// Forward a message to the chat partner
///
/// POST /api/v1/chat/message
async fn message(state: web::Data<AppState>, req: web::Json<RelayRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }
    let req = req.into_inner();

    match state
        .relay
        .relay(req.user_id, req.display_name.as_deref(), req.payload)
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(serde_json::json!({
            "delivered": matches!(outcome, crate::core::RelayOutcome::Delivered { .. }),
        })),
        Err(e) => match_error(e),
    }
}

/// Apply a like/dislike to an ex-partner
///
/// POST /api/v1/rating/rate
async fn rate(state: web::Data<AppState>, req: web::Json<RateRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    match state.rating.apply_rating(req.target_id, req.positive).await {
        Ok(snapshot) => HttpResponse::Ok().json(RateResponse {
            target_id: req.target_id,
            snapshot,
        }),
        Err(e) => match_error(e),
    }
}

/// Block a user from future pairings
///
/// POST /api/v1/blacklist/add
async fn blacklist_add(
    state: web::Data<AppState>,
    req: web::Json<BlacklistRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    match state.store.add_block(req.user_id, req.target_id).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "blocked": true })),
        Err(e) => store_error(e),
    }
}

/// POST /api/v1/blacklist/remove
async fn blacklist_remove(
    state: web::Data<AppState>,
    req: web::Json<BlacklistRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    match state.store.remove_block(req.user_id, req.target_id).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "blocked": false })),
        Err(e) => store_error(e),
    }
}

/// Live engine statistics
///
/// GET /api/v1/stats
async fn stats(state: web::Data<AppState>) -> impl Responder {
    let engine = state.matchmaker.stats().await;

    let mut online_by_district: HashMap<String, usize> = HashMap::new();
    for user_id in &engine.online {
        match state.store.get_profile(*user_id).await {
            Ok(Some(profile)) => *online_by_district.entry(profile.district).or_insert(0) += 1,
            Ok(None) => {}
            Err(e) => return store_error(e),
        }
    }

    HttpResponse::Ok().json(StatsResponse {
        online: engine.online.len(),
        queued: engine.queued,
        active_sessions: engine.active_sessions,
        online_by_district,
    })
}

/// Send a text to a recipient list, throttled
///
/// POST /api/v1/broadcast
async fn admin_broadcast(
    state: web::Data<AppState>,
    req: web::Json<BroadcastRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }

    tracing::info!("broadcasting to {} recipients", req.recipients.len());
    let outcome = broadcast(
        state.transport.as_ref(),
        state.store.as_ref(),
        &req.recipients,
        &req.text,
        state.broadcast_delay,
    )
    .await;

    HttpResponse::Ok().json(BroadcastResponse {
        sent: outcome.sent,
        failed: outcome.failed,
        skipped_banned: outcome.skipped_banned,
    })
}

/// POST /api/v1/users/{user_id}/ban
async fn admin_ban(
    state: web::Data<AppState>,
    path: web::Path<UserId>,
    req: web::Json<BanRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors);
    }
    let user_id = path.into_inner();

    match state.store.set_ban(user_id, &req.reason).await {
        Ok(()) => {
            tracing::info!("banned {}: {}", user_id, req.reason);
            let text = format!("You have been banned: {}", req.reason);
            if let Err(e) = state.transport.notify(user_id, &text, &[]).await {
                tracing::warn!("ban notification to {} failed: {}", user_id, e);
            }
            HttpResponse::Ok().json(serde_json::json!({ "banned": true }))
        }
        Err(e) => store_error(e),
    }
}

/// POST /api/v1/users/{user_id}/unban
async fn admin_unban(state: web::Data<AppState>, path: web::Path<UserId>) -> impl Responder {
    let user_id = path.into_inner();

    match state.store.clear_ban(user_id).await {
        Ok(()) => {
            tracing::info!("unbanned {}", user_id);
            HttpResponse::Ok().json(serde_json::json!({ "banned": false }))
        }
        Err(e) => store_error(e),
    }
}
