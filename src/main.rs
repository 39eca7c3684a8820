mod config;
mod core;
mod models;
mod routes;
mod services;

use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use config::Settings;
use core::{Matchmaker, RatingEngine, Relay};
use routes::chat::AppState;
use services::{MemoryStore, PostgresStore, ProfileStore, Transport, WebhookTransport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .content_type("application/json")
            .body(serde_json::to_string(self).unwrap_or_default())
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Initialize logging
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    info!("Starting pairline chat relay service...");

    // Load configuration
    let settings = Settings::load().unwrap_or_else(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        panic!("Configuration error: {}", e);
    });

    info!("Configuration loaded successfully");

    // Initialize the profile store
    let store: Arc<dyn ProfileStore> = match &settings.database.url {
        Some(url) => {
            let max_conn = settings.database.max_connections.unwrap_or(10);
            let min_conn = settings.database.min_connections.unwrap_or(2);
            let cache_size = settings.database.cache_size.unwrap_or(10_000);
            let cache_ttl = settings.database.cache_ttl_secs.unwrap_or(300);

            let store = PostgresStore::new(url, max_conn, min_conn, cache_size, cache_ttl)
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("Failed to connect to PostgreSQL: {}", e);
                    panic!("PostgreSQL connection error: {}", e);
                });

            info!("PostgreSQL store initialized (max: {} connections)", max_conn);
            Arc::new(store)
        }
        None => {
            warn!("No database.url configured - running on the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    // Initialize the outbound transport
    let transport: Arc<dyn Transport> = Arc::new(WebhookTransport::new(
        settings.transport.webhook_url.clone(),
        settings.transport.timeout_secs.unwrap_or(10),
    ));

    info!("Webhook transport initialized ({})", settings.transport.webhook_url);

    // Wire up the engine
    let matchmaker = Arc::new(Matchmaker::new(store.clone(), transport.clone()));
    let relay = Arc::new(Relay::new(
        matchmaker.state(),
        store.clone(),
        transport.clone(),
    ));
    let rating = Arc::new(
        RatingEngine::new(
            store.clone(),
            settings.rating.auto_ban_dislikes,
            settings.rating.auto_ban_min_rating,
        )
        .with_notifier(transport.clone()),
    );

    info!(
        "Engine initialized (auto-ban at {} dislikes below rating {})",
        settings.rating.auto_ban_dislikes, settings.rating.auto_ban_min_rating
    );

    // Build application state
    let app_state = AppState {
        matchmaker,
        relay,
        rating,
        store,
        transport,
        broadcast_delay: Duration::from_millis(settings.broadcast.delay_ms),
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
