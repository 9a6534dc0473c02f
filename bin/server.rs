// Yape Listener - Web Server
// REST API with Axum: receive notifications, browse stored transactions

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use yape_listener::{
    Category, CategoryClassifier, CategoryTotal, ListenerConfig, ListenerOutcome,
    NotificationEvent, NotificationListener, ParsedTransaction, ServiceSettings, SqliteSink,
    StoredTransaction, TransactionParser,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    listener: Arc<NotificationListener<SqliteSink>>,
    settings: Arc<Mutex<ServiceSettings>>,
    settings_path: PathBuf,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }

    fn fail(status: StatusCode, message: String) -> Response {
        (
            status,
            Json(ApiResponse::<T> {
                success: false,
                data: None,
                error: Some(message),
            }),
        )
            .into_response()
    }
}

#[derive(Deserialize)]
struct ParseRequest {
    message: String,
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Deserialize)]
struct ServiceRequest {
    enabled: bool,
}

#[derive(Serialize)]
struct ServiceResponse {
    service_enabled: bool,
    device_id: String,
    source_package: String,
}

impl AppState {
    fn service_enabled(&self) -> bool {
        match self.settings.lock() {
            Ok(settings) => settings.service_enabled,
            Err(poisoned) => poisoned.into_inner().service_enabled,
        }
    }

    fn service_response(&self, settings: &ServiceSettings) -> ServiceResponse {
        ServiceResponse {
            service_enabled: settings.service_enabled,
            device_id: self.listener.device_id().to_string(),
            source_package: self.listener.source_package().to_string(),
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// POST /api/notifications - Feed one posted notification through the listener
async fn post_notification(
    State(state): State<AppState>,
    Json(event): Json<NotificationEvent>,
) -> Response {
    let outcome = state
        .listener
        .on_notification_posted(&event, state.service_enabled());

    match outcome {
        ListenerOutcome::SinkFailed { ref error, .. } => {
            ApiResponse::<ListenerOutcome>::fail(StatusCode::BAD_GATEWAY, error.clone())
        }
        outcome => ApiResponse::ok(outcome),
    }
}

/// POST /api/parse - Dry run: parse a message without storing it
async fn post_parse(State(state): State<AppState>, Json(req): Json<ParseRequest>) -> Response {
    let id = uuid::Uuid::new_v4().to_string();
    let timestamp = req
        .timestamp
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

    let record: ParsedTransaction = state.listener.parser().parse(
        &req.message,
        &id,
        timestamp,
        state.listener.device_id(),
    );

    ApiResponse::ok(record)
}

/// GET /api/transactions - Get all stored transactions
async fn get_transactions(State(state): State<AppState>) -> Response {
    match state.listener.sink().all_records() {
        Ok(records) => ApiResponse::ok(records),
        Err(e) => {
            error!(error = %e, "error getting transactions");
            ApiResponse::<Vec<StoredTransaction>>::fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            )
        }
    }
}

/// GET /api/filters/:category - Filter transactions by category (or "all")
async fn filter_transactions(
    State(state): State<AppState>,
    Path(filter): Path<String>,
) -> Response {
    let sink = state.listener.sink();

    let result = if filter.eq_ignore_ascii_case("all") {
        sink.all_records()
    } else {
        match Category::from_code(&filter) {
            Some(category) => sink.records_by_category(category),
            None => {
                return ApiResponse::<Vec<StoredTransaction>>::fail(
                    StatusCode::BAD_REQUEST,
                    format!("Unknown category: {}", filter),
                )
            }
        }
    };

    match result {
        Ok(records) => ApiResponse::ok(records),
        Err(e) => {
            error!(error = %e, filter = %filter, "error filtering transactions");
            ApiResponse::<Vec<StoredTransaction>>::fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            )
        }
    }
}

/// GET /api/stats - Totals per category
async fn get_stats(State(state): State<AppState>) -> Response {
    match state.listener.sink().category_totals() {
        Ok(totals) => ApiResponse::ok(totals),
        Err(e) => {
            error!(error = %e, "error getting stats");
            ApiResponse::<Vec<CategoryTotal>>::fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/service - Current toggle state
async fn get_service(State(state): State<AppState>) -> Response {
    let settings = match state.settings.lock() {
        Ok(settings) => settings.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };

    ApiResponse::ok(state.service_response(&settings))
}

/// POST /api/service - Turn capture on/off (persisted)
async fn set_service(State(state): State<AppState>, Json(req): Json<ServiceRequest>) -> Response {
    let mut settings = match state.settings.lock() {
        Ok(settings) => settings,
        Err(poisoned) => poisoned.into_inner(),
    };

    match settings.set_enabled(req.enabled, &state.settings_path) {
        Ok(()) => {
            let response = state.service_response(&settings);
            ApiResponse::ok(response)
        }
        Err(e) => {
            error!(error = %e, "error saving service settings");
            ApiResponse::<ServiceResponse>::fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ListenerConfig::from_env()?;
    let settings = ServiceSettings::load_or_init(&config.settings_path)?;

    let parser = match &config.rules_path {
        Some(path) => TransactionParser::with_classifier(CategoryClassifier::from_file(path)?),
        None => TransactionParser::new(),
    };

    let sink = SqliteSink::open(&config.db_path)?;
    info!(db = %config.db_path.display(), "database opened");

    let listener = NotificationListener::new(sink, &settings.effective_device_id(&config))
        .with_source_package(&config.source_package)
        .with_parser(parser);

    // Create shared state
    let state = AppState {
        listener: Arc::new(listener),
        settings: Arc::new(Mutex::new(settings)),
        settings_path: config.settings_path.clone(),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/notifications", post(post_notification))
        .route("/parse", post(post_parse))
        .route("/transactions", get(get_transactions))
        .route("/filters/:category", get(filter_transactions))
        .route("/stats", get(get_stats))
        .route("/service", get(get_service).post(set_service))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.server_addr.as_str()).await?;
    info!(addr = %config.server_addr, "🚀 server running");

    axum::serve(listener, app).await?;

    Ok(())
}
