use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::PredictionError;
use crate::request::{FieldViolation, RawPredictionInput, Season};
use crate::runner::{assemble, Predictor, STATUS_ERROR};
use crate::worker::{check_setup, InvocationResult};

// ---------------------------------------------------------------------------
// State and extractors
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    predictor: Arc<Predictor>,
    config: Arc<Config>,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(predictor: Arc<Predictor>, config: Config, shutdown: CancellationToken) -> Self {
        Self {
            predictor,
            config: Arc::new(config),
            shutdown,
        }
    }

    fn hardened(&self) -> bool {
        self.config.environment.is_hardened()
    }
}

/// Rate-limit key: the peer IP, or "unknown" when the connection info is absent
pub struct ClientKey(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientKey {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(ClientKey(key))
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/health", get(health))
        .route("/api/check-setup", get(setup))
        .route("/api/predict/{season}", post(predict))
        .route("/api/parse", post(parse))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if !config.environment.is_hardened() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .server
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid allowed origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(config: Config) -> Result<()> {
    let addr = config.socket_addr()?;
    let shutdown = CancellationToken::new();

    let predictor = Arc::new(Predictor::from_config(&config));
    let sweeper = predictor.limiter().map(|limiter| {
        limiter.spawn_sweeper(
            Duration::from_secs(config.rate_limit.sweep_interval_sec),
            shutdown.clone(),
        )
    });

    info!(
        "cropbridge listening on http://{} ({})",
        addr, config.environment
    );
    let app = build_router(AppState::new(predictor, config, shutdown.clone()));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await?;

    shutdown.cancel();
    if let Some(handle) = sweeper {
        let _ = handle.await;
    }
    info!("cropbridge shut down");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM and cancels in-flight workers
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown requested, cancelling running workers");
    shutdown.cancel();
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": state.config.environment.to_string(),
    }))
    .into_response()
}

async fn setup(State(state): State<AppState>, ClientKey(client): ClientKey) -> Response {
    if let Some(rejected) = admit(&state, &client) {
        return rejected;
    }

    let report = check_setup(&state.config.worker).await;
    let status = if report.all_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let report = if state.hardened() {
        report.redacted()
    } else {
        report
    };
    (status, Json(report)).into_response()
}

/// Dropping this future (client gone) drops the worker future, which kills the child
async fn predict(
    State(state): State<AppState>,
    Path(season): Path<String>,
    ClientKey(client): ClientKey,
    body: Result<Json<RawPredictionInput>, JsonRejection>,
) -> Response {
    let Ok(season) = season.parse::<Season>() else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "status": STATUS_ERROR,
                "message": format!("Unknown season: {}", season),
            })),
        )
            .into_response();
    };

    let raw = match body {
        Ok(Json(raw)) => raw,
        Err(rejection) => {
            let err = PredictionError::InvalidInput(vec![FieldViolation {
                field: "body".to_string(),
                message: rejection.body_text(),
            }]);
            return error_response(&state, &err);
        }
    };

    match state
        .predictor
        .predict(&client, season, &raw, Some(state.shutdown.child_token()))
        .await
    {
        Ok(set) => Json(set.to_response(state.hardened())).into_response(),
        Err(e) => error_response(&state, &e),
    }
}

/// Run raw worker output through the plan parser without invoking anything
async fn parse(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    body: String,
) -> Response {
    if let Some(rejected) = admit(&state, &client) {
        return rejected;
    }

    let strict = state.config.parser.strict;
    let parsed = tokio::task::spawn_blocking(move || {
        assemble(InvocationResult::Success { raw_text: body }, strict)
    })
    .await;

    match parsed {
        Ok(Ok(set)) => Json(set.to_response(state.hardened())).into_response(),
        Ok(Err(e)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(e.to_response(state.hardened())),
        )
            .into_response(),
        Err(e) => {
            warn!("Parser task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": STATUS_ERROR,
                    "message": "Error parsing prediction output",
                })),
            )
                .into_response()
        }
    }
}

/// 429 envelope when the client is over its window, for routes that do not
/// go through the predictor
fn admit(state: &AppState, client: &str) -> Option<Response> {
    let limiter = state.predictor.limiter()?;
    if limiter.admit(client) {
        return None;
    }
    warn!("Rate limit exceeded for {}", client);
    Some(error_response(state, &PredictionError::RateLimited))
}

fn error_response(state: &AppState, err: &PredictionError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Json(err.to_response(state.hardened()))).into_response();

    if matches!(err, PredictionError::RateLimited) {
        if let Some(limiter) = state.predictor.limiter() {
            let secs = limiter.window().as_secs_f64().ceil() as u64;
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
    }
    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
