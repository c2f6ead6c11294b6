use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    routing::{delete, get},
    Json, Router,
};
use server_api::{create_square, list_squares, reset_squares, ApiContext};
use shared::{
    domain::Square,
    error::{ApiError, ErrorCode},
    protocol::{ResetResponse, HEALTH_ROUTE, SQUARE_RESET_ROUTE, SQUARE_ROUTE},
};
use storage::SquareStore;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, normalize_data_path, Settings};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let data_path = normalize_data_path(&settings.data_path);
    let store = SquareStore::open(&data_path).await.map_err(|error| {
        error!(
            data_path = %data_path.display(),
            %error,
            "failed to open square store; verify the parent directory is writable"
        );
        error
    })?;
    if let Err(error) = store.health_check().await {
        warn!(%error, "square store is not readable yet; requests will fail until it is fixed");
    }

    let state = AppState {
        api: ApiContext { store },
    };
    let app = build_router(Arc::new(state), &settings)?;

    let addr: SocketAddr = settings
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.bind_addr))?;
    info!(%addr, data_path = %data_path.display(), "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown requested");
}

fn build_router(state: Arc<AppState>, settings: &Settings) -> anyhow::Result<Router> {
    let origin: HeaderValue = settings
        .allowed_origin
        .parse()
        .with_context(|| format!("invalid allowed origin '{}'", settings.allowed_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_headers(Any)
        .allow_methods(Any);

    Ok(Router::new()
        .route(HEALTH_ROUTE, get(healthz))
        .route(SQUARE_ROUTE, get(http_list_squares).post(http_create_square))
        .route(SQUARE_RESET_ROUTE, delete(http_reset_squares))
        .layer(RequestBodyLimitLayer::new(settings.max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match state.api.store.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            warn!(%error, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

async fn http_list_squares(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Square>> {
    let squares = list_squares(&state.api).await.map_err(error_response)?;
    Ok(Json(squares))
}

async fn http_create_square(
    State(state): State<Arc<AppState>>,
    Json(square): Json<Square>,
) -> ApiResult<Square> {
    let stored = create_square(&state.api, square)
        .await
        .map_err(error_response)?;
    Ok(Json(stored))
}

async fn http_reset_squares(State(state): State<Arc<AppState>>) -> ApiResult<ResetResponse> {
    let response = reset_squares(&state.api).await.map_err(error_response)?;
    Ok(Json(response))
}

fn error_response(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(message = %err.message, "request failed");
    }
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
