//! Serve command - HTTP tile server.
//!
//! Routes:
//! - `GET /tiles/:model_run/:z/:x/:y[.pbf]?year=YYYY[&session=KEY]`
//! - `GET /health`
//! - `GET /stats`
//!
//! Tiles come back as `application/octet-stream`; a tile without features
//! is `204 No Content`. Invalid requests are `400`, every other failure is
//! `500`, both with a JSON body.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sitetile::service::TileService;
use sitetile::tile::{ErrorKind, TileRequest, TileServiceError};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the serve command.
pub fn run(
    config_path: Option<&Path>,
    verbose: bool,
    bind: Option<String>,
) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path, verbose)?;
    runner.log_startup("serve");

    let bind = bind.unwrap_or_else(|| runner.config().server.bind.clone());
    let addr: SocketAddr = bind
        .parse()
        .map_err(|e| CliError::Config(format!("invalid bind address '{}': {}", bind, e)))?;

    let app = runner.start_app()?;

    println!("SiteTile Tile Server v{}", sitetile::VERSION);
    println!("==========================");
    println!();
    println!("Listening: http://{}", addr);
    println!("Cache:     {}", app.cache_provider());
    println!();
    println!("Press Ctrl+C to stop.");

    let shutdown = CancellationToken::new();
    let result = runner.block_on(async {
        tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));
        serve(addr, app.service(), shutdown.clone()).await
    });

    runner.block_on(app.shutdown());
    result
}

async fn cancel_on_ctrl_c(token: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
    token.cancel();
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(
    addr: SocketAddr,
    service: Arc<TileService>,
    shutdown: CancellationToken,
) -> Result<(), CliError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Tile server listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| CliError::Serve(e.to_string()))?;

    info!("Tile server stopped");
    Ok(())
}

/// Build the HTTP routes over a tile service.
pub fn router(service: Arc<TileService>) -> Router {
    Router::new()
        .route("/tiles/:model_run/:z/:x/:y", get(get_tile))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
struct TileParams {
    year: Option<String>,
    session: Option<String>,
}

async fn get_tile(
    State(service): State<Arc<TileService>>,
    UrlPath((model_run, z, x, y)): UrlPath<(String, String, String, String)>,
    Query(params): Query<TileParams>,
) -> Response {
    let y = y.strip_suffix(".pbf").unwrap_or(&y);
    let Some(year) = params.year.as_deref() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            ErrorKind::InvalidRequest,
            "missing year parameter".to_string(),
        );
    };

    let request = match TileRequest::parse(&model_run, &z, &x, y, year, params.session.as_deref())
    {
        Ok(request) => request,
        Err(e) => return tile_error(e),
    };

    match service.get_tile(&request).await {
        Ok(payload) if payload.is_empty() => StatusCode::NO_CONTENT.into_response(),
        Ok(payload) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            payload.into_bytes(),
        )
            .into_response(),
        Err(e) => tile_error(e),
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": sitetile::VERSION }))
}

async fn stats(State(service): State<Arc<TileService>>) -> impl IntoResponse {
    let s = service.snapshot();
    Json(json!({
        "uptime_secs": s.uptime.as_secs(),
        "requests": s.requests,
        "request_failures": s.request_failures,
        "cache_hits": s.cache_hits,
        "cache_misses": s.cache_misses,
        "cache_errors": s.cache_errors,
        "hit_rate": s.hit_rate(),
        "tiles_computed": s.tiles_computed,
        "empty_tiles": s.empty_tiles,
        "avg_compute_ms": s.avg_compute_ms(),
        "coalesced_requests": s.coalesced_requests,
        "write_backs": s.write_backs,
        "write_back_failures": s.write_back_failures,
        "bytes_served": s.bytes_served,
    }))
}

fn tile_error(e: TileServiceError) -> Response {
    let kind = e.kind();
    let status = if kind.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        warn!(error = %e, "Returning server error");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    error_response(status, kind, e.to_string())
}

fn error_response(status: StatusCode, kind: ErrorKind, message: String) -> Response {
    (
        status,
        Json(json!({ "error": kind.to_string(), "message": message })),
    )
        .into_response()
}
