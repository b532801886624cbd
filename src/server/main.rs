//! Area check server.
//!
//! Holds the active reference area, accepts operator uploads and answers
//! address checks over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::StringRejection, DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use geoprotec::center::DisplayHint;
use geoprotec::config::{api_key_from_env, Config};
use geoprotec::geocode::{GeminiGeocoder, GeocodeFailure};
use geoprotec::pip::{ReferenceArea, Verification, DEFAULT_AREA};
use geoprotec::{AreaFeature, LonLat, ValidationOptions};

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Reference area check server")]
struct Args {
    /// Listen address (overrides the config file)
    #[arg(short, long)]
    listen: Option<String>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Initial reference area (GeoJSON)
    #[arg(long)]
    area: Option<PathBuf>,

    /// Enforce closed rings and coordinate ranges on uploads
    #[arg(long)]
    strict: bool,
}

/// Application state shared across handlers
struct AppState {
    area: ReferenceArea,
    geocoder: Result<GeminiGeocoder, GeocodeFailure>,
    options: ValidationOptions,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::default(),
    };

    let options = if args.strict || config.strict {
        ValidationOptions::strict()
    } else {
        ValidationOptions::default()
    };

    info!("GeoProtec Area Server");

    let area = ReferenceArea::empty();
    match args.area.as_ref().or(config.area_file.as_ref()) {
        Some(path) => {
            info!("Loading reference area from {}", path.display());
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            area.load_text(&text, options)
                .with_context(|| format!("Invalid reference area in {}", path.display()))?;
        }
        None => {
            info!("Using built-in reference area");
            area.load_text(DEFAULT_AREA, options)
                .context("Built-in reference area is invalid")?;
        }
    }

    let geocoder = GeminiGeocoder::new(
        config
            .geocoder
            .gemini(&api_key_from_env().unwrap_or_default()),
    );
    if let Err(e) = &geocoder {
        warn!("Address checks disabled: {}", e);
    }

    let state = Arc::new(AppState {
        area,
        geocoder,
        options,
    });

    let app = app(state, config.max_upload_bytes);

    let listen = args.listen.unwrap_or(config.listen);
    info!("Starting server on {}", listen);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router; `max_upload_bytes` bounds area uploads
fn app(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/v1/area",
            get(get_area_handler)
                .put(put_area_handler)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/v1/verify", post(verify_handler))
        .route("/v1/contains", get(contains_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        area_loaded: state.area.is_loaded(),
        geocoder: state.geocoder.is_ok(),
        display: state
            .area
            .current()
            .map_or(DisplayHint::DEFAULT, |area| area.hint),
    })
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    area_loaded: bool,
    geocoder: bool,
    /// Initial map view: the active area, or the built-in view without one
    display: DisplayHint,
}

/// Current reference area as GeoJSON
async fn get_area_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AreaFeature>, StatusCode> {
    state
        .area
        .current()
        .map(|area| Json(area.feature.clone()))
        .ok_or(StatusCode::NOT_FOUND)
}

/// Replace the reference area with the uploaded GeoJSON
async fn put_area_handler(
    State(state): State<Arc<AppState>>,
    body: Result<String, StringRejection>,
) -> Result<Json<AreaResponse>, (StatusCode, Json<ErrorResponse>)> {
    let body = body.map_err(|rejection| {
        warn!("Unreadable area upload: {}", rejection.body_text());
        (
            rejection.status(),
            Json(ErrorResponse {
                kind: "UnreadableBody",
                message: rejection.body_text(),
            }),
        )
    })?;

    let loaded = state.area.load_text(&body, state.options).map_err(|e| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                kind: e.kind(),
                message: e.to_string(),
            }),
        )
    })?;

    Ok(Json(AreaResponse {
        geometry: loaded.feature.shape().kind(),
        parts: loaded.feature.shape().polygons().len(),
        display: loaded.hint,
        loaded_at: loaded.loaded_at,
    }))
}

#[derive(Debug, Serialize)]
struct AreaResponse {
    geometry: &'static str,
    parts: usize,
    display: DisplayHint,
    loaded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    kind: &'static str,
    message: String,
}

/// Geocode an address and check it against the area
async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyRequest>,
) -> Json<Verification> {
    let verification = match &state.geocoder {
        Ok(geocoder) => state.area.verify(geocoder, &request.address).await,
        Err(_) if !state.area.is_loaded() => Verification::no_polygon(),
        Err(e) => Verification::from_failure(e),
    };
    Json(verification)
}

#[derive(Deserialize)]
struct VerifyRequest {
    address: String,
}

/// Check a raw point without geocoding
async fn contains_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ContainsParams>,
) -> Result<Json<ContainsResponse>, (StatusCode, String)> {
    let point = LonLat::new(params.lon, params.lat);
    match state.area.contains(point) {
        None => Err((
            StatusCode::CONFLICT,
            "no reference area is loaded".to_string(),
        )),
        Some(Err(e)) => {
            tracing::error!("Containment check failed: {}", e);
            Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
        Some(Ok(inside)) => Ok(Json(ContainsResponse { inside })),
    }
}

#[derive(Deserialize)]
struct ContainsParams {
    lon: f64,
    lat: f64,
}

#[derive(Debug, Serialize)]
struct ContainsResponse {
    inside: bool,
}
