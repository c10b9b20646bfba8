mod aggregator;
mod config;
mod directory;
mod geocode;
mod service;
mod storage;
#[cfg(test)]
mod testing;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue};
use axum::{routing::get, Router};
use envconfig::Envconfig;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use aggregator::AddressAggregator;
use config::Config;
use directory::{Credential, HttpDirectoryClient};
use geocode::{GeocodeResolver, GoogleGeocoder};
use service::{AppState, ServiceProtocol};
use storage::GeocodeCache;

const NO_CACHE: &str = "no-cache, must-revalidate";
const CACHE_IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// Build a static file router that stamps every response with `cache_header`.
fn cached_static_router(dir: &Path, cache_header: &'static str) -> Router {
    let layer = SetResponseHeaderLayer::overriding(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_header),
    );
    Router::new()
        .fallback_service(ServeDir::new(dir))
        .layer(layer)
}

/// The JSON service endpoint. Responses are never cacheable.
fn services_router(state: AppState) -> Router {
    let no_cache =
        SetResponseHeaderLayer::overriding(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    Router::new()
        .route(
            "/services",
            get(service::services_get).post(service::services_post),
        )
        .route(
            "/services/",
            get(service::services_get).post(service::services_post),
        )
        .route("/health", get(service::health))
        .with_state(state)
        .layer(no_cache)
}

/// Build the full application router.
fn build_app(state: AppState, dist_dir: &Path) -> Router {
    Router::new()
        .route_service("/", ServeFile::new(dist_dir.join("index.html")))
        .nest(
            "/assets",
            cached_static_router(&dist_dir.join("assets"), CACHE_IMMUTABLE),
        )
        .merge(services_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::init_from_env().context("invalid configuration")?;

    let db_path = PathBuf::from(&config.db_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let cache = GeocodeCache::open(&db_path)
        .with_context(|| format!("failed to open geocode cache at {}", db_path.display()))?;

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()
        .context("failed to build HTTP client")?;
    let geocoder = Arc::new(GoogleGeocoder::new(
        http.clone(),
        config.geocoder_url.clone(),
        config.geocoder_api_key.clone(),
    ));
    let directory = Arc::new(HttpDirectoryClient::new(
        http,
        config.directory_base_url.clone(),
        Credential::new(config.directory_access_token.clone()),
    ));

    let resolver = GeocodeResolver::new(cache.clone(), geocoder);
    let aggregator = AddressAggregator::new(directory.clone(), resolver);
    let state = AppState {
        service: Arc::new(ServiceProtocol::new(aggregator, directory, config.page_size)),
        cache,
    };
    let app = build_app(state, Path::new(&config.dist_dir));

    let listener = tokio::net::TcpListener::bind(config.bind())
        .await
        .with_context(|| format!("failed to bind {}", config.bind()))?;
    tracing::info!(address = %config.bind(), page_size = config.page_size, "member map service listening");
    axum::serve(listener, app).await?;
    Ok(())
}
