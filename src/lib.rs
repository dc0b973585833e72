use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod startup_checks;
pub mod subsample;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub gallery: GalleryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GalleryConfig {
    pub source_directory: PathBuf,
    pub cache_directory: PathBuf,
    #[serde(default = "default_tiny")]
    pub tiny: ImageSizeConfig,
    #[serde(default = "default_lo")]
    pub lo: ImageSizeConfig,
    #[serde(default = "default_hi")]
    pub hi: ImageSizeConfig,
    pub jpeg_quality: Option<u8>,
    #[serde(default = "default_true")]
    pub link_originals: bool,
    /// Embed trimmed EXIF in the largest variant and rotate by orientation.
    #[serde(default = "default_true")]
    pub metadata: bool,
    #[serde(default)]
    pub pregenerate_cache: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ImageSizeConfig {
    pub width: u32,
    pub height: u32,
}

fn default_tiny() -> ImageSizeConfig {
    ImageSizeConfig {
        width: 200,
        height: 48,
    }
}

fn default_lo() -> ImageSizeConfig {
    ImageSizeConfig {
        width: 1000,
        height: 200,
    }
}

fn default_hi() -> ImageSizeConfig {
    ImageSizeConfig {
        width: 1600,
        height: 800,
    }
}

fn default_true() -> bool {
    true
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            source_directory: PathBuf::from("photos"),
            cache_directory: PathBuf::from("subsamples"),
            tiny: default_tiny(),
            lo: default_lo(),
            hi: default_hi(),
            jpeg_quality: Some(85),
            link_originals: true,
            metadata: true,
            pregenerate_cache: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            app: AppConfig {
                name: "Galleria".to_string(),
                log_level: "info".to_string(),
            },
            gallery: GalleryConfig::default(),
        }
    }
}

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub subsamples: subsample::SharedSubsampleCache,
}

pub async fn create_app(config: Config) -> Router {
    let subsamples = Arc::new(subsample::SubsampleCache::new(config.gallery.clone()));
    create_app_with_cache(subsamples)
}

/// Router over an existing cache, so callers can share it with background work.
pub fn create_app_with_cache(subsamples: subsample::SharedSubsampleCache) -> Router {
    let app_state = AppState { subsamples };

    Router::new()
        .route(
            "/raw/{size}/{*path}",
            axum::routing::get(subsample::picture_handler),
        )
        .route(
            "/meta/{*path}",
            axum::routing::get(subsample::metadata_handler),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let method = request.method();
                    let uri = request.uri();
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::info_span!(
                        "http_request",
                        method = %method,
                        uri = %uri,
                        matched_path,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    let method = request.method();
                    let uri = request.uri();
                    let headers = request.headers();
                    let user_agent = headers
                        .get("user-agent")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");
                    let referer = headers
                        .get("referer")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");

                    tracing::info!(
                        target: "access_log",
                        method = %method,
                        path = %uri.path(),
                        query = ?uri.query(),
                        user_agent = %user_agent,
                        referer = %referer,
                        "request"
                    );
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        let status = response.status();
                        let size = response
                            .headers()
                            .get("content-length")
                            .and_then(|h| h.to_str().ok())
                            .unwrap_or("-");

                        tracing::info!(
                            target: "access_log",
                            status = %status,
                            size = %size,
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state)
}
