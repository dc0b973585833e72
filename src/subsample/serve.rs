use super::{SubsampleCache, is_picture, sanitize_relative_path};
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::path::Path;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

impl SubsampleCache {
    /// Main entry point for serving pictures
    pub async fn serve_picture(&self, relative_path: &str, size: &str) -> Response {
        // Security check
        let relative_path = match sanitize_relative_path(relative_path) {
            Ok(path) => path,
            Err(_) => {
                debug!("Rejected picture path: {:?}", relative_path);
                return (StatusCode::FORBIDDEN, "Forbidden").into_response();
            }
        };

        if !is_picture(relative_path) {
            return (StatusCode::NOT_FOUND, "Picture not found").into_response();
        }

        match self.locate_or_build(relative_path, size).await {
            Ok(path) => self.serve_file(&path).await,
            Err(e) if e.is_not_found() => {
                debug!("Not serving {} at {}: {}", relative_path, size, e);
                (StatusCode::NOT_FOUND, "Picture not found").into_response()
            }
            Err(e) => {
                error!("Failed to produce {} variant of {}: {}", size, relative_path, e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to process picture").into_response()
            }
        }
    }

    /// Stream a file with content type and cache headers
    pub(crate) async fn serve_file(&self, path: &Path) -> Response {
        let mime_type = mime_guess::from_path(path).first_or_octet_stream();

        match File::open(path).await {
            Ok(file) => {
                let metadata = match file.metadata().await {
                    Ok(m) => m,
                    Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR).into_response(),
                };

                let stream = ReaderStream::new(file);
                let body = Body::from_stream(stream);

                let mut headers = HeaderMap::new();
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_str(mime_type.as_ref())
                        .unwrap_or(HeaderValue::from_static("application/octet-stream")),
                );
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()));
                // Artifacts are rewritten in place when their source changes
                headers.insert(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("public, max-age=86400"),
                );

                (StatusCode::OK, headers, body).into_response()
            }
            Err(e) => {
                error!("Failed to open file: {:?}, error: {}", path, e);
                (StatusCode::NOT_FOUND).into_response()
            }
        }
    }
}
