use super::{CacheError, is_picture, sanitize_relative_path};
use crate::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, error};

#[derive(Debug, Serialize)]
pub struct PictureMetadataResponse {
    pub time: String,
    pub focal: String,
    pub expo: String,
    pub fnumber: String,
    pub title: String,
}

pub async fn picture_handler(
    State(app_state): State<AppState>,
    Path((size, path)): Path<(String, String)>,
) -> impl IntoResponse {
    app_state.subsamples.serve_picture(&path, &size).await
}

pub async fn metadata_handler(
    State(app_state): State<AppState>,
    Path(path): Path<String>,
) -> Response {
    let relative_path = match sanitize_relative_path(&path) {
        Ok(path) => path,
        Err(_) => return (StatusCode::FORBIDDEN, "Forbidden").into_response(),
    };
    if !is_picture(relative_path) {
        return (StatusCode::NOT_FOUND, "Picture not found").into_response();
    }

    match app_state.subsamples.picture_metadata(relative_path).await {
        Ok(record) => {
            let display = record.display();
            Json(PictureMetadataResponse {
                title: record.title(),
                time: display.time,
                focal: display.focal,
                expo: display.expo,
                fnumber: display.fnumber,
            })
            .into_response()
        }
        Err(e @ CacheError::SourceMissing(_)) => {
            debug!("{}", e);
            (StatusCode::NOT_FOUND, "Picture not found").into_response()
        }
        Err(e) => {
            error!("Failed to read metadata of {}: {}", relative_path, e);
            (StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}
