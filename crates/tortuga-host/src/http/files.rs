//! Manifest, file, and index serving under the configured base directory.

use std::io::ErrorKind;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use serde_json::{Value, json};

use crate::http::HttpState;
use crate::http::api::ApiError;
use crate::paths;

pub async fn manifest(State(state): State<HttpState>) -> Result<Response, ApiError> {
    let path = state.config.base_dir.join("manifest.json");
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let value: Value = serde_json::from_slice(&bytes)
                .map_err(|err| ApiError::Internal(format!("manifest.json: {err}")))?;
            Ok(Json(value).into_response())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            Ok(Json(json!({ "version": "0.0.0", "files": {} })).into_response())
        }
        Err(err) => Err(ApiError::Internal(format!("manifest.json: {err}"))),
    }
}

pub async fn get_file(
    State(state): State<HttpState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let target = paths::resolve_under(&state.config.base_dir, &path)
        .filter(|target| target.is_file())
        .ok_or(ApiError::NotFound)?;
    let bytes = tokio::fs::read(&target)
        .await
        .map_err(|err| ApiError::Internal(format!("read {}: {err}", target.display())))?;
    let mime = mime_guess::from_path(&target).first_or_octet_stream();
    Ok((
        [
            (header::CONTENT_TYPE, mime.as_ref()),
            (header::CACHE_CONTROL, "no-store"),
        ],
        bytes,
    )
        .into_response())
}

/// Unauthenticated landing page: the frontend when present, otherwise a
/// small status page.
pub async fn index(State(state): State<HttpState>) -> Response {
    let page = state.config.static_dir.join("index.html");
    match tokio::fs::read(&page).await {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            bytes,
        )
            .into_response(),
        Err(_) => {
            let auth = &state.config.auth;
            Html(format!(
                "<h1>Tortuga control server</h1>\
                 <p>base dir: {}</p>\
                 <p>auth mode: {:?}, allow_private={}, token_set={}</p>\
                 <p>Try <code>/manifest.json</code>, <code>/api/devices</code>, \
                 <code>/api/time</code></p>",
                state.config.base_dir.display(),
                auth.mode,
                auth.allow_private,
                if auth.token_set() { "yes" } else { "no" },
            ))
            .into_response()
        }
    }
}
