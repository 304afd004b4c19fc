use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use tortuga_core::{now_epoch, time_view};
use tortuga_kernel::KernelError;

use crate::http::HttpState;
use crate::paths;

pub fn router() -> Router<HttpState> {
    Router::new()
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/next", get(next_job))
        .route("/jobs/{id}/report", post(job_report))
        .route("/devices", get(list_devices))
        .route("/devices/{tid}/alias", post(set_alias))
        .route("/devices/{tid}", delete(forget_device))
        .route("/report/status", post(report_status))
        .route("/report/files", post(report_files))
        .route("/reports", get(list_reports))
        .route("/time", get(time_now))
        .route("/tree", get(tree))
}

#[derive(Debug)]
pub enum ApiError {
    Denied,
    MissingField(&'static str),
    NotFound,
    Internal(String),
}

impl From<KernelError> for ApiError {
    fn from(err: KernelError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Denied => (
                StatusCode::UNAUTHORIZED,
                "auth_denied",
                "access denied".to_string(),
            ),
            ApiError::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                "missing_field",
                format!("missing required field '{field}'"),
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not_found", "not found".to_string()),
            ApiError::Internal(message) => {
                tracing::error!("request failed: {message}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        };
        let body = json!({ "code": code, "message": message });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct CreateJobBody {
    #[serde(default)]
    turtle_id: Option<String>,
    #[serde(default)]
    cmd: Option<String>,
    #[serde(default)]
    args: Option<Value>,
}

async fn create_job(
    State(state): State<HttpState>,
    Json(body): Json<CreateJobBody>,
) -> Result<impl IntoResponse, ApiError> {
    let turtle_id = body
        .turtle_id
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingField("turtle_id"))?;
    let cmd = body.cmd.ok_or(ApiError::MissingField("cmd"))?;
    let job = state
        .jobs
        .create(&turtle_id, cmd, body.args.unwrap_or_else(|| json!({})))?;
    Ok((StatusCode::CREATED, Json(job)))
}

async fn list_jobs(State(state): State<HttpState>) -> Result<Json<Value>, ApiError> {
    let jobs = state.jobs.list()?;
    Ok(Json(json!({ "jobs": jobs })))
}

#[derive(Debug, Deserialize)]
struct NextJobQuery {
    #[serde(default)]
    turtle_id: String,
}

async fn next_job(
    State(state): State<HttpState>,
    Query(query): Query<NextJobQuery>,
) -> Result<Json<Value>, ApiError> {
    let job = state.jobs.claim_next(&query.turtle_id)?;
    Ok(Json(json!({ "job": job })))
}

async fn job_report(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    state.jobs.report_progress(&id, body)?;
    Ok(Json(json!({ "ok": true })))
}

async fn list_devices(State(state): State<HttpState>) -> Result<Json<Value>, ApiError> {
    let devices = state.registry.list_devices(now_epoch())?;
    Ok(Json(json!({ "count": devices.len(), "devices": devices })))
}

#[derive(Debug, Deserialize)]
struct AliasBody {
    #[serde(default)]
    alias: String,
}

async fn set_alias(
    State(state): State<HttpState>,
    Path(tid): Path<String>,
    Json(body): Json<AliasBody>,
) -> Result<Json<Value>, ApiError> {
    let alias = state.registry.set_alias(&tid, &body.alias)?;
    Ok(Json(json!({ "ok": true, "alias": alias })))
}

async fn forget_device(
    State(state): State<HttpState>,
    Path(tid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.registry.forget(&tid)?;
    Ok(Json(json!({ "ok": true })))
}

async fn report_status(
    State(state): State<HttpState>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    let turtle_id = reported_id(&body);
    state.registry.report_status(&turtle_id, body)?;
    Ok(Json(json!({ "ok": true })))
}

async fn report_files(
    State(state): State<HttpState>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    let turtle_id = reported_id(&body);
    state.reports.record_files(&turtle_id, body)?;
    Ok(Json(json!({ "ok": true })))
}

async fn list_reports(State(state): State<HttpState>) -> Result<Json<Value>, ApiError> {
    let latest = state.reports.latest()?;
    Ok(Json(json!({ "turtles": latest })))
}

async fn time_now() -> Json<tortuga_core::TimeView> {
    Json(time_view())
}

#[derive(Debug, Deserialize)]
struct TreeQuery {
    #[serde(default)]
    subdir: String,
}

async fn tree(
    State(state): State<HttpState>,
    Query(query): Query<TreeQuery>,
) -> Result<Json<Value>, ApiError> {
    let subdir = query.subdir.trim().trim_matches('/').to_string();
    let base = &state.config.base_dir;
    let root = paths::resolve_under(base, &subdir)
        .filter(|path| path.is_dir())
        .ok_or(ApiError::NotFound)?;
    let files = paths::list_tree(base, &root);
    Ok(Json(json!({ "subdir": subdir, "files": files })))
}

/// Reports carry the device's self-asserted identity in the body; anything
/// unusable is filed under "unknown".
fn reported_id(body: &Map<String, Value>) -> String {
    match body.get("turtle_id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => "unknown".to_string(),
    }
}
