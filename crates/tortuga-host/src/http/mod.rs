pub mod api;
pub mod files;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use tortuga_kernel::{DeviceRegistry, JobQueue, ReportStore};
use tortuga_store::DynEventLog;

use crate::auth;
use crate::config::HostConfig;
use api::ApiError;

#[derive(Clone)]
pub struct HttpState {
    pub config: Arc<HostConfig>,
    pub registry: Arc<DeviceRegistry>,
    pub jobs: Arc<JobQueue>,
    pub reports: Arc<ReportStore>,
}

impl HttpState {
    pub fn new(config: HostConfig, log: DynEventLog) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(DeviceRegistry::new(Arc::clone(&log))),
            jobs: Arc::new(JobQueue::new(Arc::clone(&log))),
            reports: Arc::new(ReportStore::new(log)),
        }
    }
}

pub fn router(state: HttpState) -> Router {
    // Everything except the index page sits behind the authorization gate.
    let gated = Router::new()
        .nest("/api", api::router())
        .route("/manifest.json", get(files::manifest))
        .route("/files/{*path}", get(files::get_file))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));
    Router::new()
        .merge(gated)
        .route("/", get(files::index))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

async fn require_auth(State(state): State<HttpState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let client_ip = auth::client_ip(request.headers(), peer);
    let presented = auth::presented_token(request.headers(), request.uri().query());
    if auth::is_authorized(&state.config.auth, client_ip, presented.as_deref()) {
        next.run(request).await
    } else {
        tracing::debug!(?client_ip, path = request.uri().path(), "request denied");
        ApiError::Denied.into_response()
    }
}

/// Mirrors the frontend's expectations: reflect the origin (with
/// credentials) when one is sent, otherwise allow any. Preflights for the
/// API are answered here, before the auth gate.
async fn cors(request: Request, next: Next) -> Response {
    let origin = request.headers().get(header::ORIGIN).cloned();
    let preflight =
        request.method() == Method::OPTIONS && request.uri().path().starts_with("/api/");
    let mut response = if preflight {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };
    let headers = response.headers_mut();
    match origin {
        Some(origin) => {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.insert(header::VARY, HeaderValue::from_static("Origin"));
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        None => {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            );
        }
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, X-KARI-TOKEN"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
    );
    response
}

pub fn spawn_http_server(
    addr: SocketAddr,
    app: Router,
    shutdown_tx: broadcast::Sender<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = serve(addr, app, shutdown_tx).await {
            tracing::error!("http server error: {err}");
        }
    })
}

async fn serve(
    addr: SocketAddr,
    app: Router,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), String> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| format!("bind {addr}: {err}"))?;
    tracing::info!("HTTP server listening on http://{}", addr);
    let mut shutdown_rx = shutdown_tx.subscribe();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown_rx.recv().await;
    })
    .await
    .map_err(|err| format!("serve {addr}: {err}"))
}
