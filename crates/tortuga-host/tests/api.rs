//! Router-level tests: the full HTTP surface over an in-memory event log.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::connect_info::ConnectInfo;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use tortuga_host::config::{AuthConfig, AuthMode, HostConfig};
use tortuga_host::http::{self, HttpState};
use tortuga_store::MemEventLog;

const PUBLIC_PEER: &str = "203.0.113.9:40000";
const PRIVATE_PEER: &str = "192.168.1.5:40000";

fn open_auth() -> AuthConfig {
    AuthConfig {
        mode: AuthMode::Open,
        token: None,
        allow_private: false,
    }
}

fn token_auth(allow_private: bool) -> AuthConfig {
    AuthConfig {
        mode: AuthMode::Token,
        token: Some("secret".into()),
        allow_private,
    }
}

fn router_with(auth: AuthConfig, base_dir: &std::path::Path) -> Router {
    let config = HostConfig {
        bind: "127.0.0.1:0".parse().unwrap(),
        base_dir: base_dir.to_path_buf(),
        static_dir: base_dir.join("static"),
        data_dir: base_dir.join("data"),
        auth,
    };
    http::router(HttpState::new(config, Arc::new(MemEventLog::new())))
}

fn open_router(base_dir: &std::path::Path) -> Router {
    router_with(open_auth(), base_dir)
}

async fn send_from(router: &Router, peer: &str, request: Request<Body>) -> (StatusCode, Value) {
    let mut request = request;
    let peer: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    send_from(router, PUBLIC_PEER, request).await
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn job_lifecycle_over_http() {
    let tmp = TempDir::new().unwrap();
    let router = open_router(tmp.path());

    let (status, created) = send(
        &router,
        post_json("/api/jobs", json!({"turtle_id": "t1", "cmd": "dig", "args": {"depth": 3}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["state"], "queued");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, claimed) = send(&router, get("/api/jobs/next?turtle_id=t1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(claimed["job"]["id"], id.as_str());
    assert_eq!(claimed["job"]["state"], "claimed");
    assert!(claimed["job"]["claim_ts"].is_i64());

    let (status, reported) = send(
        &router,
        post_json(
            &format!("/api/jobs/{id}/report"),
            json!({"final": true, "status": "done", "mined": 12}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reported["ok"], true);

    let (_, listed) = send(&router, get("/api/jobs")).await;
    let jobs = listed["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["state"], "done");
    assert_eq!(jobs[0]["cmd"], "dig");
    assert_eq!(jobs[0]["args"], json!({"depth": 3}));
    assert_eq!(jobs[0]["mined"], 12);
    assert!(jobs[0]["done_ts"].is_i64());
}

#[tokio::test]
async fn create_job_requires_turtle_id_and_cmd() {
    let tmp = TempDir::new().unwrap();
    let router = open_router(tmp.path());

    let (status, body) = send(&router, post_json("/api/jobs", json!({"cmd": "dig"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "missing_field");

    let (status, body) = send(&router, post_json("/api/jobs", json!({"turtle_id": "t1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "missing_field");

    let (_, listed) = send(&router, get("/api/jobs")).await;
    assert!(listed["jobs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn empty_queue_yields_null_job() {
    let tmp = TempDir::new().unwrap();
    let router = open_router(tmp.path());
    let (status, body) = send(&router, get("/api/jobs/next?turtle_id=t1")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["job"].is_null());
}

#[tokio::test]
async fn device_registration_alias_and_forget() {
    let tmp = TempDir::new().unwrap();
    let router = open_router(tmp.path());

    send(
        &router,
        post_json("/api/report/status", json!({"turtle_id": "t1", "fuel": 10, "label": "alpha"})),
    )
    .await;
    send(&router, post_json("/api/devices/t1/alias", json!({"alias": "miner"}))).await;

    let (status, body) = send(&router, get("/api/devices")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    let device = &body["devices"][0];
    assert_eq!(device["id"], "t1");
    assert_eq!(device["alias"], "miner");
    assert_eq!(device["fuel"], 10);
    assert_eq!(device["online"], true);

    let delete = Request::delete("/api/devices/t1").body(Body::empty()).unwrap();
    let (status, body) = send(&router, delete).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (_, body) = send(&router, get("/api/devices")).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn file_reports_round_trip() {
    let tmp = TempDir::new().unwrap();
    let router = open_router(tmp.path());

    send(
        &router,
        post_json("/api/report/files", json!({"turtle_id": "t1", "files": ["startup.lua"]})),
    )
    .await;
    let (status, body) = send(&router, get("/api/reports")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["turtles"]["t1"]["files"], json!(["startup.lua"]));
}

#[tokio::test]
async fn time_endpoint_is_stateless() {
    let tmp = TempDir::new().unwrap();
    let router = open_router(tmp.path());
    let (status, body) = send(&router, get("/api/time")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["epoch"].as_i64().unwrap() > 0);
    assert!(body["epoch_ms"].as_i64().unwrap() > 0);
    assert!(body["iso"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn token_gate_checks_header_query_and_cookie() {
    let tmp = TempDir::new().unwrap();
    let router = router_with(token_auth(false), tmp.path());

    let (status, body) = send(&router, get("/api/time")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "auth_denied");

    let with_header = Request::get("/api/time")
        .header("X-KARI-TOKEN", "secret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&router, with_header).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&router, get("/api/time?t=secret")).await;
    assert_eq!(status, StatusCode::OK);

    let with_cookie = Request::get("/api/time")
        .header(header::COOKIE, "kari_token=secret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&router, with_cookie).await;
    assert_eq!(status, StatusCode::OK);

    let wrong = Request::get("/api/time")
        .header("X-KARI-TOKEN", "nope")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&router, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn denied_mutation_leaves_no_trace_in_the_log() {
    let tmp = TempDir::new().unwrap();
    let router = router_with(token_auth(false), tmp.path());

    let (status, _) = send(
        &router,
        post_json("/api/jobs", json!({"turtle_id": "t1", "cmd": "dig"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, listed) = send(&router, get("/api/jobs?t=secret")).await;
    assert!(listed["jobs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn private_network_bypasses_token_when_allowed() {
    let tmp = TempDir::new().unwrap();
    let router = router_with(token_auth(true), tmp.path());

    let (status, _) = send_from(&router, PRIVATE_PEER, get("/api/time")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_from(&router, PUBLIC_PEER, get("/api/time")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A proxy header naming a public client overrides the private peer.
    let forwarded = Request::get("/api/time")
        .header("X-Forwarded-For", "203.0.113.9")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send_from(&router, PRIVATE_PEER, forwarded).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn preflight_passes_without_auth_and_reflects_origin() {
    let tmp = TempDir::new().unwrap();
    let router = router_with(token_auth(false), tmp.path());

    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/api/jobs")
        .header(header::ORIGIN, "http://dashboard.local")
        .body(Body::empty())
        .unwrap();
    let mut request = preflight;
    request
        .extensions_mut()
        .insert(ConnectInfo::<SocketAddr>(PUBLIC_PEER.parse().unwrap()));
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://dashboard.local"
    );
    assert_eq!(headers.get(header::VARY).unwrap(), "Origin");
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
        "GET, POST, DELETE, OPTIONS"
    );
}

#[tokio::test]
async fn index_is_reachable_without_a_token() {
    let tmp = TempDir::new().unwrap();
    let router = router_with(token_auth(false), tmp.path());
    let mut request = get("/");
    request
        .extensions_mut()
        .insert(ConnectInfo::<SocketAddr>(PUBLIC_PEER.parse().unwrap()));
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn files_are_served_under_base_only() {
    let outer = TempDir::new().unwrap();
    let base = outer.path().join("base");
    std::fs::create_dir(&base).unwrap();
    std::fs::write(base.join("program.lua"), b"print('hi')").unwrap();
    std::fs::write(outer.path().join("secret.txt"), b"no").unwrap();
    let router = open_router(&base);

    let mut request = get("/files/program.lua");
    request
        .extensions_mut()
        .insert(ConnectInfo::<SocketAddr>(PUBLIC_PEER.parse().unwrap()));
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");

    let (status, _) = send(&router, get("/files/../secret.txt")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&router, get("/files/missing.lua")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn manifest_defaults_when_absent() {
    let tmp = TempDir::new().unwrap();
    let router = open_router(tmp.path());
    let (status, body) = send(&router, get("/manifest.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"version": "0.0.0", "files": {}}));

    std::fs::write(
        tmp.path().join("manifest.json"),
        serde_json::to_vec(&json!({"version": "1.2.3", "files": {"a.lua": "abc"}})).unwrap(),
    )
    .unwrap();
    let (_, body) = send(&router, get("/manifest.json")).await;
    assert_eq!(body["version"], "1.2.3");
}

#[tokio::test]
async fn tree_lists_files_and_rejects_escapes() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir(tmp.path().join("lib")).unwrap();
    std::fs::write(tmp.path().join("lib/util.lua"), b"x").unwrap();
    let router = open_router(tmp.path());

    let (status, body) = send(&router, get("/api/tree?subdir=lib")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subdir"], "lib");
    assert_eq!(body["files"][0]["path"], "lib/util.lua");

    let (status, _) = send(&router, get("/api/tree?subdir=..")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
