use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use logvec_core::{EngineConfig, InputFormat};
use logvec_server::{build_app, ServerSettings, MAX_K};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const LOG: &str = r#"192.0.2.10 - - [10/Oct/2023:13:55:36 +0000] "GET /index.html HTTP/1.1" 200 512 "-" "Mozilla/5.0 Firefox/118.0"
192.0.2.11 - - [10/Oct/2023:13:55:40 +0000] "GET /api/users HTTP/1.1" 404 0 "-" "curl/8.1.2"
192.0.2.12 - - [10/Oct/2023:13:56:02 +0000] "GET /index.html HTTP/1.1" 200 512 "-" "Mozilla/5.0 Firefox/118.0"
"#;

fn settings(input: &Path, admin_token: Option<&str>) -> ServerSettings {
    ServerSettings {
        input: input.to_path_buf(),
        format: InputFormat::Access,
        fields: vec!["status".into(), "url".into(), "user_agent".into()],
        engine: EngineConfig::default(),
        admin_token: admin_token.map(str::to_string),
    }
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = tower::ServiceExt::oneshot(app, req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Bytes) {
    call(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("access.log");
    fs::write(&log, LOG).unwrap();
    let app = build_app(settings(&log, None)).unwrap();

    let (status, body) = get(app, "/search?q=200&field=status&k=2").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["record_id"].as_u64().unwrap(), 0);
    assert_eq!(arr[1]["record_id"].as_u64().unwrap(), 2);
    assert_eq!(arr[0]["value"].as_str().unwrap(), "200");
    assert_eq!(json["total_hits"].as_u64().unwrap(), 2);
}

#[tokio::test]
async fn unknown_field_is_not_found() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("access.log");
    fs::write(&log, LOG).unwrap();
    let app = build_app(settings(&log, None)).unwrap();

    let (status, body) = get(app, "/search?q=x&field=nonexistent_field&k=1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("nonexistent_field"));
}

#[tokio::test]
async fn fields_and_records_are_exposed() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("access.log");
    fs::write(&log, LOG).unwrap();
    let app = build_app(settings(&log, None)).unwrap();

    let (status, body) = get(app.clone(), "/fields").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    let fields = json.as_array().unwrap();
    assert_eq!(fields.len(), 3);
    assert!(fields.iter().all(|f| f["rows"].as_u64() == Some(3)));

    let (status, body) = get(app.clone(), "/record/1").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["fields"]["url"].as_str().unwrap(), "/api/users");
    assert_eq!(json["fields"]["status"].as_i64().unwrap(), 404);

    let (status, _) = get(app, "/record/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rebuild_requires_token_and_picks_up_new_lines() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("access.log");
    fs::write(&log, LOG).unwrap();
    let app = build_app(settings(&log, Some("secret"))).unwrap();

    let req = Request::post("/index/rebuild").body(Body::empty()).unwrap();
    let (status, _) = call(app.clone(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let extra = r#"192.0.2.13 - - [10/Oct/2023:14:00:00 +0000] "GET /api/orders HTTP/1.1" 500 0 "-" "curl/8.1.2""#;
    fs::write(&log, format!("{LOG}{extra}\n")).unwrap();

    let req = Request::post("/index/rebuild").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, body) = call(app.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["records"].as_u64().unwrap(), 4);

    let (status, body) = get(app, "/search?q=/api/orders&field=url&k=1").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["results"][0]["record_id"].as_u64().unwrap(), 3);
}

#[tokio::test]
async fn k_zero_returns_no_results() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("access.log");
    fs::write(&log, LOG).unwrap();
    let app = build_app(settings(&log, None)).unwrap();

    let (status, body) = get(app, "/search?q=200&field=status&k=0").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["results"].as_array().unwrap().is_empty());
    assert_eq!(json["total_hits"].as_u64().unwrap(), 0);
}

#[tokio::test]
async fn k_is_capped() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("access.log");
    let line = LOG.lines().next().unwrap();
    let big: String = (0..MAX_K + 5).map(|_| format!("{line}\n")).collect();
    fs::write(&log, big).unwrap();
    let app = build_app(settings(&log, None)).unwrap();

    let (status, body) = get(app, &format!("/search?q=200&field=status&k={}", MAX_K * 5)).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["results"].as_array().unwrap().len(), MAX_K);
}
