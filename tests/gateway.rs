use axum::{
    Json, Router,
    extract::OriginalUri,
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse},
    routing::post,
};
use learnhub_gate::clock::ManualClock;
use learnhub_gate::handlers::{LIMIT_HEADER, REMAINING_HEADER};
use learnhub_gate::limiters::{LimiterKind, Limiters, LimitsSettings};
use learnhub_gate::rate_limit::RateLimitConfig;
use learnhub_gate::router;
use learnhub_gate::state::AppState;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

// Upstream stand-in: echoes the path, body and auth header it received
async fn echo(OriginalUri(uri): OriginalUri, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    (
        StatusCode::CREATED,
        Json(json!({ "path": uri.path(), "body": body, "authorization": auth })),
    )
}

// login also opens a session, like the real app
async fn login(uri: OriginalUri, headers: HeaderMap, body: Json<Value>) -> impl IntoResponse {
    let (status, body) = echo(uri, headers, body).await;
    (status, [(header::SET_COOKIE, "learnhub_session=s3cr3t; HttpOnly; Path=/")], body)
}

async fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn html() -> Html<&'static str> {
    Html("<p>check your inbox</p>")
}

async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(html))
        .route("/api/auth/password-reset", post(no_content))
        .route("/api/auth/password-change", post(echo));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn spawn_gateway(upstream: String, settings: LimitsSettings) -> (SocketAddr, Arc<AppState>) {
    spawn_gateway_with(upstream, Limiters::from_settings(&settings).unwrap()).await
}

async fn spawn_gateway_with(upstream: String, limiters: Limiters) -> (SocketAddr, Arc<AppState>) {
    let state = Arc::new(AppState {
        client: reqwest::Client::new(),
        upstream,
        limiters,
    });
    let app = router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });
    (addr, state)
}

fn tight_limits() -> LimitsSettings {
    let hour = Duration::from_secs(3600);
    LimitsSettings {
        login: RateLimitConfig::new(hour, 2),
        registration: RateLimitConfig::new(hour, 1),
        password_reset: RateLimitConfig::new(hour, 1),
        password_change: RateLimitConfig::new(hour, 1),
    }
}

async fn post_as(client: &reqwest::Client, url: &str, ip: &str) -> reqwest::Response {
    client
        .post(url)
        .header("x-forwarded-for", ip)
        .json(&json!({ "email": "learner@example.com" }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn admitted_requests_are_forwarded() {
    let upstream = spawn_upstream().await;
    let (gateway, _) = spawn_gateway(format!("http://{upstream}"), tight_limits()).await;
    let client = reqwest::Client::new();

    let res = post_as(&client, &format!("http://{gateway}/api/auth/login"), "1.2.3.4").await;
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    assert_eq!(res.headers()[LIMIT_HEADER], "2");
    assert_eq!(res.headers()[REMAINING_HEADER], "1");

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["path"], "/api/auth/login");
    assert_eq!(body["body"]["email"], "learner@example.com");
}

#[tokio::test]
async fn exhausted_quota_returns_429_with_retry_after() {
    let upstream = spawn_upstream().await;
    let (gateway, _) = spawn_gateway(format!("http://{upstream}"), tight_limits()).await;
    let client = reqwest::Client::new();
    let url = format!("http://{gateway}/api/auth/login");

    assert!(post_as(&client, &url, "1.2.3.4").await.status().is_success());
    assert!(post_as(&client, &url, "1.2.3.4").await.status().is_success());

    let res = post_as(&client, &url, "1.2.3.4").await;
    assert_eq!(res.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = res.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!(retry_after > 0 && retry_after <= 3600);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "too many requests");
    assert_eq!(body["limiter"], "login");

    // another client is unaffected
    assert!(post_as(&client, &url, "5.6.7.8").await.status().is_success());
}

#[tokio::test]
async fn login_window_reopens_after_it_elapses() {
    let upstream = spawn_upstream().await;
    let clock = ManualClock::new();
    let limiters = Limiters::with_clock(&LimitsSettings::default(), Arc::new(clock.clone())).unwrap();
    let (gateway, _) = spawn_gateway_with(format!("http://{upstream}"), limiters).await;
    let client = reqwest::Client::new();
    let url = format!("http://{gateway}/api/auth/login");

    for _ in 0..5 {
        assert!(post_as(&client, &url, "1.2.3.4").await.status().is_success());
    }
    assert_eq!(
        post_as(&client, &url, "1.2.3.4").await.status(),
        reqwest::StatusCode::TOO_MANY_REQUESTS
    );

    clock.advance(Duration::from_millis(900_001));
    let res = post_as(&client, &url, "1.2.3.4").await;
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    assert_eq!(res.headers()[REMAINING_HEADER], "4");
}

#[tokio::test]
async fn endpoints_use_independent_limiters() {
    let upstream = spawn_upstream().await;
    let (gateway, state) = spawn_gateway(format!("http://{upstream}"), tight_limits()).await;
    let client = reqwest::Client::new();
    let register = format!("http://{gateway}/api/auth/register");

    assert!(post_as(&client, &register, "9.9.9.9").await.status().is_success());
    assert_eq!(
        post_as(&client, &register, "9.9.9.9").await.status(),
        reqwest::StatusCode::TOO_MANY_REQUESTS
    );

    let login = format!("http://{gateway}/api/auth/login");
    assert!(post_as(&client, &login, "9.9.9.9").await.status().is_success());

    assert_eq!(state.limiters.get(LimiterKind::Registration).tracked_keys(), 1);
    assert_eq!(state.limiters.get(LimiterKind::PasswordChange).tracked_keys(), 0);
}

#[tokio::test]
async fn requests_without_forwarding_headers_are_keyed_by_peer() {
    let upstream = spawn_upstream().await;
    let (gateway, state) = spawn_gateway(format!("http://{upstream}"), tight_limits()).await;
    let client = reqwest::Client::new();
    let url = format!("http://{gateway}/api/auth/password-change");

    let res = client
        .post(&url)
        .header("authorization", "Bearer session-token")
        .json(&json!({ "new_password": "hunter2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["authorization"], "Bearer session-token");

    let res = client
        .post(&url)
        .json(&json!({ "new_password": "hunter3" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);

    let limiter = state.limiters.get(LimiterKind::PasswordChange);
    assert!(!limiter.is_allowed("127.0.0.1"));
}

#[tokio::test]
async fn empty_forwarded_for_shares_one_bucket() {
    let upstream = spawn_upstream().await;
    let (gateway, state) = spawn_gateway(format!("http://{upstream}"), tight_limits()).await;
    let client = reqwest::Client::new();
    let url = format!("http://{gateway}/api/auth/register");

    assert!(post_as(&client, &url, "").await.status().is_success());
    assert_eq!(
        post_as(&client, &url, "").await.status(),
        reqwest::StatusCode::TOO_MANY_REQUESTS
    );
    assert!(!state.limiters.get(LimiterKind::Registration).is_allowed(""));
}

#[tokio::test]
async fn upstream_response_passes_through_unchanged() {
    let upstream = spawn_upstream().await;
    let (gateway, _) = spawn_gateway(format!("http://{upstream}"), tight_limits()).await;
    let client = reqwest::Client::new();

    let res = post_as(&client, &format!("http://{gateway}/api/auth/login"), "4.4.4.4").await;
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    assert_eq!(
        res.headers()["set-cookie"],
        "learnhub_session=s3cr3t; HttpOnly; Path=/"
    );
    assert_eq!(res.headers()["content-type"], "application/json");

    let res = post_as(&client, &format!("http://{gateway}/api/auth/password-reset"), "4.4.4.4").await;
    assert_eq!(res.status(), reqwest::StatusCode::NO_CONTENT);
    assert!(res.bytes().await.unwrap().is_empty());

    let res = post_as(&client, &format!("http://{gateway}/api/auth/register"), "4.4.4.4").await;
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    assert!(res.headers()["content-type"].to_str().unwrap().starts_with("text/html"));
    assert_eq!(res.headers()[REMAINING_HEADER], "0");
    assert_eq!(res.text().await.unwrap(), "<p>check your inbox</p>");
}

#[tokio::test]
async fn unreachable_upstream_maps_to_bad_gateway() {
    // nothing is expected to listen on the discard port
    let (dead, _) = spawn_gateway("http://127.0.0.1:9".to_string(), tight_limits()).await;
    let client = reqwest::Client::new();

    let res = post_as(&client, &format!("http://{dead}/api/auth/login"), "1.1.1.1").await;
    assert_eq!(res.status(), reqwest::StatusCode::BAD_GATEWAY);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("upstream request failed"));
}

#[tokio::test]
async fn health_reports_tracked_keys() {
    let upstream = spawn_upstream().await;
    let (gateway, _) = spawn_gateway(format!("http://{upstream}"), LimitsSettings::default()).await;
    let client = reqwest::Client::new();

    post_as(&client, &format!("http://{gateway}/api/auth/login"), "2.2.2.2").await;

    let body: Value = client
        .get(format!("http://{gateway}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["tracked_keys"]["login"], 1);
    assert_eq!(body["tracked_keys"]["registration"], 0);
}

#[tokio::test]
async fn metrics_endpoint_exposes_limiter_counters() {
    let upstream = spawn_upstream().await;
    let (gateway, _) = spawn_gateway(format!("http://{upstream}"), tight_limits()).await;
    let client = reqwest::Client::new();

    post_as(&client, &format!("http://{gateway}/api/auth/login"), "3.3.3.3").await;

    let text = client
        .get(format!("http://{gateway}/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.contains("learnhub_gate_admissions_total"));
    assert!(text.contains("learnhub_gate_requests_total"));
}
