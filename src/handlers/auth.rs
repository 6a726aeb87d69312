use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::client_key::client_key;
use crate::error::GatewayError;
use crate::limiters::LimiterKind;
use crate::metrics::{ADMISSIONS, DENIALS, REQUEST_TOTAL, TRACKED_KEYS, UPSTREAM_LATENCY};
use crate::rate_limit::RateLimitDecision;
use crate::state::AppState;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const PASSWORD_RESET_PATH: &str = "/api/auth/password-reset";
pub const PASSWORD_CHANGE_PATH: &str = "/api/auth/password-change";

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

// hop-by-hop and framing headers are set per connection, everything else passes through
const HOP_HEADERS: [HeaderName; 10] = [
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::HOST,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    HeaderName::from_static("keep-alive"),
];

fn end_to_end(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in &HOP_HEADERS {
        out.remove(name);
    }
    out
}

// Ask the limiter, then hand the request to the upstream app unchanged
async fn throttle_and_forward(
    state: &AppState,
    kind: LimiterKind,
    path: &str,
    peer: SocketAddr,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    REQUEST_TOTAL.inc();

    let key = client_key(headers, peer);
    let limiter = state.limiters.get(kind);
    let decision = limiter.check(&key);
    TRACKED_KEYS
        .with_label_values(&[kind.name()])
        .set(limiter.tracked_keys() as f64);

    let (limit, remaining) = match decision {
        RateLimitDecision::Allowed { limit, remaining } => (limit, remaining),
        RateLimitDecision::Limited { retry_after, .. } => {
            DENIALS.with_label_values(&[kind.name()]).inc();
            warn!(limiter = kind.name(), %key, ?retry_after, "rate limit exceeded");
            return Err(GatewayError::RateLimited {
                limiter: kind.name(),
                retry_after,
            });
        }
    };
    ADMISSIONS.with_label_values(&[kind.name()]).inc();
    debug!(limiter = kind.name(), %key, remaining, "request admitted");

    let start_time = Instant::now();
    let res = state
        .client
        .post(format!("{}{}", state.upstream, path))
        .headers(end_to_end(headers))
        .body(body)
        .send()
        .await?;
    let status = res.status();
    let upstream_headers = end_to_end(res.headers());
    let upstream_body = res.bytes().await?;
    UPSTREAM_LATENCY.observe(start_time.elapsed().as_secs_f64());

    let mut response = Response::new(Body::from(upstream_body));
    *response.status_mut() = status;
    *response.headers_mut() = upstream_headers;
    response
        .headers_mut()
        .insert(LIMIT_HEADER, HeaderValue::from(limit));
    response
        .headers_mut()
        .insert(REMAINING_HEADER, HeaderValue::from(remaining));
    Ok(response)
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    throttle_and_forward(&state, LimiterKind::Login, LOGIN_PATH, peer, &headers, body).await
}

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    throttle_and_forward(
        &state,
        LimiterKind::Registration,
        REGISTER_PATH,
        peer,
        &headers,
        body,
    )
    .await
}

pub async fn password_reset_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    throttle_and_forward(
        &state,
        LimiterKind::PasswordReset,
        PASSWORD_RESET_PATH,
        peer,
        &headers,
        body,
    )
    .await
}

pub async fn password_change_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    throttle_and_forward(
        &state,
        LimiterKind::PasswordChange,
        PASSWORD_CHANGE_PATH,
        peer,
        &headers,
        body,
    )
    .await
}
