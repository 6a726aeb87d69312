use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

use crate::models::{RateLimitedBody, UpstreamErrorBody};

// Limiter misconfiguration, caught at construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("rate limit window must be greater than zero")]
    ZeroWindow,

    #[error("rate limit window {window:?} exceeds the maximum of {max:?}")]
    WindowTooLarge { window: Duration, max: Duration },

    #[error("rate limit quota must be greater than zero")]
    ZeroQuota,

    #[error("sweep interval must be greater than zero")]
    ZeroSweepInterval,

    #[error("invalid limits for {limiter}: {source}")]
    Limiter {
        limiter: &'static str,
        #[source]
        source: Box<RateLimitError>,
    },
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("too many requests")]
    RateLimited {
        limiter: &'static str,
        retry_after: Duration,
    },

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

// seconds for Retry-After, never 0 while still limited
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 || secs == 0 {
        secs + 1
    } else {
        secs
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::RateLimited {
                limiter,
                retry_after,
            } => {
                let secs = retry_after_secs(retry_after);
                let body = Json(RateLimitedBody {
                    error: "too many requests".to_string(),
                    limiter: limiter.to_string(),
                    retry_after_secs: secs,
                });
                let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));
                response
            }
            GatewayError::Upstream(_) => {
                let body = Json(UpstreamErrorBody {
                    error: self.to_string(),
                });
                (StatusCode::BAD_GATEWAY, body).into_response()
            }
        }
    }
}
