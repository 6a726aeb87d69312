use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Body of a 429 answer
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RateLimitedBody {
    pub error: String,
    pub limiter: String,
    pub retry_after_secs: u64,
}

// Body of a 502 answer
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct UpstreamErrorBody {
    pub error: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub tracked_keys: BTreeMap<String, usize>, // limiter name -> keys held
}
