use axum::http::HeaderMap;
use std::net::SocketAddr;

pub const FORWARDED_FOR: &str = "x-forwarded-for";
pub const REAL_IP: &str = "x-real-ip";

// first X-Forwarded-For hop, then X-Real-IP, then the peer address.
// an empty or non-utf8 header gives "", one bucket shared by all such callers
pub fn client_key(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(value) = headers.get(FORWARDED_FOR) {
        return value
            .to_str()
            .ok()
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
    }

    if let Some(value) = headers.get(REAL_IP) {
        return value
            .to_str()
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
    }

    peer.ip().to_string()
}
