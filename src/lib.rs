pub mod client_key;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod limiters;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::handlers::{
    LOGIN_PATH, PASSWORD_CHANGE_PATH, PASSWORD_RESET_PATH, REGISTER_PATH, health_handler,
    login_handler, metrics_handler, password_change_handler, password_reset_handler,
    register_handler,
};
use crate::state::AppState;

// Serve with `into_make_service_with_connect_info::<SocketAddr>()`, the auth
// handlers fall back to the peer address for their key.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(LOGIN_PATH, post(login_handler))
        .route(REGISTER_PATH, post(register_handler))
        .route(PASSWORD_RESET_PATH, post(password_reset_handler))
        .route(PASSWORD_CHANGE_PATH, post(password_change_handler))
        .with_state(state)
}
