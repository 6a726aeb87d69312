mod auth;
mod health;
mod metrics;

pub use auth::{
    LIMIT_HEADER, LOGIN_PATH, PASSWORD_CHANGE_PATH, PASSWORD_RESET_PATH, REGISTER_PATH,
    REMAINING_HEADER, login_handler, password_change_handler, password_reset_handler,
    register_handler,
};
pub use health::health_handler;
pub use metrics::metrics_handler;
