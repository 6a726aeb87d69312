use clap::Parser;
use std::time::Duration;

use crate::limiters::LimitsSettings;
use crate::rate_limit::RateLimitConfig;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "learnhub-gate")]
#[command(about = "Rate-limiting gateway for the LearnHub account endpoints")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "LEARNHUB_GATE_PORT", default_value_t = 8080)]
    pub port: u16,

    // Base URL of the LearnHub application that admitted requests are forwarded to
    #[arg(short, long, env = "LEARNHUB_GATE_UPSTREAM", default_value = "http://localhost:3000")]
    pub upstream: String,

    // Upstream request timeout in seconds
    #[arg(long, env = "LEARNHUB_GATE_UPSTREAM_TIMEOUT", default_value_t = 10)]
    pub upstream_timeout: u64,

    // Login window in seconds / max attempts per window
    #[arg(long, env = "LEARNHUB_GATE_LOGIN_WINDOW", default_value_t = 900)]
    pub login_window: u64,
    #[arg(long, env = "LEARNHUB_GATE_LOGIN_LIMIT", default_value_t = 5)]
    pub login_limit: u32,

    // Registration window in seconds / max attempts per window
    #[arg(long, env = "LEARNHUB_GATE_REGISTRATION_WINDOW", default_value_t = 3600)]
    pub registration_window: u64,
    #[arg(long, env = "LEARNHUB_GATE_REGISTRATION_LIMIT", default_value_t = 3)]
    pub registration_limit: u32,

    // Password reset window in seconds / max attempts per window
    #[arg(long, env = "LEARNHUB_GATE_PASSWORD_RESET_WINDOW", default_value_t = 3600)]
    pub password_reset_window: u64,
    #[arg(long, env = "LEARNHUB_GATE_PASSWORD_RESET_LIMIT", default_value_t = 3)]
    pub password_reset_limit: u32,

    // Password change window in seconds / max attempts per window
    #[arg(long, env = "LEARNHUB_GATE_PASSWORD_CHANGE_WINDOW", default_value_t = 900)]
    pub password_change_window: u64,
    #[arg(long, env = "LEARNHUB_GATE_PASSWORD_CHANGE_LIMIT", default_value_t = 5)]
    pub password_change_limit: u32,

    // How often expired keys are swept, in seconds
    #[arg(long, env = "LEARNHUB_GATE_SWEEP_INTERVAL", default_value_t = 60)]
    pub sweep_interval: u64,
}

impl Args {
    // zero values pass through here and are rejected when the limiters are built
    pub fn limits(&self) -> LimitsSettings {
        let config = |window: u64, limit: u32| RateLimitConfig::new(Duration::from_secs(window), limit);
        LimitsSettings {
            login: config(self.login_window, self.login_limit),
            registration: config(self.registration_window, self.registration_limit),
            password_reset: config(self.password_reset_window, self.password_reset_limit),
            password_change: config(self.password_change_window, self.password_change_limit),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }

    // trailing slash dropped so paths can be appended as-is
    pub fn upstream_base(&self) -> String {
        let url = self.upstream.trim().trim_end_matches('/');
        if url.starts_with("http") {
            url.to_string()
        } else {
            format!("http://{}", url)
        }
    }
}
