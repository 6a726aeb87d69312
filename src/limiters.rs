use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::error::RateLimitError;
use crate::rate_limit::{RateLimitConfig, RateLimiter, Sweeper};

// account actions the gateway throttles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimiterKind {
    Login,
    Registration,
    PasswordReset,
    PasswordChange,
}

impl LimiterKind {
    pub const ALL: [LimiterKind; 4] = [
        LimiterKind::Login,
        LimiterKind::Registration,
        LimiterKind::PasswordReset,
        LimiterKind::PasswordChange,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LimiterKind::Login => "login",
            LimiterKind::Registration => "registration",
            LimiterKind::PasswordReset => "password_reset",
            LimiterKind::PasswordChange => "password_change",
        }
    }
}

impl fmt::Display for LimiterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitsSettings {
    pub login: RateLimitConfig,
    pub registration: RateLimitConfig,
    pub password_reset: RateLimitConfig,
    pub password_change: RateLimitConfig,
}

impl LimitsSettings {
    pub fn get(&self, kind: LimiterKind) -> RateLimitConfig {
        match kind {
            LimiterKind::Login => self.login,
            LimiterKind::Registration => self.registration,
            LimiterKind::PasswordReset => self.password_reset,
            LimiterKind::PasswordChange => self.password_change,
        }
    }
}

impl Default for LimitsSettings {
    // 5 per 15 minutes for login/password change, 3 per hour for registration/reset
    fn default() -> Self {
        Self {
            login: RateLimitConfig::new(Duration::from_secs(15 * 60), 5),
            registration: RateLimitConfig::new(Duration::from_secs(60 * 60), 3),
            password_reset: RateLimitConfig::new(Duration::from_secs(60 * 60), 3),
            password_change: RateLimitConfig::new(Duration::from_secs(15 * 60), 5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Limiters {
    login: RateLimiter,
    registration: RateLimiter,
    password_reset: RateLimiter,
    password_change: RateLimiter,
}

impl Limiters {
    pub fn from_settings(settings: &LimitsSettings) -> Result<Self, RateLimitError> {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: &LimitsSettings, clock: Arc<dyn Clock>) -> Result<Self, RateLimitError> {
        let build = |kind: LimiterKind| {
            RateLimiter::build(kind.name(), settings.get(kind), Arc::clone(&clock)).map_err(|e| {
                RateLimitError::Limiter {
                    limiter: kind.name(),
                    source: Box::new(e),
                }
            })
        };

        Ok(Self {
            login: build(LimiterKind::Login)?,
            registration: build(LimiterKind::Registration)?,
            password_reset: build(LimiterKind::PasswordReset)?,
            password_change: build(LimiterKind::PasswordChange)?,
        })
    }

    pub fn get(&self, kind: LimiterKind) -> &RateLimiter {
        match kind {
            LimiterKind::Login => &self.login,
            LimiterKind::Registration => &self.registration,
            LimiterKind::PasswordReset => &self.password_reset,
            LimiterKind::PasswordChange => &self.password_change,
        }
    }

    pub fn spawn_sweepers(&self, interval: Duration) -> Result<Vec<Sweeper>, RateLimitError> {
        LimiterKind::ALL
            .iter()
            .map(|kind| self.get(*kind).spawn_sweeper(interval))
            .collect()
    }

    pub fn log_summary(&self) {
        for kind in LimiterKind::ALL {
            let limiter = self.get(kind);
            info!(
                limiter = kind.name(),
                max_requests = limiter.max_requests(),
                window_secs = limiter.window().as_secs(),
                "limiter configured"
            );
        }
    }
}
