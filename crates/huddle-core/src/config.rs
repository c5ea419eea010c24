use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::warn;

use huddle_types::Permissions;

pub const MIN_TOKEN_LENGTH: usize = 8;
pub const MAX_TOKEN_LENGTH: usize = 30;
/// Digits-only tokens are dialed in by phone and need more room.
pub const MIN_DIGIT_TOKEN_LENGTH: usize = 10;

/// Settings injected into the coordinator at construction.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// A session without a ping for this long is dead.
    pub session_timeout: Duration,
    pub sweep_interval: Duration,
    /// Hard ceiling for long-poll waits.
    pub long_poll_max: Duration,
    pub token_length: usize,
    pub digits_only_tokens: bool,
    pub federation_enabled: bool,
    /// Default permissions of newly created rooms.
    pub default_permissions: Permissions,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(100),
            sweep_interval: Duration::from_secs(30),
            long_poll_max: Duration::from_secs(30),
            token_length: MIN_TOKEN_LENGTH,
            digits_only_tokens: false,
            federation_enabled: true,
            default_permissions: Permissions::DEFAULT,
        }
    }
}

impl CoreConfig {
    /// Read `HUDDLE_*` variables, keeping the default for anything absent or
    /// unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |name: &str, fallback: Duration| {
            Duration::from_secs(env_or(name, fallback.as_secs()))
        };

        let config = Self {
            session_timeout: secs("HUDDLE_SESSION_TIMEOUT_SECS", defaults.session_timeout),
            sweep_interval: secs("HUDDLE_SWEEP_INTERVAL_SECS", defaults.sweep_interval),
            long_poll_max: secs("HUDDLE_LONG_POLL_MAX_SECS", defaults.long_poll_max),
            token_length: env_or("HUDDLE_TOKEN_LENGTH", defaults.token_length),
            digits_only_tokens: env_or("HUDDLE_DIGITS_ONLY_TOKENS", defaults.digits_only_tokens),
            federation_enabled: env_or("HUDDLE_FEDERATION_ENABLED", defaults.federation_enabled),
            default_permissions: defaults.default_permissions,
        };
        config.normalized()
    }

    /// Clamp values into their supported ranges.
    pub fn normalized(mut self) -> Self {
        let min = if self.digits_only_tokens {
            MIN_DIGIT_TOKEN_LENGTH
        } else {
            MIN_TOKEN_LENGTH
        };
        self.token_length = self.token_length.clamp(min, MAX_TOKEN_LENGTH);
        if self.sweep_interval.is_zero() {
            self.sweep_interval = Duration::from_secs(1);
        }
        self
    }

    /// Sessions last pinged before this instant are dead.
    pub fn session_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let timeout = TimeDelta::from_std(self.session_timeout).unwrap_or(TimeDelta::MAX);
        now.checked_sub_signed(timeout)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// `requested` capped at the long-poll ceiling.
    pub fn clamp_long_poll(&self, requested: Duration) -> Duration {
        requested.min(self.long_poll_max)
    }
}

fn env_or<T: FromStr>(name: &str, fallback: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(var = name, value = %raw, "ignoring unparsable config value");
                fallback
            }
        },
        Err(_) => fallback,
    }
}
