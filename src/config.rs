//! Login and session configuration.

use std::time::Duration;

const DEFAULT_ANSWER_FLOOR_MS: u64 = 150;
const DEFAULT_SESSION_IDLE_TTL_SECONDS: u64 = 60 * 60;
const DEFAULT_CHALLENGE_TTL_SECONDS: u64 = 5 * 60;

/// Configuration for the authentication core, loaded once at startup.
///
/// `two_factor_auth` and `encryption` are platform-wide switches: the first
/// gates whether the two-factor challenge is evaluated at all, the second
/// whether key recovery runs after credential verification. Per-principal
/// enrollment still applies on top of both.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    answer_floor_ms: u64,
    session_idle_ttl_seconds: u64,
    challenge_ttl_seconds: u64,
    two_factor_auth: bool,
    encryption: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            answer_floor_ms: DEFAULT_ANSWER_FLOOR_MS,
            session_idle_ttl_seconds: DEFAULT_SESSION_IDLE_TTL_SECONDS,
            challenge_ttl_seconds: DEFAULT_CHALLENGE_TTL_SECONDS,
            two_factor_auth: true,
            encryption: true,
        }
    }

    /// Floor latency every login-family response must consume, success or
    /// failure.
    #[must_use]
    pub fn with_answer_floor_ms(mut self, millis: u64) -> Self {
        self.answer_floor_ms = millis;
        self
    }

    #[must_use]
    pub fn with_session_idle_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_idle_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_challenge_ttl_seconds(mut self, seconds: u64) -> Self {
        self.challenge_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_two_factor_auth(mut self, enabled: bool) -> Self {
        self.two_factor_auth = enabled;
        self
    }

    #[must_use]
    pub fn with_encryption(mut self, enabled: bool) -> Self {
        self.encryption = enabled;
        self
    }

    #[must_use]
    pub fn answer_floor(&self) -> Duration {
        Duration::from_millis(self.answer_floor_ms)
    }

    #[must_use]
    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_seconds)
    }

    #[must_use]
    pub fn challenge_ttl(&self) -> Duration {
        Duration::from_secs(self.challenge_ttl_seconds)
    }

    #[must_use]
    pub fn two_factor_auth(&self) -> bool {
        self.two_factor_auth
    }

    #[must_use]
    pub fn encryption(&self) -> bool {
        self.encryption
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::AuthConfig;
    use std::time::Duration;

    #[test]
    fn defaults_and_overrides() {
        let config = AuthConfig::new();
        assert_eq!(config.answer_floor(), Duration::from_millis(150));
        assert_eq!(config.session_idle_ttl(), Duration::from_secs(3600));
        assert_eq!(config.challenge_ttl(), Duration::from_secs(300));
        assert!(config.two_factor_auth());
        assert!(config.encryption());

        let config = config
            .with_answer_floor_ms(0)
            .with_session_idle_ttl_seconds(60)
            .with_challenge_ttl_seconds(30)
            .with_two_factor_auth(false)
            .with_encryption(false);

        assert_eq!(config.answer_floor(), Duration::ZERO);
        assert_eq!(config.session_idle_ttl(), Duration::from_secs(60));
        assert_eq!(config.challenge_ttl(), Duration::from_secs(30));
        assert!(!config.two_factor_auth());
        assert!(!config.encryption());
    }
}
