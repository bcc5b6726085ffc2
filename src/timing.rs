//! Artificial delays against timing side-channels and brute-force guessing.

use rand::{Rng, rngs::OsRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Upper bound, in seconds, for the counter-driven login delay.
pub const MAX_LOGIN_DELAY_SECONDS: u64 = 42;

/// Process-wide count of failed login-family verifications.
///
/// Shared across all tenants and principals: the brake is service-wide so
/// distributed guessing against many accounts still slows down. The counter
/// only ever grows. Increments use relaxed ordering; the defense is
/// statistical and approximate counting is acceptable.
#[derive(Debug, Default)]
pub struct FailedLoginCounter(AtomicU64);

impl FailedLoginCounter {
    #[must_use]
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Compute the pre-verification delay, in seconds, for the given number of
/// failed attempts.
///
/// The function implements the following table:
///
/// | failed attempts | delay            |
/// |-----------------|------------------|
/// | x < 5           | 0                |
/// | 5 <= x <= 42    | random(x, x²≤42) |
/// | x > 42          | 42               |
#[must_use]
pub fn login_delay(failed_attempts: u64) -> u64 {
    if failed_attempts < 5 {
        return 0;
    }

    let min_sleep = failed_attempts.min(MAX_LOGIN_DELAY_SECONDS);
    let max_sleep = failed_attempts
        .saturating_mul(failed_attempts)
        .min(MAX_LOGIN_DELAY_SECONDS);

    OsRng.gen_range(min_sleep..=max_sleep)
}

/// Floor-latency guard for a single login-family response.
///
/// Start it when handling begins; `wait` sleeps whatever remains of the
/// floor so that fast rejections and slow verifications answer in the same
/// time. Holds no lock while sleeping.
#[derive(Debug)]
pub struct UniformAnswer {
    started: Instant,
    floor: Duration,
}

impl UniformAnswer {
    #[must_use]
    pub fn start(floor: Duration) -> Self {
        Self {
            started: Instant::now(),
            floor,
        }
    }

    pub async fn wait(self) {
        let elapsed = self.started.elapsed();
        if let Some(remaining) = self.floor.checked_sub(elapsed) {
            if !remaining.is_zero() {
                tokio::time::sleep(remaining).await;
            }
        }
    }
}
