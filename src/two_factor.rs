//! Two-factor challenge issuance and verification.
//!
//! Challenges are ephemeral and keyed per principal: at most one live code
//! exists at a time, and issuing a new one supersedes whatever was pending.
//! The store never delivers codes itself; delivery is the
//! [`CodeSender`](crate::directory::CodeSender) collaborator's job.

use rand::{Rng, rngs::OsRng};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Result of checking a supplied code against the pending challenge.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChallengeVerdict {
    /// Code matched; the challenge is revoked and may never be reused.
    Consumed,
    /// Wrong code; the challenge stays pending so the user may retry.
    Mismatch,
    /// Nothing pending: never issued, already consumed, or expired.
    NonePending,
}

#[derive(Debug)]
struct Challenge {
    code: String,
    issued_at: Instant,
}

/// Pending one-time codes, keyed by principal.
pub struct ChallengeStore {
    ttl: Duration,
    pending: Mutex<HashMap<Uuid, Challenge>>,
}

impl ChallengeStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh six-digit code for `principal`, superseding any prior
    /// unconsumed challenge. Returns the code for out-of-band delivery.
    pub async fn issue(&self, principal: Uuid) -> String {
        let code = format!("{:06}", OsRng.gen_range(0..1_000_000u32));
        let mut pending = self.pending.lock().await;
        pending.retain(|_, challenge| challenge.issued_at.elapsed() < self.ttl);
        pending.insert(
            principal,
            Challenge {
                code: code.clone(),
                issued_at: Instant::now(),
            },
        );
        code
    }

    /// Whether a live (unexpired, unconsumed) challenge exists.
    pub async fn has_pending(&self, principal: Uuid) -> bool {
        let pending = self.pending.lock().await;
        pending
            .get(&principal)
            .is_some_and(|challenge| challenge.issued_at.elapsed() < self.ttl)
    }

    /// Compare `code` against the pending challenge in constant time.
    /// An expired challenge counts as none pending and is dropped.
    pub async fn verify(&self, principal: Uuid, code: &str) -> ChallengeVerdict {
        let mut pending = self.pending.lock().await;
        let Some(challenge) = pending.get(&principal) else {
            return ChallengeVerdict::NonePending;
        };
        if challenge.issued_at.elapsed() >= self.ttl {
            pending.remove(&principal);
            return ChallengeVerdict::NonePending;
        }
        if bool::from(challenge.code.as_bytes().ct_eq(code.as_bytes())) {
            pending.remove(&principal);
            ChallengeVerdict::Consumed
        } else {
            ChallengeVerdict::Mismatch
        }
    }

    /// Drop any pending challenge for `principal`.
    pub async fn revoke(&self, principal: Uuid) {
        self.pending.lock().await.remove(&principal);
    }
}
