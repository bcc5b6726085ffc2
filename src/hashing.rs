//! Credential hash schemes.
//!
//! Every stored credential carries a per-record scheme tag so records can be
//! migrated one at a time instead of in a single cutover. Hashing is
//! deterministic for a given `(scheme, salt)` pair; receipt resolution
//! relies on this to turn a candidate receipt into a fixed set of hashes
//! that can be matched with one set-membership query.

use anyhow::{Result, anyhow};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use tracing::error;

const ARGON2_MEM_COST_KIB: u32 = 19_456;
const ARGON2_TIME_COST: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;
const HASH_OUTPUT_LEN: usize = 32;

/// Primary tenants created before this instant (2019-03-05) may hold hashes
/// affected by the byte-string literal encoding defect; see
/// [`verify_secret_bytes_literal`].
pub const LEGACY_BYTES_CUTOVER: i64 = 1_551_740_400;

/// Per-record hash scheme tag.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashScheme {
    Argon2id,
    LegacySha512,
}

impl HashScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Argon2id => "argon2id",
            Self::LegacySha512 => "legacy_sha512",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim() {
            "argon2id" => Some(Self::Argon2id),
            "legacy_sha512" => Some(Self::LegacySha512),
            _ => None,
        }
    }
}

pub(crate) fn argon2id() -> Result<Argon2<'static>> {
    let params = Params::new(
        ARGON2_MEM_COST_KIB,
        ARGON2_TIME_COST,
        ARGON2_PARALLELISM,
        Some(HASH_OUTPUT_LEN),
    )
    .map_err(|err| anyhow!("invalid Argon2id params: {err}"))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a secret under the given scheme and salt.
///
/// Salts must be at least eight bytes. The output is a base64 string and is
/// deterministic for a given `(scheme, salt)` pair.
pub fn hash_secret(scheme: HashScheme, secret: &str, salt: &str) -> Result<String> {
    match scheme {
        HashScheme::Argon2id => {
            let mut out = [0u8; HASH_OUTPUT_LEN];
            argon2id()?
                .hash_password_into(secret.as_bytes(), salt.as_bytes(), &mut out)
                .map_err(|err| anyhow!("Argon2id hashing failed: {err}"))?;
            Ok(STANDARD.encode(out))
        }
        HashScheme::LegacySha512 => {
            let mut hasher = Sha512::new();
            hasher.update(salt.as_bytes());
            hasher.update(secret.as_bytes());
            Ok(STANDARD.encode(hasher.finalize()))
        }
    }
}

/// Recompute the hash of `secret` and compare it against `stored` in
/// constant time. A hashing failure counts as a mismatch.
pub fn verify_secret(scheme: HashScheme, secret: &str, salt: &str, stored: &str) -> bool {
    match hash_secret(scheme, secret, salt) {
        Ok(candidate) => bool::from(candidate.as_bytes().ct_eq(stored.as_bytes())),
        Err(err) => {
            error!("secret verification failed to hash: {err:#}");
            false
        }
    }
}

/// Deprecated bug-compat fallback, only consulted for records predating
/// [`LEGACY_BYTES_CUTOVER`].
///
/// A historic encoding defect persisted some credential hashes wrapped in a
/// byte-string literal (`b'<hash>'`). Those records never match the plain
/// comparison, so this path retries with the wrapper applied to the freshly
/// computed hash. Delete once all affected records have been re-hashed.
pub fn verify_secret_bytes_literal(
    scheme: HashScheme,
    secret: &str,
    salt: &str,
    stored: &str,
) -> bool {
    match hash_secret(scheme, secret, salt) {
        Ok(candidate) => {
            let wrapped = format!("b'{candidate}'");
            bool::from(wrapped.as_bytes().ct_eq(stored.as_bytes()))
        }
        Err(err) => {
            error!("secret verification failed to hash: {err:#}");
            false
        }
    }
}
