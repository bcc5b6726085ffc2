//! Session-bound recovery of the per-identity private key.
//!
//! The login credential doubles as the decryption secret: a symmetric key
//! is derived from it with Argon2id and used to open the at-rest encrypted
//! private key blob. Recovery is a soft path: encryption may be disabled
//! platform-wide, so absence of key material is never an authentication
//! failure.

use anyhow::{Context, Result, anyhow};
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit},
};
use rand::{RngCore, rngs::OsRng};
use std::fmt;
use std::sync::Arc;
use tracing::warn;
use zeroize::Zeroize;

use crate::hashing::argon2id;

pub const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;

/// Decrypted private-key bytes. Held only in memory, zeroized on drop,
/// redacted from debug output.
pub struct KeyMaterial {
    bytes: Vec<u8>,
}

impl KeyMaterial {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive a 256-bit symmetric key from a raw credential and the identity's
/// stored salt via Argon2id. Deterministic, so the same credential always
/// reopens the same blob.
pub fn derive_credential_key(secret: &str, salt: &str) -> Result<[u8; KEY_SIZE]> {
    let mut key = [0u8; KEY_SIZE];
    argon2id()?
        .hash_password_into(secret.as_bytes(), salt.as_bytes(), &mut key)
        .map_err(|err| anyhow!("credential key derivation failed: {err}"))?;
    Ok(key)
}

/// Encrypt a private key under a derived symmetric key.
/// Returns `nonce (12 bytes) || ciphertext`.
pub fn encrypt_private_key(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng
        .try_fill_bytes(&mut nonce_bytes)
        .context("failed to generate nonce")?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|err| anyhow!("private key encryption failed: {err}"))?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a `nonce || ciphertext` private key blob.
pub fn decrypt_private_key(key: &[u8; KEY_SIZE], blob: &[u8]) -> Result<KeyMaterial> {
    if blob.len() < NONCE_SIZE {
        return Err(anyhow!("private key blob too short"));
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|err| anyhow!("private key decryption failed: {err}"))?;

    Ok(KeyMaterial::new(plaintext))
}

/// Derive and decrypt, swallowing failures.
///
/// Returns `None` when there is no blob or when derivation/decryption
/// fails; the session is issued either way.
pub fn recover_private_key(
    secret: &str,
    salt: &str,
    blob: Option<&[u8]>,
) -> Option<Arc<KeyMaterial>> {
    let blob = blob?;
    let recovered = derive_credential_key(secret, salt)
        .and_then(|key| decrypt_private_key(&key, blob));
    match recovered {
        Ok(material) => Some(Arc::new(material)),
        Err(err) => {
            warn!("private key recovery failed, issuing session without key material: {err:#}");
            None
        }
    }
}
