//! Process-wide store of active sessions.
//!
//! Sessions are owned by the store for their whole lifetime; callers only
//! ever hold clones. Identifiers are 32 random bytes, URL-safe base64, and
//! unique among live sessions. The raw identifier is the bearer secret, so
//! descriptors are the only thing handed across the wire.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::keys::KeyMaterial;
use crate::types::{Role, TenantId};

/// An active, authenticated session.
///
/// Key material lives only in memory and only for as long as the session
/// does; it is shared, never copied, across clones.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: String,
    pub tenant: TenantId,
    pub principal: Uuid,
    pub role: Role,
    pub password_change_needed: bool,
    pub key_material: Option<Arc<KeyMaterial>>,
    created_at: Instant,
    last_seen_at: Instant,
}

impl Session {
    /// When the session was first issued. Identifier rotation preserves this.
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Serialize for the routing layer.
    ///
    /// Key material is included only when `include_key_material` is set;
    /// callers pass `true` exclusively from the response that created or
    /// refreshed the session, never from a lookup.
    #[must_use]
    pub fn descriptor(&self, include_key_material: bool) -> SessionDescriptor {
        let key_material = if include_key_material {
            self.key_material
                .as_ref()
                .map(|key| STANDARD.encode(key.as_bytes()))
        } else {
            None
        };
        SessionDescriptor {
            session_id: self.id.clone(),
            tenant: self.tenant,
            role: self.role,
            password_change_needed: self.password_change_needed,
            key_material,
        }
    }
}

/// The wire form of a session.
#[derive(Clone, Debug, Serialize)]
pub struct SessionDescriptor {
    pub session_id: String,
    pub tenant: TenantId,
    pub role: Role,
    pub password_change_needed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_material: Option<String>,
}

/// Keyed collection of live sessions with idle expiry.
pub struct SessionStore {
    idle_ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            idle_ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The raw value is the bearer secret; only ever returned to the caller
    /// that authenticated.
    fn generate_session_id() -> Result<String> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate session id")?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    fn unused_id(sessions: &HashMap<String, Session>) -> Result<String> {
        loop {
            let id = Self::generate_session_id()?;
            if !sessions.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    /// Issue a new session. Idle sessions are swept opportunistically on the
    /// way in.
    pub async fn create(
        &self,
        tenant: TenantId,
        principal: Uuid,
        role: Role,
        password_change_needed: bool,
        key_material: Option<Arc<KeyMaterial>>,
    ) -> Result<Session> {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, session| session.last_seen_at.elapsed() < self.idle_ttl);
        let id = Self::unused_id(&sessions)?;
        let now = Instant::now();
        let session = Session {
            id: id.clone(),
            tenant,
            principal,
            role,
            password_change_needed,
            key_material,
            created_at: now,
            last_seen_at: now,
        };
        sessions.insert(id, session.clone());
        Ok(session)
    }

    /// Look up a live session and record the activity.
    pub async fn get(&self, id: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(id)?;
        if session.last_seen_at.elapsed() >= self.idle_ttl {
            sessions.remove(id);
            return None;
        }
        session.last_seen_at = Instant::now();
        Some(session.clone())
    }

    /// Rotate a session's identifier.
    ///
    /// The old identifier dies and the new one goes live under a single lock
    /// acquisition, so no caller can observe both as valid and concurrent
    /// regenerations of the same identifier cannot both succeed.
    pub async fn regenerate(&self, id: &str) -> Result<Option<Session>> {
        let mut sessions = self.sessions.lock().await;
        let Some(mut session) = sessions.remove(id) else {
            return Ok(None);
        };
        if session.last_seen_at.elapsed() >= self.idle_ttl {
            return Ok(None);
        }
        let new_id = Self::unused_id(&sessions)?;
        session.id = new_id.clone();
        session.last_seen_at = Instant::now();
        sessions.insert(new_id, session.clone());
        Ok(Some(session))
    }

    /// Drop a session. Returns whether it was live.
    pub async fn revoke(&self, id: &str) -> bool {
        self.sessions.lock().await.remove(id).is_some()
    }

    /// Drop every session idle past the configured threshold.
    pub async fn sweep(&self) {
        self.sessions
            .lock()
            .await
            .retain(|_, session| session.last_seen_at.elapsed() < self.idle_ttl);
    }

    pub async fn live_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
