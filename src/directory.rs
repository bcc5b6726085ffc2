//! Contracts for the external collaborators the login flows consume.
//!
//! Persistent storage of principals, submissions and tenants lives outside
//! this crate; the flows only see the narrow query interface below. Outbound
//! delivery of two-factor codes is likewise delegated.

use anyhow::Result;
use std::time::SystemTime;
use uuid::Uuid;

use crate::hashing::HashScheme;
use crate::policy::{PolicyScope, TenantPolicy};
use crate::types::{Role, TenantId};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PrincipalState {
    Active,
    Disabled,
}

/// Identity-bearing record for admins, reviewers and custodians.
///
/// Provisioning and mutation happen elsewhere; the login flows only read
/// these fields and ask the directory to update the last-login timestamp.
/// Salts must be at least eight bytes.
#[derive(Clone, Debug)]
pub struct PrincipalRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub state: PrincipalState,
    pub password_hash: String,
    pub salt: String,
    pub hash_scheme: HashScheme,
    pub last_login: Option<SystemTime>,
    pub encrypted_private_key: Option<Vec<u8>>,
    pub two_factor: bool,
    pub password_change_needed: bool,
}

/// Maps a receipt hash to the one submission it unlocks.
///
/// The receipt itself is never stored; only its hash under the scheme the
/// record was written with. Different records of the same tenant may use
/// different schemes while a migration is in flight.
#[derive(Clone, Debug)]
pub struct ReceiptRecord {
    pub submission_id: Uuid,
    pub tenant: TenantId,
    pub receipt_hash: String,
    pub hash_scheme: HashScheme,
    pub encrypted_private_key: Option<Vec<u8>>,
}

/// Storage query interface.
pub trait Directory: Send + Sync {
    /// Active principals matching `username` within `tenant`, via the
    /// principal/tenant association table. Disabled records are excluded.
    fn principals_by_username(
        &self,
        tenant: TenantId,
        username: &str,
    ) -> Result<Vec<PrincipalRecord>>;

    fn has_tenant_association(&self, principal: Uuid, tenant: TenantId) -> Result<bool>;

    fn touch_principal_login(&self, principal: Uuid, when: SystemTime) -> Result<()>;

    /// Per-tenant salt used for every receipt hash of that tenant.
    fn receipt_salt(&self, tenant: TenantId) -> Result<String>;

    /// Distinct hash schemes present among the tenant's receipt records.
    fn receipt_hash_schemes(&self, tenant: TenantId) -> Result<Vec<HashScheme>>;

    /// Resolve a receipt by set membership: return the record whose stored
    /// hash equals any of `candidate_hashes`, scoped to `tenant`.
    ///
    /// Implementations must resolve in a single membership query rather
    /// than scanning records one by one, so observable timing does not
    /// depend on table position.
    fn resolve_receipt(
        &self,
        tenant: TenantId,
        candidate_hashes: &[String],
    ) -> Result<Option<ReceiptRecord>>;

    fn touch_submission_access(&self, submission: Uuid, when: SystemTime) -> Result<()>;

    fn tenant_policy(&self, tenant: TenantId, scope: PolicyScope) -> Result<TenantPolicy>;

    /// Public hostname of a tenant, for cross-tenant redirect targets.
    fn tenant_hostname(&self, tenant: TenantId) -> Result<Option<String>>;

    /// Creation time (unix seconds) of the primary tenant. Decides whether
    /// the byte-string literal verification fallback applies.
    fn primary_tenant_created_at(&self) -> Result<i64>;
}

/// Out-of-band delivery for two-factor codes.
pub trait CodeSender: Send + Sync {
    fn send_two_factor_code(&self, email: &str, code: &str) -> Result<()>;
}

/// Sender for deployments without outbound notification configured.
#[derive(Clone, Debug)]
pub struct NoopCodeSender;

impl CodeSender for NoopCodeSender {
    fn send_two_factor_code(&self, _email: &str, _code: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CodeSender, NoopCodeSender, PrincipalState};

    #[test]
    fn noop_sender_accepts_everything() {
        assert!(NoopCodeSender.send_two_factor_code("a@example.com", "123456").is_ok());
    }

    #[test]
    fn principal_state_equality() {
        assert_ne!(PrincipalState::Active, PrincipalState::Disabled);
    }
}
