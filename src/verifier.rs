//! Credential verification.
//!
//! Both credential kinds resolve to zero-or-one matching record. Misses are
//! reported as `Ok(None)`; the orchestrator maps misses and internal faults
//! to the same generic failure so a caller cannot tell which sub-check
//! rejected the attempt.

use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::directory::{Directory, PrincipalRecord, PrincipalState, ReceiptRecord};
use crate::hashing::{self, LEGACY_BYTES_CUTOVER};
use crate::types::TenantId;

/// A credential as presented by the caller.
pub enum Credential {
    /// Username and password of an admin, reviewer or custodian.
    Password {
        username: String,
        password: SecretString,
    },
    /// Secret receipt code identifying one anonymous submission.
    Receipt { receipt: SecretString },
}

/// The record a credential resolved to.
pub enum Verified {
    Principal(PrincipalRecord),
    Submission(ReceiptRecord),
}

/// Resolve a credential within a tenant.
pub fn verify(
    directory: &dyn Directory,
    tenant: TenantId,
    credential: &Credential,
) -> Result<Option<Verified>> {
    match credential {
        Credential::Password { username, password } => {
            Ok(verify_password(directory, tenant, username, password)?.map(Verified::Principal))
        }
        Credential::Receipt { receipt } => {
            Ok(verify_receipt(directory, tenant, receipt)?.map(Verified::Submission))
        }
    }
}

/// Find the principal matching `username` and `password` within `tenant`.
///
/// Candidates are recomputed under their own stored scheme and salt; the
/// first match wins. When the primary tenant predates
/// [`LEGACY_BYTES_CUTOVER`], each candidate is also retried through the
/// byte-string literal fallback before moving on.
pub fn verify_password(
    directory: &dyn Directory,
    tenant: TenantId,
    username: &str,
    password: &SecretString,
) -> Result<Option<PrincipalRecord>> {
    let legacy_wrapped = directory.primary_tenant_created_at()? < LEGACY_BYTES_CUTOVER;
    let secret = password.expose_secret();

    for record in directory.principals_by_username(tenant, username)? {
        // A disabled principal never authenticates.
        if record.state == PrincipalState::Disabled {
            continue;
        }
        if hashing::verify_secret(record.hash_scheme, secret, &record.salt, &record.password_hash) {
            return Ok(Some(record));
        }
        if legacy_wrapped
            && hashing::verify_secret_bytes_literal(
                record.hash_scheme,
                secret,
                &record.salt,
                &record.password_hash,
            )
        {
            debug!(user = %record.username, "password matched via the byte-string literal fallback");
            return Ok(Some(record));
        }
    }
    Ok(None)
}

/// Resolve a receipt to its submission within `tenant`.
///
/// The candidate receipt is hashed under every scheme present among the
/// tenant's records and resolved with one set-membership query, so timing
/// does not depend on where a matching record sits in the table.
pub fn verify_receipt(
    directory: &dyn Directory,
    tenant: TenantId,
    receipt: &SecretString,
) -> Result<Option<ReceiptRecord>> {
    let salt = directory.receipt_salt(tenant)?;
    let mut candidates = Vec::new();
    for scheme in directory.receipt_hash_schemes(tenant)? {
        candidates.push(hashing::hash_secret(scheme, receipt.expose_secret(), &salt)?);
    }
    if candidates.is_empty() {
        return Ok(None);
    }
    directory.resolve_receipt(tenant, &candidates)
}

#[cfg(test)]
mod tests {
    use super::{Credential, Verified, verify, verify_password, verify_receipt};
    use crate::directory::{Directory, PrincipalRecord, PrincipalState, ReceiptRecord};
    use crate::hashing::{HashScheme, LEGACY_BYTES_CUTOVER, hash_secret};
    use crate::policy::{PolicyScope, TenantPolicy};
    use crate::types::{Role, TenantId};
    use anyhow::Result;
    use secrecy::SecretString;
    use std::time::SystemTime;
    use uuid::Uuid;

    const RECEIPT_SALT: &str = "tenant-receipt-salt";

    struct FakeDirectory {
        principals: Vec<PrincipalRecord>,
        receipts: Vec<ReceiptRecord>,
        primary_created_at: i64,
    }

    impl Default for FakeDirectory {
        fn default() -> Self {
            Self {
                principals: Vec::new(),
                receipts: Vec::new(),
                primary_created_at: LEGACY_BYTES_CUTOVER + 1,
            }
        }
    }

    impl Directory for FakeDirectory {
        fn principals_by_username(
            &self,
            _tenant: TenantId,
            username: &str,
        ) -> Result<Vec<PrincipalRecord>> {
            Ok(self
                .principals
                .iter()
                .filter(|record| record.username == username)
                .cloned()
                .collect())
        }

        fn has_tenant_association(&self, _principal: Uuid, _tenant: TenantId) -> Result<bool> {
            Ok(false)
        }

        fn touch_principal_login(&self, _principal: Uuid, _when: SystemTime) -> Result<()> {
            Ok(())
        }

        fn receipt_salt(&self, _tenant: TenantId) -> Result<String> {
            Ok(RECEIPT_SALT.to_string())
        }

        fn receipt_hash_schemes(&self, tenant: TenantId) -> Result<Vec<HashScheme>> {
            let mut schemes: Vec<HashScheme> = Vec::new();
            for record in self.receipts.iter().filter(|r| r.tenant == tenant) {
                if !schemes.contains(&record.hash_scheme) {
                    schemes.push(record.hash_scheme);
                }
            }
            Ok(schemes)
        }

        fn resolve_receipt(
            &self,
            tenant: TenantId,
            candidate_hashes: &[String],
        ) -> Result<Option<ReceiptRecord>> {
            Ok(self
                .receipts
                .iter()
                .find(|record| {
                    record.tenant == tenant
                        && candidate_hashes.contains(&record.receipt_hash)
                })
                .cloned())
        }

        fn touch_submission_access(&self, _submission: Uuid, _when: SystemTime) -> Result<()> {
            Ok(())
        }

        fn tenant_policy(&self, _tenant: TenantId, _scope: PolicyScope) -> Result<TenantPolicy> {
            Ok(TenantPolicy::unrestricted())
        }

        fn tenant_hostname(&self, _tenant: TenantId) -> Result<Option<String>> {
            Ok(None)
        }

        fn primary_tenant_created_at(&self) -> Result<i64> {
            Ok(self.primary_created_at)
        }
    }

    fn principal(username: &str, password: &str, scheme: HashScheme) -> PrincipalRecord {
        let salt = format!("salt-for-{username}");
        PrincipalRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            role: Role::Reviewer,
            state: PrincipalState::Active,
            password_hash: hash_secret(scheme, password, &salt).unwrap(),
            salt,
            hash_scheme: scheme,
            last_login: None,
            encrypted_private_key: None,
            two_factor: false,
            password_change_needed: false,
        }
    }

    fn receipt_record(tenant: TenantId, receipt: &str, scheme: HashScheme) -> ReceiptRecord {
        ReceiptRecord {
            submission_id: Uuid::new_v4(),
            tenant,
            receipt_hash: hash_secret(scheme, receipt, RECEIPT_SALT).unwrap(),
            hash_scheme: scheme,
            encrypted_private_key: None,
        }
    }

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[test]
    fn password_accepts_the_matching_candidate() {
        let directory = FakeDirectory {
            principals: vec![
                principal("alice", "first-password", HashScheme::LegacySha512),
                principal("alice", "second-password", HashScheme::Argon2id),
            ],
            ..FakeDirectory::default()
        };

        let resolved = verify_password(&directory, 1, "alice", &secret("second-password"))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.hash_scheme, HashScheme::Argon2id);

        assert!(
            verify_password(&directory, 1, "alice", &secret("wrong"))
                .unwrap()
                .is_none()
        );
        assert!(
            verify_password(&directory, 1, "nobody", &secret("first-password"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn disabled_principals_never_match() {
        let mut record = principal("alice", "password", HashScheme::Argon2id);
        record.state = PrincipalState::Disabled;
        let directory = FakeDirectory {
            principals: vec![record],
            ..FakeDirectory::default()
        };

        assert!(
            verify_password(&directory, 1, "alice", &secret("password"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn bytes_literal_fallback_only_before_the_cutover() {
        let mut record = principal("alice", "password", HashScheme::LegacySha512);
        record.password_hash = format!("b'{}'", record.password_hash);

        let mut directory = FakeDirectory {
            principals: vec![record],
            primary_created_at: LEGACY_BYTES_CUTOVER - 1,
            ..FakeDirectory::default()
        };
        assert!(
            verify_password(&directory, 1, "alice", &secret("password"))
                .unwrap()
                .is_some()
        );

        directory.primary_created_at = LEGACY_BYTES_CUTOVER + 1;
        assert!(
            verify_password(&directory, 1, "alice", &secret("password"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn receipt_resolves_under_any_scheme_present_in_the_tenant() {
        let directory = FakeDirectory {
            receipts: vec![
                receipt_record(1, "legacy-receipt", HashScheme::LegacySha512),
                receipt_record(1, "current-receipt", HashScheme::Argon2id),
            ],
            ..FakeDirectory::default()
        };

        let legacy = verify_receipt(&directory, 1, &secret("legacy-receipt"))
            .unwrap()
            .unwrap();
        assert_eq!(legacy.hash_scheme, HashScheme::LegacySha512);

        let current = verify_receipt(&directory, 1, &secret("current-receipt"))
            .unwrap()
            .unwrap();
        assert_eq!(current.hash_scheme, HashScheme::Argon2id);

        assert!(
            verify_receipt(&directory, 1, &secret("unknown-receipt"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn receipt_does_not_cross_tenants() {
        let directory = FakeDirectory {
            receipts: vec![receipt_record(2, "the-receipt", HashScheme::Argon2id)],
            ..FakeDirectory::default()
        };

        assert!(
            verify_receipt(&directory, 1, &secret("the-receipt"))
                .unwrap()
                .is_none()
        );
        assert!(
            verify_receipt(&directory, 2, &secret("the-receipt"))
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn tenant_without_receipt_records_rejects_without_querying() {
        let directory = FakeDirectory::default();
        assert!(
            verify_receipt(&directory, 1, &secret("anything"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn dispatch_matches_on_the_credential_kind() {
        let directory = FakeDirectory {
            principals: vec![principal("alice", "password", HashScheme::Argon2id)],
            receipts: vec![receipt_record(1, "the-receipt", HashScheme::Argon2id)],
            ..FakeDirectory::default()
        };

        let password = Credential::Password {
            username: "alice".to_string(),
            password: secret("password"),
        };
        assert!(matches!(
            verify(&directory, 1, &password).unwrap(),
            Some(Verified::Principal(_))
        ));

        let receipt = Credential::Receipt {
            receipt: secret("the-receipt"),
        };
        assert!(matches!(
            verify(&directory, 1, &receipt).unwrap(),
            Some(Verified::Submission(_))
        ));
    }
}
