//! Session issuance: the four externally observable login flows.
//!
//! The [`Authenticator`] composes the policy gate, timing defense,
//! credential verifier, two-factor challenge, key recovery and session
//! store. Every flow runs under the uniform-answer floor and reports
//! credential misses, bad tokens and internal faults identically, so a
//! caller learns nothing about which sub-check rejected the attempt.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, warn};

use crate::config::AuthConfig;
use crate::directory::{CodeSender, Directory, PrincipalRecord};
use crate::error::AuthError;
use crate::keys::recover_private_key;
use crate::policy::{PolicyScope, connection_check};
use crate::session::{Session, SessionDescriptor, SessionStore};
use crate::timing::{FailedLoginCounter, UniformAnswer, login_delay};
use crate::two_factor::{ChallengeStore, ChallengeVerdict};
use crate::types::{PRIMARY_TENANT, Role, TENANT_UNSET, TenantId};
use crate::verifier::{Credential, Verified, verify};

/// Transport and origin metadata for one request.
#[derive(Clone, Copy, Debug)]
pub struct RequestMeta {
    /// Tenant whose address the request arrived on.
    pub arrival_tenant: TenantId,
    pub client_ip: IpAddr,
    /// Whether the connection came in over the anonymity network.
    pub anonymity_network: bool,
}

/// Identity + password login request. `tenant` may be [`TENANT_UNSET`] to
/// mean the arrival tenant.
pub struct PasswordLogin {
    pub meta: RequestMeta,
    pub tenant: TenantId,
    pub username: String,
    pub password: SecretString,
    pub two_factor_code: Option<String>,
}

/// Anonymous receipt login request.
pub struct ReceiptLogin {
    pub meta: RequestMeta,
    pub tenant: TenantId,
    pub receipt: SecretString,
}

/// Bearer-token refresh request.
pub struct TokenLogin {
    pub meta: RequestMeta,
    pub tenant: TenantId,
    pub token: String,
}

/// What the routing layer gets back from a successful flow.
///
/// When the resolved tenant differs from the arrival tenant, the session
/// body is never returned in the arrival tenant's origin context; the
/// caller redirects the client instead, with the new session identifier
/// carried once as a bootstrap token.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginReply {
    Session(SessionDescriptor),
    Redirect { location: String },
}

/// The authentication core.
pub struct Authenticator {
    directory: Arc<dyn Directory>,
    code_sender: Arc<dyn CodeSender>,
    sessions: SessionStore,
    challenges: ChallengeStore,
    counter: FailedLoginCounter,
    config: AuthConfig,
}

impl Authenticator {
    #[must_use]
    pub fn new(
        directory: Arc<dyn Directory>,
        code_sender: Arc<dyn CodeSender>,
        config: AuthConfig,
    ) -> Self {
        Self {
            directory,
            code_sender,
            sessions: SessionStore::new(config.session_idle_ttl()),
            challenges: ChallengeStore::new(config.challenge_ttl()),
            counter: FailedLoginCounter::new(),
            config,
        }
    }

    /// Identity + password login.
    pub async fn password_login(&self, request: PasswordLogin) -> Result<LoginReply, AuthError> {
        let answer = UniformAnswer::start(self.config.answer_floor());
        let result = self.password_login_flow(request).await;
        answer.wait().await;
        result
    }

    async fn password_login_flow(&self, request: PasswordLogin) -> Result<LoginReply, AuthError> {
        let tenant = resolve_tenant(request.tenant, &request.meta);

        // The role is unknown until the principal resolves, so gate against
        // the tenant default first and the resolved role after.
        self.gate(tenant, PolicyScope::Default, &request.meta).await?;
        self.pre_verification_delay().await;

        let credential = Credential::Password {
            username: request.username,
            password: request.password.clone(),
        };
        let resolved = self.internal(
            verify(self.directory.as_ref(), tenant, &credential),
            "password verification faulted",
        )?;
        let Some(Verified::Principal(principal)) = resolved else {
            return Err(self.invalid());
        };

        self.gate(tenant, PolicyScope::Role(principal.role), &request.meta)
            .await?;
        self.two_factor_gate(&principal, request.two_factor_code.as_deref())
            .await?;

        let key_material = if self.config.encryption() {
            recover_private_key(
                request.password.expose_secret(),
                &principal.salt,
                principal.encrypted_private_key.as_deref(),
            )
        } else {
            None
        };

        let session = self.internal(
            self.sessions
                .create(
                    tenant,
                    principal.id,
                    principal.role,
                    principal.password_change_needed,
                    key_material,
                )
                .await,
            "session creation failed",
        )?;
        if let Err(err) = self
            .directory
            .touch_principal_login(principal.id, SystemTime::now())
        {
            warn!("failed to record last login: {err:#}");
        }
        debug!(user = %principal.id, role = principal.role.as_str(), tenant, "password login succeeded");
        Ok(self.login_reply(request.meta.arrival_tenant, &session))
    }

    /// Anonymous receipt login. The role is fixed: receipts only ever
    /// identify submitters.
    pub async fn receipt_login(&self, request: ReceiptLogin) -> Result<LoginReply, AuthError> {
        let answer = UniformAnswer::start(self.config.answer_floor());
        let result = self.receipt_login_flow(request).await;
        answer.wait().await;
        result
    }

    async fn receipt_login_flow(&self, request: ReceiptLogin) -> Result<LoginReply, AuthError> {
        let tenant = resolve_tenant(request.tenant, &request.meta);

        self.gate(tenant, PolicyScope::Role(Role::Submitter), &request.meta)
            .await?;
        self.pre_verification_delay().await;

        let credential = Credential::Receipt {
            receipt: request.receipt.clone(),
        };
        let resolved = self.internal(
            verify(self.directory.as_ref(), tenant, &credential),
            "receipt verification faulted",
        )?;
        let Some(Verified::Submission(record)) = resolved else {
            return Err(self.invalid());
        };

        let key_material = if self.config.encryption() {
            let salt = self.internal(
                self.directory.receipt_salt(tenant),
                "receipt salt lookup failed",
            )?;
            recover_private_key(
                request.receipt.expose_secret(),
                &salt,
                record.encrypted_private_key.as_deref(),
            )
        } else {
            None
        };

        let session = self.internal(
            self.sessions
                .create(tenant, record.submission_id, Role::Submitter, false, key_material)
                .await,
            "session creation failed",
        )?;
        if let Err(err) = self
            .directory
            .touch_submission_access(record.submission_id, SystemTime::now())
        {
            warn!("failed to record submission access: {err:#}");
        }
        debug!(submission = %record.submission_id, tenant, "receipt login succeeded");
        Ok(self.login_reply(request.meta.arrival_tenant, &session))
    }

    /// Refresh an existing session presented as a bearer token, rotating
    /// its identifier.
    pub async fn token_login(&self, request: TokenLogin) -> Result<LoginReply, AuthError> {
        let answer = UniformAnswer::start(self.config.answer_floor());
        let result = self.token_login_flow(request).await;
        answer.wait().await;
        result
    }

    async fn token_login_flow(&self, request: TokenLogin) -> Result<LoginReply, AuthError> {
        let tenant = resolve_tenant(request.tenant, &request.meta);
        self.pre_verification_delay().await;

        let Some(session) = self.sessions.get(&request.token).await else {
            return Err(self.invalid());
        };
        if session.tenant != tenant {
            return Err(self.invalid());
        }

        self.gate(tenant, PolicyScope::Role(session.role), &request.meta)
            .await?;

        let refreshed = self.internal(
            self.sessions.regenerate(&session.id).await,
            "session regeneration failed",
        )?;
        // Lost the rotation race or revoked in between; either way the token
        // no longer names a live session.
        let Some(refreshed) = refreshed else {
            return Err(self.invalid());
        };
        debug!(user = %refreshed.principal, tenant, "token refresh succeeded");
        Ok(LoginReply::Session(refreshed.descriptor(true)))
    }

    /// Re-scope an authenticated session to another tenant.
    ///
    /// No credential is re-verified; the existing session vouches for the
    /// identity. Principals whose session is bound to the primary tenant
    /// reach every tenant, all others need an association row. The reply is
    /// always a redirect handoff into the target tenant.
    pub async fn tenant_switch(
        &self,
        session_id: &str,
        target_tenant: TenantId,
    ) -> Result<LoginReply, AuthError> {
        let answer = UniformAnswer::start(self.config.answer_floor());
        let result = self.tenant_switch_flow(session_id, target_tenant).await;
        answer.wait().await;
        result
    }

    async fn tenant_switch_flow(
        &self,
        session_id: &str,
        target_tenant: TenantId,
    ) -> Result<LoginReply, AuthError> {
        let Some(session) = self.sessions.get(session_id).await else {
            return Err(self.invalid());
        };

        let allowed = session.tenant == PRIMARY_TENANT
            || self.internal(
                self.directory
                    .has_tenant_association(session.principal, target_tenant),
                "tenant association lookup failed",
            )?;
        if !allowed {
            return Err(self.invalid());
        }

        let switched = self.internal(
            self.sessions
                .create(
                    target_tenant,
                    session.principal,
                    session.role,
                    session.password_change_needed,
                    session.key_material.clone(),
                )
                .await,
            "session creation failed",
        )?;
        debug!(user = %switched.principal, from = session.tenant, to = target_tenant, "tenant switch succeeded");
        Ok(LoginReply::Redirect {
            location: format!("/t/{target_tenant}/#/login?token={}", switched.id),
        })
    }

    /// Look up a session by identifier. Key material is never exposed here.
    pub async fn session(&self, session_id: &str) -> Option<SessionDescriptor> {
        let session = self.sessions.get(session_id).await?;
        Some(session.descriptor(false))
    }

    /// Revoke the caller's own session.
    pub async fn logout(&self, session_id: &str) -> bool {
        self.sessions.revoke(session_id).await
    }

    /// Drop sessions idle past the configured threshold.
    pub async fn sweep_sessions(&self) {
        self.sessions.sweep().await;
    }

    #[must_use]
    pub fn failed_attempts(&self) -> u64 {
        self.counter.get()
    }

    /// Evaluate the two-factor state machine for a verified principal.
    ///
    /// Skipped entirely when the platform switch is off, the principal is
    /// not enrolled, or this is the principal's first-ever login (a second
    /// factor cannot have been configured client-side yet). Wrong codes do
    /// not touch the failed-attempt counter; that one is reserved for
    /// primary-credential and token failures.
    async fn two_factor_gate(
        &self,
        principal: &PrincipalRecord,
        code: Option<&str>,
    ) -> Result<(), AuthError> {
        if !self.config.two_factor_auth() || !principal.two_factor {
            return Ok(());
        }
        if principal.last_login.is_none() {
            return Ok(());
        }

        match code {
            Some(code) => match self.challenges.verify(principal.id, code).await {
                ChallengeVerdict::Consumed => Ok(()),
                ChallengeVerdict::Mismatch => Err(AuthError::InvalidTwoFactorAuthCode),
                ChallengeVerdict::NonePending => Err(AuthError::TwoFactorAuthCodeRequired),
            },
            None => {
                if !self.challenges.has_pending(principal.id).await {
                    let code = self.challenges.issue(principal.id).await;
                    if let Err(err) = self
                        .code_sender
                        .send_two_factor_code(&principal.email, &code)
                    {
                        error!("failed to deliver two-factor code: {err:#}");
                    }
                }
                Err(AuthError::TwoFactorAuthCodeRequired)
            }
        }
    }

    async fn gate(
        &self,
        tenant: TenantId,
        scope: PolicyScope,
        meta: &RequestMeta,
    ) -> Result<(), AuthError> {
        let policy = self.internal(
            self.directory.tenant_policy(tenant, scope),
            "tenant policy lookup failed",
        )?;
        connection_check(&policy, meta.client_ip, meta.anonymity_network)
    }

    /// Sleep the counter-driven delay before verification starts. No lock is
    /// held while sleeping.
    async fn pre_verification_delay(&self) {
        let seconds = login_delay(self.counter.get());
        if seconds > 0 {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
        }
    }

    /// Count a failed verification and hand back the generic failure.
    fn invalid(&self) -> AuthError {
        self.counter.increment();
        AuthError::InvalidAuthentication
    }

    /// Degrade an internal fault to the generic failure so internals never
    /// reach the caller.
    fn internal<T>(&self, result: anyhow::Result<T>, what: &str) -> Result<T, AuthError> {
        result.map_err(|err| {
            error!("{what}: {err:#}");
            self.invalid()
        })
    }

    fn login_reply(&self, arrival_tenant: TenantId, session: &Session) -> LoginReply {
        if session.tenant == arrival_tenant {
            return LoginReply::Session(session.descriptor(true));
        }
        let location = match self.directory.tenant_hostname(session.tenant) {
            Ok(Some(hostname)) => format!("https://{hostname}/#/login?token={}", session.id),
            Ok(None) => format!("/t/{}/#/login?token={}", session.tenant, session.id),
            Err(err) => {
                warn!("tenant hostname lookup failed: {err:#}");
                format!("/t/{}/#/login?token={}", session.tenant, session.id)
            }
        };
        LoginReply::Redirect { location }
    }
}

fn resolve_tenant(requested: TenantId, meta: &RequestMeta) -> TenantId {
    if requested == TENANT_UNSET {
        meta.arrival_tenant
    } else {
        requested
    }
}
