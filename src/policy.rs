//! Per-tenant network-origin policy.

use ipnetwork::IpNetwork;
use std::net::IpAddr;

use crate::error::AuthError;
use crate::types::Role;

/// Which policy row to consult: a resolved role, or the tenant default when
/// the role is not known yet (password login gates once before the
/// principal resolves and again after).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PolicyScope {
    Default,
    Role(Role),
}

/// Network-origin constraints for one tenant and scope.
///
/// An empty allow-list means unrestricted. `allow_plain_transport` permits
/// connections that do not arrive over the anonymity network.
#[derive(Clone, Debug)]
pub struct TenantPolicy {
    ip_filter: Vec<IpNetwork>,
    allow_plain_transport: bool,
}

impl TenantPolicy {
    /// No IP restriction, plaintext transport permitted.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self {
            ip_filter: Vec::new(),
            allow_plain_transport: true,
        }
    }

    #[must_use]
    pub fn with_ip_filter(mut self, networks: Vec<IpNetwork>) -> Self {
        self.ip_filter = networks;
        self
    }

    #[must_use]
    pub fn with_plain_transport(mut self, allowed: bool) -> Self {
        self.allow_plain_transport = allowed;
        self
    }
}

impl Default for TenantPolicy {
    fn default() -> Self {
        Self::unrestricted()
    }
}

/// Check a connection's origin against the policy.
///
/// Side-effect free, and evaluated before any credential is compared so an
/// origin rejection carries no information about credential validity. The
/// allow-list check runs first, then the transport check.
pub fn connection_check(
    policy: &TenantPolicy,
    client_ip: IpAddr,
    anonymity_network: bool,
) -> Result<(), AuthError> {
    if !policy.ip_filter.is_empty()
        && !policy.ip_filter.iter().any(|network| network.contains(client_ip))
    {
        return Err(AuthError::AccessLocationInvalid);
    }

    if !policy.allow_plain_transport && !anonymity_network {
        return Err(AuthError::AnonymityNetworkRequired);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{TenantPolicy, connection_check};
    use crate::error::AuthError;
    use ipnetwork::IpNetwork;
    use std::net::IpAddr;

    fn ip(value: &str) -> IpAddr {
        value.parse().unwrap()
    }

    fn network(value: &str) -> IpNetwork {
        value.parse().unwrap()
    }

    #[test]
    fn empty_allow_list_is_unrestricted() {
        let policy = TenantPolicy::unrestricted();
        assert_eq!(connection_check(&policy, ip("203.0.113.9"), false), Ok(()));
    }

    #[test]
    fn allow_list_rejects_outside_addresses() {
        let policy =
            TenantPolicy::unrestricted().with_ip_filter(vec![network("10.0.0.0/8")]);
        assert_eq!(connection_check(&policy, ip("10.1.2.3"), false), Ok(()));
        assert_eq!(
            connection_check(&policy, ip("203.0.113.9"), false),
            Err(AuthError::AccessLocationInvalid)
        );
    }

    #[test]
    fn plain_transport_ban_requires_anonymity_network() {
        let policy = TenantPolicy::unrestricted().with_plain_transport(false);
        assert_eq!(
            connection_check(&policy, ip("203.0.113.9"), false),
            Err(AuthError::AnonymityNetworkRequired)
        );
        assert_eq!(connection_check(&policy, ip("203.0.113.9"), true), Ok(()));
    }

    #[test]
    fn allow_list_rejection_wins_over_transport() {
        let policy = TenantPolicy::unrestricted()
            .with_ip_filter(vec![network("10.0.0.0/8")])
            .with_plain_transport(false);
        assert_eq!(
            connection_check(&policy, ip("203.0.113.9"), false),
            Err(AuthError::AccessLocationInvalid)
        );
    }
}
