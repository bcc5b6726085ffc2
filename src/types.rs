//! Shared identifiers and the role set.

use serde::{Deserialize, Serialize};

/// Numeric identifier of an isolated tenant instance.
pub type TenantId = u32;

/// The primary tenant. Principals of this tenant implicitly have access to
/// every other tenant.
pub const PRIMARY_TENANT: TenantId = 1;

/// Requests may carry this in place of a tenant id to mean "the tenant the
/// request arrived on".
pub const TENANT_UNSET: TenantId = 0;

/// Closed set of principal roles.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Reviewer,
    Custodian,
    Submitter,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Reviewer => "reviewer",
            Self::Custodian => "custodian",
            Self::Submitter => "submitter",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim() {
            "admin" => Some(Self::Admin),
            "reviewer" => Some(Self::Reviewer),
            "custodian" => Some(Self::Custodian),
            "submitter" => Some(Self::Submitter),
            _ => None,
        }
    }
}
