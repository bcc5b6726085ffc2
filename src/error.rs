//! Typed failures for the login flows.

use thiserror::Error;

/// Every way a login attempt can fail, as seen by the routing layer.
///
/// `InvalidAuthentication` is deliberately generic: bad usernames, bad
/// passwords, bad receipts and bad bearer tokens all report the same way so
/// a caller cannot learn which sub-check rejected the attempt. Policy
/// rejections are reported distinctly since they do not depend on any
/// secret. `TwoFactorAuthCodeRequired` is a required-next-step signal, not
/// a hard error; the caller is expected to retry with a code.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid authentication")]
    InvalidAuthentication,
    #[error("access location not allowed")]
    AccessLocationInvalid,
    #[error("anonymity network transport required")]
    AnonymityNetworkRequired,
    #[error("two-factor authentication code required")]
    TwoFactorAuthCodeRequired,
    #[error("invalid two-factor authentication code")]
    InvalidTwoFactorAuthCode,
}

#[cfg(test)]
mod tests {
    use super::AuthError;

    #[test]
    fn display_does_not_leak_which_subcheck_failed() {
        assert_eq!(
            AuthError::InvalidAuthentication.to_string(),
            "invalid authentication"
        );
    }
}
