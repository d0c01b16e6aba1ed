//! Error types for the authorization core.
//!
//! Nothing in this crate treats an error as fatal: scheme and identity
//! failures degrade to an unauthenticated request, certificate parse
//! failures degrade to an unknown trust level, and trust-store I/O failures
//! behave as if no record had been stored. The variants exist so callers
//! and logs can tell those cases apart.

use std::io;

use thiserror::Error;

/// Result type alias for the authorization core
pub type Result<T> = std::result::Result<T, Error>;

/// Authorization core errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unrecognized or malformed `Authorization` header
    #[error("Unsupported authorization scheme: {0}")]
    Scheme(String),

    /// Authentication failed (unknown user, bad password, rejected context)
    #[error("Identity error ({scheme}): {reason}")]
    Identity {
        /// Scheme that was being attempted
        scheme: &'static str,
        /// Human-readable failure reason
        reason: String,
    },

    /// A name exceeded its length bound.
    ///
    /// Truncating a name can change which account it resolves to, so
    /// oversized input is rejected outright rather than shortened.
    #[error("{what} exceeds {max} bytes (got {len})")]
    OversizedName {
        /// What kind of name was oversized ("username", "hostname", ...)
        what: &'static str,
        /// Actual length in bytes
        len: usize,
        /// Maximum allowed length in bytes
        max: usize,
    },

    /// Malformed PEM or certificate data
    #[error("Certificate parse error: {0}")]
    CertParse(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create an identity error for the given scheme.
    pub fn identity(scheme: &'static str, reason: impl Into<String>) -> Self {
        Self::Identity {
            scheme,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_error_carries_scheme_and_reason() {
        let err = Error::identity("Basic", "unknown user \"lp\"");
        assert_eq!(
            err.to_string(),
            "Identity error (Basic): unknown user \"lp\""
        );
    }

    #[test]
    fn oversized_name_formats_limits() {
        let err = Error::OversizedName {
            what: "username",
            len: 300,
            max: 255,
        };
        assert!(err.to_string().contains("username"));
        assert!(err.to_string().contains("255"));
        assert!(err.to_string().contains("300"));
    }
}
