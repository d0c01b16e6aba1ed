//! Authentication: `Authorization` header classification and validation.
//!
//! The [`Authenticator`](authenticator::Authenticator) turns a raw header
//! value plus connection state into a validated username, consulting the
//! injected [`IdentityProvider`](identity::IdentityProvider) and friends.
//! Every failure path is logged and yields "unauthenticated" — the request
//! then proceeds exactly as if no credentials had been presented.

pub mod authenticator;
pub mod identity;
pub mod local_tokens;
pub mod scheme;

pub use authenticator::{AuthUser, Authenticator};
pub use identity::{
    AdminCapabilityChecker, AuthRef, AuthRefIdentity, AuthorityService, IdentityProvider,
    UserRecord,
};
pub use local_tokens::LocalTokenStore;
pub use scheme::{SchemeKind, SchemeToken};

use std::net::IpAddr;

use crate::{Error, Result};

/// Maximum accepted username length in bytes.
pub const MAX_USERNAME_LEN: usize = 255;

/// Maximum accepted hostname length in bytes.
pub const MAX_HOSTNAME_LEN: usize = 255;

/// Transport the connection arrived over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// TCP (v4 or v6).
    Inet,
    /// Unix-domain socket, with the peer credential UID when the lookup
    /// succeeded.
    Unix {
        /// UID reported by the peer-credential syscall.
        peer_uid: Option<u32>,
    },
}

/// Per-connection state the authenticator and authorizer consume.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Peer address. Unix-domain peers report loopback.
    pub addr: IpAddr,
    /// Resolved peer hostname.
    pub hostname: String,
    /// Whether TLS is active on the connection.
    pub tls: bool,
    /// Underlying transport.
    pub transport: Transport,
}

impl Connection {
    /// Whether the peer is local (loopback address or `localhost` name, or
    /// a unix-domain socket).
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self.transport, Transport::Unix { .. })
            || self.addr.is_loopback()
            || self.hostname.eq_ignore_ascii_case("localhost")
    }

    /// Peer credential UID, when the connection is a unix-domain socket and
    /// the lookup succeeded.
    #[must_use]
    pub fn peer_uid(&self) -> Option<u32> {
        match self.transport {
            Transport::Unix { peer_uid } => peer_uid,
            Transport::Inet => None,
        }
    }
}

/// Bounds-check a name instead of truncating it.
///
/// A truncated name can alias a different account, so oversized input is
/// an explicit error, never a shortened copy.
pub fn checked_name(what: &'static str, name: &str, max: usize) -> Result<()> {
    if name.len() > max {
        return Err(Error::OversizedName {
            what,
            len: name.len(),
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_name_accepts_within_bound() {
        assert!(checked_name("username", "alice", MAX_USERNAME_LEN).is_ok());
    }

    #[test]
    fn checked_name_rejects_oversized() {
        let long = "x".repeat(MAX_USERNAME_LEN + 1);
        let err = checked_name("username", &long, MAX_USERNAME_LEN);
        assert!(matches!(err, Err(Error::OversizedName { .. })));
    }

    #[test]
    fn unix_transport_is_local() {
        let conn = Connection {
            addr: "192.168.1.1".parse().unwrap(),
            hostname: "whatever".to_string(),
            tls: false,
            transport: Transport::Unix { peer_uid: Some(501) },
        };
        assert!(conn.is_local());
        assert_eq!(conn.peer_uid(), Some(501));
    }

    #[test]
    fn remote_inet_is_not_local() {
        let conn = Connection {
            addr: "203.0.113.9".parse().unwrap(),
            hostname: "client.example.com".to_string(),
            tls: false,
            transport: Transport::Inet,
        };
        assert!(!conn.is_local());
        assert_eq!(conn.peer_uid(), None);
    }
}
