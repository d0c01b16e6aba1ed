//! Identity collaborators.
//!
//! The scheduler talks to platform identity services (passwd/group
//! databases, PAM, GSSAPI, the platform authorization service, sandbox
//! capability probes) through the traits here, selected at startup. The
//! decision logic never branches on the platform; it only sees these
//! interfaces. Implementations may block — callers accept that.
//!
//! [`MemoryIdentityProvider`] is a deterministic in-memory implementation
//! for embedding and tests.

use std::collections::HashMap;

use crate::auth::Connection;
use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────────────────

/// A user looked up in the system account database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserRecord {
    /// Numeric user id.
    pub uid: u32,
    /// Primary group id.
    pub gid: u32,
}

/// System identity oracle: passwords, accounts, groups, GSSAPI.
pub trait IdentityProvider: Send + Sync {
    /// Validate a username/password pair (PAM or crypt+shadow behind the
    /// scenes).
    ///
    /// # Errors
    ///
    /// Returns `Error::Identity` when the pair does not validate.
    fn validate_password(&self, username: &str, password: &str) -> Result<()>;

    /// Look up an account by name.
    fn lookup_user(&self, name: &str) -> Option<UserRecord>;

    /// Reverse lookup: account name for a UID.
    fn user_for_uid(&self, uid: u32) -> Option<String>;

    /// Whether `username` belongs to `group` (primary or supplementary).
    fn user_in_group(&self, username: &str, group: &str) -> bool;

    /// Accept a GSSAPI security context from the decoded client token and
    /// return the client principal name on full completion.
    ///
    /// # Errors
    ///
    /// Returns `Error::Identity` when the context is rejected or
    /// incomplete.
    fn accept_negotiate(&self, token: &[u8]) -> Result<String>;
}

/// A decoded platform authorization reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRef(pub Vec<u8>);

/// Identity extracted from an authorization reference's environment.
#[derive(Debug, Clone, Default)]
pub struct AuthRefIdentity {
    /// Username recorded in the reference, when present.
    pub username: Option<String>,
}

/// Platform authorization service (the `AuthRef` scheme backend and the
/// `@AUTHKEY(right)` right checks).
pub trait AuthorityService: Send + Sync {
    /// Validate a decoded authorization reference and extract its identity.
    ///
    /// # Errors
    ///
    /// Returns `Error::Identity` when the reference is invalid.
    fn resolve(&self, reference: &AuthRef) -> Result<AuthRefIdentity>;

    /// Whether the reference holds the named right.
    fn check_right(&self, reference: &AuthRef, right: &str) -> bool;
}

/// Platform confinement probe backing the deferred `@SYSTEM` check.
///
/// Sandboxed callers may be members of a system group yet still not be
/// allowed to administer the scheduler; the platform strategy decides.
pub trait AdminCapabilityChecker: Send + Sync {
    /// Whether the connection's peer may exercise administrative rights.
    fn is_admin_capable(&self, connection: &Connection) -> bool;
}

/// An [`AdminCapabilityChecker`] that trusts every peer — the behavior on
/// platforms without a confinement system.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAdminCapable;

impl AdminCapabilityChecker for AlwaysAdminCapable {
    fn is_admin_capable(&self, _connection: &Connection) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory provider
// ─────────────────────────────────────────────────────────────────────────────

/// Deterministic in-memory [`IdentityProvider`].
#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
    users: HashMap<String, (UserRecord, String)>,
    groups: HashMap<String, Vec<String>>,
    principals: Vec<String>,
}

impl MemoryIdentityProvider {
    /// An empty provider: every lookup misses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account with a password.
    pub fn add_user(&mut self, name: &str, uid: u32, gid: u32, password: &str) -> &mut Self {
        self.users
            .insert(name.to_string(), (UserRecord { uid, gid }, password.to_string()));
        self
    }

    /// Add a group with its member names.
    pub fn add_group(&mut self, group: &str, members: &[&str]) -> &mut Self {
        self.groups.insert(
            group.to_string(),
            members.iter().map(|m| (*m).to_string()).collect(),
        );
        self
    }

    /// Register a principal accepted by [`IdentityProvider::accept_negotiate`]
    /// (the token payload must equal the principal name).
    pub fn add_principal(&mut self, principal: &str) -> &mut Self {
        self.principals.push(principal.to_string());
        self
    }
}

impl IdentityProvider for MemoryIdentityProvider {
    fn validate_password(&self, username: &str, password: &str) -> Result<()> {
        match self.users.get(username) {
            Some((_, stored)) if stored == password => Ok(()),
            Some(_) => Err(Error::identity("Basic", format!("bad password for \"{username}\""))),
            None => Err(Error::identity("Basic", format!("unknown user \"{username}\""))),
        }
    }

    fn lookup_user(&self, name: &str) -> Option<UserRecord> {
        self.users.get(name).map(|(rec, _)| *rec)
    }

    fn user_for_uid(&self, uid: u32) -> Option<String> {
        self.users
            .iter()
            .find(|(_, (rec, _))| rec.uid == uid)
            .map(|(name, _)| name.clone())
    }

    fn user_in_group(&self, username: &str, group: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|members| members.iter().any(|m| m == username))
    }

    fn accept_negotiate(&self, token: &[u8]) -> Result<String> {
        let principal = std::str::from_utf8(token)
            .map_err(|_| Error::identity("Negotiate", "token is not valid UTF-8"))?;
        if self.principals.iter().any(|p| p == principal) {
            Ok(principal.to_string())
        } else {
            Err(Error::identity(
                "Negotiate",
                format!("security context rejected for \"{principal}\""),
            ))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
