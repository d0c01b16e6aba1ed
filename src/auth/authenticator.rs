//! The authentication dispatcher.
//!
//! Classifies the `Authorization` header and validates the claimed identity
//! against the injected collaborators. Fail-closed: any failure leaves the
//! connection unauthenticated (logged), never authenticated as someone
//! else, and never a hard error to the transport.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, warn};

use crate::acl::location::{AuthType, Location};
use crate::auth::identity::{AuthRef, AuthorityService, IdentityProvider};
use crate::auth::local_tokens::LocalTokenStore;
use crate::auth::scheme::{SchemeKind, SchemeToken};
use crate::auth::{Connection, MAX_USERNAME_LEN, Transport, checked_name};
use crate::{Error, Result};

/// A successfully authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Validated username (or Kerberos principal).
    pub username: String,
    /// The auth type this authentication satisfies. Peer-credential,
    /// authorization-reference, and local-token logins satisfy `Basic`.
    pub auth_type: AuthType,
    /// Which header branch authenticated the caller.
    pub scheme: SchemeKind,
    /// Peer UID captured for backend credential delegation (unix-domain
    /// peers).
    pub peer_uid: Option<u32>,
    /// The decoded authorization reference, kept for `@AUTHKEY` right
    /// checks.
    pub authref: Option<AuthRef>,
}

/// Authentication dispatcher over the injected identity collaborators.
pub struct Authenticator {
    identity: Arc<dyn IdentityProvider>,
    authority: Option<Arc<dyn AuthorityService>>,
    local_tokens: Arc<LocalTokenStore>,
}

impl Authenticator {
    /// Create a dispatcher. `authority` is `None` on platforms without an
    /// authorization service; `AuthRef` headers then always fail.
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        authority: Option<Arc<dyn AuthorityService>>,
        local_tokens: Arc<LocalTokenStore>,
    ) -> Self {
        Self {
            identity,
            authority,
            local_tokens,
        }
    }

    /// The local token store, for issuing tokens after a successful login.
    #[must_use]
    pub fn local_tokens(&self) -> &LocalTokenStore {
        &self.local_tokens
    }

    /// Authenticate the connection from its `Authorization` header.
    ///
    /// `rule` is the Location the request resolved to, consulted for the
    /// peer-credential auth-key restriction. Returns `None` when no header
    /// is present or any branch fails; the caller proceeds as anonymous.
    #[must_use]
    pub fn authenticate(
        &self,
        connection: &Connection,
        authorization: Option<&str>,
        rule: Option<&Location>,
    ) -> Option<AuthUser> {
        let header = authorization?;
        if header.is_empty() {
            return None;
        }

        let (kind, result) = match SchemeToken::classify(header) {
            SchemeToken::AuthRef(payload) => {
                (SchemeKind::AuthRef, self.auth_ref(connection, payload))
            }
            SchemeToken::PeerCred(username) => {
                (SchemeKind::PeerCred, self.peer_cred(connection, username, rule))
            }
            SchemeToken::Local(token) => (SchemeKind::Local, self.local(connection, token)),
            SchemeToken::Basic(payload) => (SchemeKind::Basic, self.basic(payload)),
            SchemeToken::Negotiate(payload) => {
                (SchemeKind::Negotiate, self.negotiate(connection, payload))
            }
            SchemeToken::Unknown(scheme) => {
                warn!(scheme = %scheme, "Unsupported authorization scheme");
                return None;
            }
        };

        match result {
            Ok(user) => {
                debug!(
                    username = %user.username,
                    scheme = kind.as_str(),
                    "Authenticated"
                );
                Some(user)
            }
            Err(e) => {
                warn!(scheme = kind.as_str(), error = %e, "Authentication failed");
                None
            }
        }
    }

    // ── AuthRef ───────────────────────────────────────────────────────────

    fn auth_ref(&self, connection: &Connection, payload: &str) -> Result<AuthUser> {
        if !connection.is_local() {
            return Err(Error::identity(
                "AuthRef",
                "authorization references are only accepted over loopback",
            ));
        }

        let authority = self
            .authority
            .as_ref()
            .ok_or_else(|| Error::identity("AuthRef", "no authorization service configured"))?;

        let bytes = BASE64
            .decode(payload)
            .map_err(|e| Error::identity("AuthRef", format!("invalid base64: {e}")))?;
        let reference = AuthRef(bytes);

        let resolved = authority.resolve(&reference)?;

        // Username from the reference's environment, else from the peer UID
        let username = match resolved.username {
            Some(name) => name,
            None => {
                let uid = connection
                    .peer_uid()
                    .ok_or_else(|| Error::identity("AuthRef", "no username and no peer UID"))?;
                self.identity.user_for_uid(uid).ok_or_else(|| {
                    Error::identity("AuthRef", format!("no account for peer UID {uid}"))
                })?
            }
        };
        checked_name("username", &username, MAX_USERNAME_LEN)?;

        Ok(AuthUser {
            username,
            auth_type: AuthType::Basic,
            scheme: SchemeKind::AuthRef,
            peer_uid: connection.peer_uid(),
            authref: Some(reference),
        })
    }

    // ── PeerCred ──────────────────────────────────────────────────────────

    fn peer_cred(
        &self,
        connection: &Connection,
        username: &str,
        rule: Option<&Location>,
    ) -> Result<AuthUser> {
        let Transport::Unix { peer_uid } = connection.transport else {
            return Err(Error::identity(
                "PeerCred",
                "peer credentials are only accepted on domain sockets",
            ));
        };
        let peer_uid = peer_uid
            .ok_or_else(|| Error::identity("PeerCred", "peer credential lookup failed"))?;

        // Rules demanding an authorization key cannot be satisfied by a
        // bare peer credential, unless the owner escape applies.
        if let Some(rule) = rule {
            if rule.requires_auth_key() && !rule.allows_owner() {
                return Err(Error::identity(
                    "PeerCred",
                    "rule requires an authorization key",
                ));
            }
        }

        checked_name("username", username, MAX_USERNAME_LEN)?;

        let record = self
            .identity
            .lookup_user(username)
            .ok_or_else(|| Error::identity("PeerCred", format!("unknown user \"{username}\"")))?;

        if record.uid != peer_uid {
            return Err(Error::identity(
                "PeerCred",
                format!(
                    "peer UID {peer_uid} does not match user \"{username}\" (UID {})",
                    record.uid
                ),
            ));
        }

        Ok(AuthUser {
            username: username.to_string(),
            auth_type: AuthType::Basic,
            scheme: SchemeKind::PeerCred,
            peer_uid: Some(peer_uid),
            authref: None,
        })
    }

    // ── Local ─────────────────────────────────────────────────────────────

    fn local(&self, connection: &Connection, token: &str) -> Result<AuthUser> {
        if !connection.is_local() {
            return Err(Error::identity(
                "Local",
                "local tokens are only accepted over loopback",
            ));
        }

        let (username, auth_type) = self
            .local_tokens
            .lookup(token)
            .ok_or_else(|| Error::identity("Local", "unknown or expired token"))?;

        Ok(AuthUser {
            username,
            auth_type,
            scheme: SchemeKind::Local,
            peer_uid: None,
            authref: None,
        })
    }

    // ── Basic ─────────────────────────────────────────────────────────────

    fn basic(&self, payload: &str) -> Result<AuthUser> {
        let bytes = BASE64
            .decode(payload)
            .map_err(|e| Error::identity("Basic", format!("invalid base64: {e}")))?;
        let decoded = String::from_utf8(bytes)
            .map_err(|_| Error::identity("Basic", "credentials are not valid UTF-8"))?;

        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| Error::identity("Basic", "missing ':' separator"))?;

        if username.is_empty() {
            return Err(Error::identity("Basic", "empty username"));
        }
        if password.is_empty() {
            return Err(Error::identity("Basic", "empty password"));
        }
        checked_name("username", username, MAX_USERNAME_LEN)?;

        self.identity.validate_password(username, password)?;

        Ok(AuthUser {
            username: username.to_string(),
            auth_type: AuthType::Basic,
            scheme: SchemeKind::Basic,
            peer_uid: None,
            authref: None,
        })
    }

    // ── Negotiate ─────────────────────────────────────────────────────────

    fn negotiate(&self, connection: &Connection, payload: &str) -> Result<AuthUser> {
        if payload.is_empty() {
            return Err(Error::identity("Negotiate", "no credentials in header"));
        }

        let token = BASE64
            .decode(payload)
            .map_err(|e| Error::identity("Negotiate", format!("invalid base64: {e}")))?;

        let principal = self.identity.accept_negotiate(&token)?;
        checked_name("username", &principal, MAX_USERNAME_LEN)?;

        // Domain-socket peers also carry a UID the backends can assume
        let peer_uid = connection.peer_uid();

        Ok(AuthUser {
            username: principal,
            auth_type: AuthType::Negotiate,
            scheme: SchemeKind::Negotiate,
            peer_uid,
            authref: None,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
