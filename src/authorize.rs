//! The per-operation authorization decision.
//!
//! [`Authorizer::is_authorized`] is the top-level gate: it resolves the
//! best rule block for the request, evaluates host access, authenticates
//! the caller, and walks the required-names list. The sequence is terminal
//! (the first applicable step decides) and its order is load-bearing:
//! `Satisfy Any` can excuse a missing identity but not a denied host, and
//! `@SYSTEM` is only consulted after every other name fails.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::acl::location::{
    AuthLevel, AuthType, Encryption, HttpMethod, Location, RequiredName, Satisfy,
};
use crate::acl::policy::IppOperation;
use crate::audit::{self, AuditEvent};
use crate::auth::authenticator::{AuthUser, Authenticator};
use crate::auth::identity::{AdminCapabilityChecker, AuthorityService, IdentityProvider};
use crate::auth::local_tokens::LocalTokenStore;
use crate::auth::Connection;
use crate::context::{AuthorizationContext, Snapshot};

// ─────────────────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP outcome of an authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// 200 — the operation may proceed.
    Ok,
    /// 401 — credentials are missing or unusable.
    Unauthorized,
    /// 403 — the caller is known but not entitled.
    Forbidden,
    /// 426 — the connection must be upgraded to TLS first.
    UpgradeRequired,
}

impl AuthStatus {
    /// Numeric HTTP status code.
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::UpgradeRequired => 426,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the transport layer hands over for one decision. Created per
/// request, discarded after the decision.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Connection state.
    pub connection: Connection,
    /// Request method.
    pub method: HttpMethod,
    /// Canonical resource path.
    pub path: String,
    /// Raw `Authorization` header value, when present.
    pub authorization: Option<String>,
    /// IPP `requesting-user-name` attribute, when present.
    pub requesting_user_name: Option<String>,
    /// Owner of the target job/subscription, for `@OWNER` checks.
    pub owner: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorizer
// ─────────────────────────────────────────────────────────────────────────────

/// The top-level decision function over the active snapshot and the
/// injected identity collaborators.
pub struct Authorizer {
    context: Arc<AuthorizationContext>,
    authenticator: Authenticator,
    identity: Arc<dyn IdentityProvider>,
    authority: Option<Arc<dyn AuthorityService>>,
    admin_check: Arc<dyn AdminCapabilityChecker>,
}

impl Authorizer {
    /// Wire up an authorizer. `authority` is `None` on platforms without an
    /// authorization service.
    pub fn new(
        context: Arc<AuthorizationContext>,
        identity: Arc<dyn IdentityProvider>,
        authority: Option<Arc<dyn AuthorityService>>,
        admin_check: Arc<dyn AdminCapabilityChecker>,
        local_tokens: Arc<LocalTokenStore>,
    ) -> Self {
        let authenticator =
            Authenticator::new(Arc::clone(&identity), authority.clone(), local_tokens);
        Self {
            context,
            authenticator,
            identity,
            authority,
            admin_check,
        }
    }

    /// The authentication dispatcher (for issuing local tokens after a
    /// successful login).
    #[must_use]
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Authorize a plain HTTP request against the configured Locations.
    #[must_use]
    pub fn is_authorized(&self, request: &AuthRequest) -> AuthStatus {
        let snapshot = self.context.current();
        let rule = snapshot.locations.find_best(&request.path, request.method);
        self.decide(&snapshot, rule, request)
    }

    /// Authorize an IPP operation against a named policy's rule blocks.
    ///
    /// An unknown policy (or a policy without a usable limit) falls back to
    /// the same conservative default as a request with no matching
    /// Location.
    #[must_use]
    pub fn check_policy(
        &self,
        policy_name: &str,
        op: IppOperation,
        request: &AuthRequest,
    ) -> AuthStatus {
        let snapshot = self.context.current();
        let rule = snapshot
            .policies
            .find(policy_name)
            .and_then(|p| p.limit_for(op));
        if rule.is_none() {
            warn!(policy = %policy_name, op = op.0, "No usable policy limit");
        }
        self.decide(&snapshot, rule, request)
    }

    // ── the decision sequence ─────────────────────────────────────────────

    fn decide(
        &self,
        snapshot: &Snapshot,
        rule: Option<&Location>,
        request: &AuthRequest,
    ) -> AuthStatus {
        let (status, username) = self.decide_inner(snapshot, rule, request);

        audit::emit(&AuditEvent::decision(
            status,
            &request.path,
            &request.connection.hostname,
            username.as_deref(),
            rule.map(|r| r.path.as_str()),
        ));
        status
    }

    #[allow(clippy::too_many_lines)]
    fn decide_inner(
        &self,
        snapshot: &Snapshot,
        rule: Option<&Location>,
        request: &AuthRequest,
    ) -> (AuthStatus, Option<String>) {
        let conn = &request.connection;

        // 1. No matching rule: only requests addressed to ourselves pass.
        let Some(rule) = rule else {
            let local = conn.hostname.eq_ignore_ascii_case("localhost")
                || snapshot.is_server_name(&conn.hostname);
            if local {
                return (AuthStatus::Ok, None);
            }
            debug!(path = %request.path, hostname = %conn.hostname, "No rule block, remote peer");
            return (AuthStatus::Forbidden, None);
        };

        // 2. Resolve the effective auth type.
        let auth_type = match rule.auth_type {
            AuthType::Default => snapshot.access.default_auth_type,
            other => other,
        };

        // 3. Host/IP access.
        let host_allowed = rule.check_access(conn.addr, &conn.hostname, &snapshot.evaluator());
        if !host_allowed && rule.satisfy == Satisfy::All {
            debug!(path = %request.path, hostname = %conn.hostname, "Host denied");
            return (AuthStatus::Forbidden, None);
        }

        // 4. Encryption escalation. Negotiate carries its own protection,
        //    so it is exempt from the upgrade demand.
        if rule.encryption == Encryption::Required
            && !conn.tls
            && !conn.is_local()
            && rule.satisfy == Satisfy::All
            && auth_type != AuthType::Negotiate
        {
            return (AuthStatus::UpgradeRequired, None);
        }

        // 5. Nothing to prove.
        if rule.auth_level == AuthLevel::Anonymous
            || (auth_type == AuthType::None && rule.names.is_empty())
        {
            return (AuthStatus::Ok, None);
        }

        let user = self
            .authenticator
            .authenticate(conn, request.authorization.as_deref(), Some(rule));

        // 6. No authenticated identity.
        let username = match &user {
            Some(user) => user.username.clone(),
            None => {
                if let (Some(name), true) = (&request.requesting_user_name, rule.policy_limit) {
                    // Delegated, unauthenticated identity from the IPP
                    // request itself
                    name.clone()
                } else if rule.satisfy == Satisfy::All || !host_allowed {
                    return (AuthStatus::Unauthorized, None);
                } else {
                    return (AuthStatus::Ok, None);
                }
            }
        };

        // 7. Scheme must satisfy the rule. Basic satisfies any non-None
        //    requirement; Negotiate satisfies when a delegated peer UID
        //    exists.
        if let Some(user) = &user {
            if auth_type != AuthType::None && user.auth_type != auth_type {
                let acceptable = user.auth_type == AuthType::Basic
                    || (user.auth_type == AuthType::Negotiate && user.peer_uid.is_some());
                if !acceptable {
                    debug!(
                        required = ?auth_type,
                        presented = ?user.auth_type,
                        "Auth scheme does not satisfy rule"
                    );
                    return (AuthStatus::Unauthorized, Some(username));
                }
            }
        }

        // 8. Optional @domain normalization on both sides of the owner
        //    comparison.
        let (username_cmp, owner_cmp) = if snapshot.access.strip_domain {
            (
                strip_domain(&username).to_string(),
                request.owner.as_deref().map(|o| strip_domain(o).to_string()),
            )
        } else {
            (username.clone(), request.owner.clone())
        };

        // 9./10. Required-names scan.
        let status = self.check_names(
            snapshot,
            rule,
            conn,
            user.as_ref(),
            &username_cmp,
            owner_cmp.as_deref(),
        );
        (status, Some(username))
    }

    /// Scan the rule's names in order, deferring `@SYSTEM` to a second
    /// pass.
    fn check_names(
        &self,
        snapshot: &Snapshot,
        rule: &Location,
        conn: &Connection,
        user: Option<&AuthUser>,
        username: &str,
        owner: Option<&str>,
    ) -> AuthStatus {
        let group_level = rule.auth_level == AuthLevel::Group;

        // User level with no names: any authenticated identity passes.
        if !group_level && rule.names.is_empty() {
            return AuthStatus::Ok;
        }

        let authref = user.and_then(|u| u.authref.as_ref());

        for name in &rule.names {
            let matched = match name {
                RequiredName::System => false, // deferred
                RequiredName::User(n) if !group_level => n.eq_ignore_ascii_case(username),
                // At group level a literal name is a group name
                RequiredName::User(n) => self.identity.user_in_group(username, n),
                RequiredName::Owner => {
                    !group_level && owner.is_some_and(|o| o.eq_ignore_ascii_case(username))
                }
                RequiredName::Group(g) => self.identity.user_in_group(username, g),
                RequiredName::AuthKey(right) => match (authref, &self.authority) {
                    (Some(reference), Some(authority)) => authority.check_right(reference, right),
                    _ => false,
                },
            };
            if matched {
                return AuthStatus::Ok;
            }
        }

        // Deferred @SYSTEM: system-group membership plus the platform
        // admin-capability probe.
        if rule
            .names
            .iter()
            .any(|n| matches!(n, RequiredName::System))
        {
            let in_system_group = snapshot
                .access
                .system_groups
                .iter()
                .any(|g| self.identity.user_in_group(username, g));
            if in_system_group && self.admin_check.is_admin_capable(conn) {
                return AuthStatus::Ok;
            }
        }

        debug!(username = %username, rule = %rule.path, "No required name matched");
        if username.is_empty() {
            AuthStatus::Unauthorized
        } else {
            AuthStatus::Forbidden
        }
    }
}

/// Drop an `@domain` suffix.
fn strip_domain(name: &str) -> &str {
    name.split('@').next().unwrap_or(name)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
