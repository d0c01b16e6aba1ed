//! Local token store — the `Local` authentication scheme backend.
//!
//! The scheduler issues short-lived tokens to local clients (the web UI and
//! command-line tools) so they can re-authenticate over loopback without
//! prompting again. A token binds a username and the auth type that was
//! satisfied when it was issued; lookup reuses both.
//!
//! Tokens are random and compared in constant time. Expired tokens are
//! evicted lazily on access.

use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use rand::RngExt;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::acl::location::AuthType;

/// A token bound to the username it was issued for.
#[derive(Debug, Clone)]
struct LocalToken {
    username: String,
    auth_type: AuthType,
    expires: SystemTime,
}

impl LocalToken {
    fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires
    }
}

/// In-memory store of issued local tokens, keyed by token value.
#[derive(Debug, Default)]
pub struct LocalTokenStore {
    tokens: DashMap<String, LocalToken>,
}

impl LocalTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token for `username`, valid for `ttl`.
    ///
    /// Format: 32 lowercase hex digits (128 bits of entropy).
    pub fn issue(&self, username: &str, auth_type: AuthType, ttl: Duration) -> String {
        let random_bytes: [u8; 16] = rand::rng().random();
        let token = hex::encode(random_bytes);

        self.tokens.insert(
            token.clone(),
            LocalToken {
                username: username.to_string(),
                auth_type,
                expires: SystemTime::now() + ttl,
            },
        );

        debug!(username = %username, "Issued local token");
        token
    }

    /// Look up a presented token.
    ///
    /// Comparison is constant-time over the token bytes. Returns the bound
    /// `(username, auth_type)`; an expired token is evicted and misses.
    #[must_use]
    pub fn lookup(&self, presented: &str) -> Option<(String, AuthType)> {
        let mut found: Option<String> = None;
        for entry in &self.tokens {
            if entry.key().as_bytes().ct_eq(presented.as_bytes()).into() {
                found = Some(entry.key().clone());
            }
        }

        let key = found?;
        let token = self.tokens.get(&key)?.clone();

        if token.is_expired() {
            // Lazy eviction: remove on access
            self.tokens.remove(&key);
            debug!(username = %token.username, "Lazy-evicted expired local token");
            return None;
        }

        Some((token.username, token.auth_type))
    }

    /// Remove all expired tokens; returns how many were dropped.
    pub fn reap_expired(&self) -> usize {
        let expired: Vec<String> = self
            .tokens
            .iter()
            .filter(|e| e.value().is_expired())
            .map(|e| e.key().clone())
            .collect();

        let count = expired.len();
        for key in expired {
            self.tokens.remove(&key);
        }
        count
    }

    /// Number of live entries (expired-but-unreaped included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the store holds no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
