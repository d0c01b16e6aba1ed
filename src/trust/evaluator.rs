//! Trust-on-first-use evaluation of presented credentials.
//!
//! Decides how much to trust a certificate chain for a common name against
//! the persistent [`TrustStore`]. The result is one of exactly five
//! levels; `Expired` overrides an `Ok`/`Renewed` outcome, never an
//! `Invalid` one (a replacement certificate that was rejected as not newly
//! issued stays rejected after it expires too).
//!
//! The whole evaluation holds the store guard: load, compare, and persist
//! are one read-modify-write sequence.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::config::TrustConfig;
use crate::trust::credentials::{Credentials, LeafInfo};
use crate::trust::store::TrustStore;

// ─────────────────────────────────────────────────────────────────────────────
// Trust levels
// ─────────────────────────────────────────────────────────────────────────────

/// How much a presented credential is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trust {
    /// Credentials are trusted.
    Ok,
    /// Credentials are not trusted.
    Invalid,
    /// Credentials are outside their validity window.
    Expired,
    /// Credentials replace an expired stored record and were persisted.
    Renewed,
    /// Credentials could not be parsed.
    Unknown,
}

/// Full verification against the platform trust store, where the platform
/// offers one. Consulted for multi-certificate chains whose root is not a
/// registered site CA.
pub trait SystemTrustVerifier: Send + Sync {
    /// Whether the platform trusts the chain.
    fn verify_chain(&self, pem: &str) -> bool;
}

// ─────────────────────────────────────────────────────────────────────────────
// Evaluator
// ─────────────────────────────────────────────────────────────────────────────

/// TOFU evaluator over a trust store and the trust configuration.
pub struct TrustEvaluator {
    config: TrustConfig,
    store: Arc<TrustStore>,
    system_trust: Option<Arc<dyn SystemTrustVerifier>>,
}

impl TrustEvaluator {
    /// Create an evaluator without platform trust verification.
    #[must_use]
    pub fn new(config: TrustConfig, store: Arc<TrustStore>) -> Self {
        Self {
            config,
            store,
            system_trust: None,
        }
    }

    /// Attach a platform trust verifier.
    #[must_use]
    pub fn with_system_trust(mut self, verifier: Arc<dyn SystemTrustVerifier>) -> Self {
        self.system_trust = Some(verifier);
        self
    }

    /// Evaluate trust for `credentials` presented under `common_name`.
    ///
    /// `require_ca` demands a CA-verified chain regardless of the TOFU
    /// configuration.
    #[must_use]
    pub fn evaluate(&self, common_name: &str, credentials: &Credentials, require_ca: bool) -> Trust {
        self.evaluate_at(common_name, credentials, require_ca, OffsetDateTime::now_utc())
    }

    /// [`TrustEvaluator::evaluate`] at an explicit point in time.
    #[must_use]
    pub fn evaluate_at(
        &self,
        common_name: &str,
        credentials: &Credentials,
        require_ca: bool,
        now: OffsetDateTime,
    ) -> Trust {
        let _guard = self.store.guard();

        let leaf = match credentials.leaf() {
            Ok(leaf) => leaf,
            Err(e) => {
                warn!(common_name = %common_name, error = %e, "Unparseable credentials");
                return Trust::Unknown;
            }
        };

        if self.store.is_revoked(&leaf.serial) {
            warn!(
                common_name = %common_name,
                serial = %leaf.serial,
                "Presented certificate is revoked"
            );
            return Trust::Invalid;
        }

        let stored = self.store.load(common_name);
        let mut first_use = stored.is_none();

        let mut trust = match stored {
            Some(ref stored_pem) if stored_pem.as_str() == credentials.pem() => Trust::Ok,
            Some(ref stored_pem) => {
                match Credentials::new(stored_pem.clone()).leaf() {
                    Ok(stored_leaf) => self.changed_credentials(
                        common_name,
                        credentials,
                        &leaf,
                        &stored_leaf,
                        require_ca,
                        now,
                    ),
                    Err(e) => {
                        // Degrade like any other unreadable record
                        warn!(
                            common_name = %common_name,
                            error = %e,
                            "Stored trust record unparseable, treating as first use"
                        );
                        first_use = true;
                        self.first_use(common_name, credentials, &leaf, require_ca)
                    }
                }
            }
            None => self.first_use(common_name, credentials, &leaf, require_ca),
        };

        // Expiry overrides a positive outcome, never an Invalid one
        if matches!(trust, Trust::Ok | Trust::Renewed)
            && !self.config.allow_expired_certs
            && leaf.is_expired_at(now)
        {
            trust = Trust::Expired;
        }

        // TOFU "remember": a first-use Ok becomes the stored record
        if trust == Trust::Ok && first_use && self.config.trust_first_use {
            if let Err(e) = self.store.save(common_name, credentials.pem()) {
                warn!(common_name = %common_name, error = %e, "Failed to persist trust record");
            }
        }

        debug!(
            common_name = %common_name,
            fingerprint = %leaf.fingerprint,
            ?trust,
            "Credential trust evaluated"
        );
        trust
    }

    /// Stored record exists and differs from the presented credentials.
    fn changed_credentials(
        &self,
        common_name: &str,
        credentials: &Credentials,
        leaf: &LeafInfo,
        stored_leaf: &LeafInfo,
        require_ca: bool,
        now: OffsetDateTime,
    ) -> Trust {
        if !self.config.trust_first_use || require_ca {
            return Trust::Invalid;
        }

        // A genuine renewal must push the expiration forward
        if leaf.not_after <= stored_leaf.not_after {
            return Trust::Invalid;
        }

        if !leaf.valid_for_name(common_name) {
            return Trust::Invalid;
        }

        if stored_leaf.not_after < now {
            // The old record ran out; adopt the replacement
            if let Err(e) = self.store.save(common_name, credentials.pem()) {
                warn!(common_name = %common_name, error = %e, "Failed to persist renewed record");
            }
            return Trust::Renewed;
        }

        // Newer certificate accepted, but the stored record stands until it
        // expires
        Trust::Ok
    }

    /// No usable stored record for this common name.
    fn first_use(
        &self,
        common_name: &str,
        credentials: &Credentials,
        leaf: &LeafInfo,
        require_ca: bool,
    ) -> Trust {
        if (self.config.validate_certs || require_ca) && !leaf.valid_for_name(common_name) {
            return Trust::Invalid;
        }

        if credentials.chain_len() > 1 {
            let root_ok = credentials
                .root_der()
                .is_some_and(|der| self.store.matches_site_root(&der))
                || self
                    .system_trust
                    .as_ref()
                    .is_some_and(|v| v.verify_chain(credentials.pem()));
            if !root_ok {
                return Trust::Invalid;
            }
        } else if require_ca {
            return Trust::Invalid;
        } else if !self.config.trust_first_use {
            return Trust::Invalid;
        } else if !self.config.allow_self_signed {
            return Trust::Invalid;
        }

        Trust::Ok
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
