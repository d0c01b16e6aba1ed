//! The authorization context: immutable snapshots, swapped on reload.
//!
//! All tables the decision logic reads (access config, Locations,
//! Policies, the interface list) live in one [`Snapshot`]. A configuration
//! reload builds a fresh snapshot and swaps it in atomically; in-flight
//! requests keep the `Arc` they cloned and never observe partial state.
//! There is no ambient global state.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::acl::location::LocationSet;
use crate::acl::mask::{IpMask, MaskEvaluator, NetInterface};
use crate::acl::policy::PolicySet;
use crate::config::AccessConfig;
use crate::Result;

// ─────────────────────────────────────────────────────────────────────────────
// Snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// One immutable generation of everything the authorizer matches against.
#[derive(Debug)]
pub struct Snapshot {
    /// Scheduler-wide access settings.
    pub access: AccessConfig,
    /// Configured rule blocks.
    pub locations: LocationSet,
    /// Named operation policies.
    pub policies: PolicySet,
    /// Locally-owned interfaces (for interface masks).
    pub interfaces: Vec<NetInterface>,

    exceptions: Vec<IpMask>,
}

impl Snapshot {
    /// Build a snapshot, compiling the configured wildcard-interface
    /// exception list.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when an exception entry is not a valid
    /// address or CIDR range.
    pub fn new(
        access: AccessConfig,
        locations: LocationSet,
        policies: PolicySet,
        interfaces: Vec<NetInterface>,
    ) -> Result<Self> {
        let exceptions = access
            .interface_exceptions
            .iter()
            .map(|s| IpMask::parse(s))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            access,
            locations,
            policies,
            interfaces,
            exceptions,
        })
    }

    /// A mask evaluator over this snapshot's interfaces and exceptions.
    #[must_use]
    pub fn evaluator(&self) -> MaskEvaluator<'_> {
        MaskEvaluator::new(&self.interfaces, &self.exceptions)
    }

    /// Whether `hostname` is the server's own name or a registered alias.
    #[must_use]
    pub fn is_server_name(&self, hostname: &str) -> bool {
        hostname.eq_ignore_ascii_case(&self.access.server_name)
            || self
                .access
                .server_aliases
                .iter()
                .any(|a| a.eq_ignore_ascii_case(hostname))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Context
// ─────────────────────────────────────────────────────────────────────────────

/// Holder of the active [`Snapshot`].
pub struct AuthorizationContext {
    inner: RwLock<Arc<Snapshot>>,
}

impl AuthorizationContext {
    /// Create a context seeded with the startup snapshot.
    #[must_use]
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            inner: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Clone the current active snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.inner.read())
    }

    /// Atomically replace the active snapshot (configuration reload).
    pub fn reload(&self, snapshot: Snapshot) {
        let locations = snapshot.locations.len();
        *self.inner.write() = Arc::new(snapshot);
        info!(locations, "Authorization snapshot reloaded");
    }
}
