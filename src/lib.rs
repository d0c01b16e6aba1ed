//! spoolgate — request-authorization core for a print scheduler.
//!
//! Every incoming print or administration request is gated here before any
//! job or printer state is touched:
//!
//! - **Location matching**: longest-prefix resolution of configured access
//!   rules against the request path and method
//! - **Access masks**: IP/netmask, hostname/domain-suffix, and interface
//!   allow/deny evaluation
//! - **Authentication**: Basic, peer-credential, local-token,
//!   authorization-reference, and Kerberos/Negotiate schemes, dispatched in
//!   a fixed priority order
//! - **Operation authorization**: the per-request allow/deny decision
//!   against user, group, and policy requirements
//! - **Credential trust**: trust-on-first-use evaluation of presented
//!   X.509 chains against a persistent store
//!
//! The HTTP transport, TLS handshake, configuration parser, and system
//! identity databases are collaborators injected through plain types and
//! traits; this crate is the decision layer only. Nothing here is fatal:
//! the worst outcome of any failure is a denied request.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod acl;
pub mod audit;
pub mod auth;
pub mod authorize;
pub mod config;
pub mod context;
pub mod error;
pub mod trust;

pub use authorize::{AuthRequest, AuthStatus, Authorizer};
pub use context::{AuthorizationContext, Snapshot};
pub use error::{Error, Result};
pub use trust::{Trust, TrustEvaluator};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
