//! Credential trust: PEM parsing, the persistent trust store, and the
//! trust-on-first-use evaluator.

pub mod credentials;
pub mod evaluator;
pub mod store;

pub use credentials::{Credentials, LeafInfo};
pub use evaluator::{SystemTrustVerifier, Trust, TrustEvaluator};
pub use store::TrustStore;
