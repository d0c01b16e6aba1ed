//! Presented credentials: a PEM-encoded certificate chain.
//!
//! Stored and compared as the raw PEM string (trust records are
//! byte-for-byte comparisons); parsed on demand into the leaf attributes
//! the evaluator needs. Parsing never borrows from the PEM buffer — the
//! extracted [`LeafInfo`] owns its fields.

use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use x509_parser::extensions::GeneralName;
use x509_parser::pem::Pem;
use x509_parser::prelude::X509Certificate;

use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Credentials
// ─────────────────────────────────────────────────────────────────────────────

/// A PEM-encoded certificate chain as presented by a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pem: String,
}

impl Credentials {
    /// Wrap a PEM chain string.
    #[must_use]
    pub fn new(pem: impl Into<String>) -> Self {
        Self { pem: pem.into() }
    }

    /// The raw PEM string (what trust records store and compare).
    #[must_use]
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Number of certificate blocks in the chain.
    #[must_use]
    pub fn chain_len(&self) -> usize {
        Pem::iter_from_buffer(self.pem.as_bytes())
            .filter(|block| {
                block
                    .as_ref()
                    .is_ok_and(|b| b.label == "CERTIFICATE")
            })
            .count()
    }

    /// Parse the leaf (first) certificate's attributes.
    ///
    /// # Errors
    ///
    /// Returns `Error::CertParse` when no certificate block is present or
    /// the leaf does not parse.
    pub fn leaf(&self) -> Result<LeafInfo> {
        let block = self.der_blocks().next().ok_or_else(|| {
            Error::CertParse("no CERTIFICATE block in credentials".to_string())
        })?;
        LeafInfo::from_der(&block)
    }

    /// DER bytes of the chain's last certificate (its root), for byte
    /// comparison against a site CA.
    #[must_use]
    pub fn root_der(&self) -> Option<Vec<u8>> {
        self.der_blocks().last()
    }

    fn der_blocks(&self) -> impl Iterator<Item = Vec<u8>> + '_ {
        Pem::iter_from_buffer(self.pem.as_bytes())
            .filter_map(std::result::Result::ok)
            .filter(|b| b.label == "CERTIFICATE")
            .map(|b| b.contents)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Leaf attributes
// ─────────────────────────────────────────────────────────────────────────────

/// Attributes extracted from a leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafInfo {
    /// Subject Common Name.
    pub common_name: Option<String>,
    /// Issuer Common Name.
    pub issuer: Option<String>,
    /// Start of the validity window.
    pub not_before: OffsetDateTime,
    /// End of the validity window.
    pub not_after: OffsetDateTime,
    /// Serial number, lowercase hex with `:` separators.
    pub serial: String,
    /// Subject Alternative Name DNS entries.
    pub san_dns: Vec<String>,
    /// SHA-256 fingerprint of the DER encoding, for logs.
    pub fingerprint: String,
    /// Whether subject and issuer DNs are identical.
    pub self_signed: bool,
}

impl LeafInfo {
    /// Parse a DER-encoded certificate into its leaf attributes.
    ///
    /// # Errors
    ///
    /// Returns `Error::CertParse` when the DER does not parse.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        use x509_parser::prelude::FromDer;

        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::CertParse(format!("failed to parse certificate: {e}")))?;

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_owned);

        let issuer = cert
            .issuer()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_owned);

        let mut san_dns = Vec::new();
        if let Ok(Some(san_ext)) = cert.subject_alternative_name() {
            for name in &san_ext.value.general_names {
                if let GeneralName::DNSName(dns) = name {
                    san_dns.push((*dns).to_owned());
                }
            }
        }

        Ok(Self {
            common_name,
            issuer,
            not_before: cert.validity().not_before.to_datetime(),
            not_after: cert.validity().not_after.to_datetime(),
            serial: cert.raw_serial_as_string(),
            san_dns,
            fingerprint: hex::encode(Sha256::digest(der)),
            self_signed: cert.subject().as_raw() == cert.issuer().as_raw(),
        })
    }

    /// Whether `hostname` is valid for this certificate: a case-insensitive
    /// match against the CN or any SAN DNS entry, with single-label
    /// wildcard support (`*.example.com` matches `printer.example.com` but
    /// not `a.b.example.com`).
    #[must_use]
    pub fn valid_for_name(&self, hostname: &str) -> bool {
        self.common_name
            .as_deref()
            .is_some_and(|cn| name_matches(cn, hostname))
            || self.san_dns.iter().any(|san| name_matches(san, hostname))
    }

    /// Whether `now` falls outside the validity window.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now < self.not_before || now > self.not_after
    }
}

/// Certificate name match: exact (case-insensitive) or leftmost-label
/// wildcard.
fn name_matches(pattern: &str, hostname: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix("*.") {
        match hostname.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest.eq_ignore_ascii_case(suffix),
            None => false,
        }
    } else {
        pattern.eq_ignore_ascii_case(hostname)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
