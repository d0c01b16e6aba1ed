//! File-backed trust store.
//!
//! One file per common name under a configurable directory, holding the
//! PEM credentials accepted for that name. Writes are temp-file + rename
//! for per-call atomicity; there are no transactional guarantees beyond
//! that. A store that cannot be read behaves as though it had never seen
//! the name — trust evaluation degrades, it does not fail.
//!
//! The store also carries the site CA roots (for chain verification by
//! byte comparison) and a revoked-serial set.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Persistent credential records keyed by common name.
#[derive(Debug)]
pub struct TrustStore {
    dir: PathBuf,
    site_roots: Vec<Vec<u8>>,
    revoked_serials: HashSet<String>,
    lock: Mutex<()>,
}

impl TrustStore {
    /// A store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            site_roots: Vec::new(),
            revoked_serials: HashSet::new(),
            lock: Mutex::new(()),
        }
    }

    /// Register a site CA root (PEM, possibly several blocks). Chains whose
    /// root matches one of these byte-for-byte are trusted.
    ///
    /// # Errors
    ///
    /// Returns `Error::CertParse` when the PEM contains no certificate.
    pub fn add_site_root(&mut self, pem: &str) -> Result<()> {
        let mut added = 0usize;
        let blocks = x509_parser::pem::Pem::iter_from_buffer(pem.as_bytes());
        for block in blocks.filter_map(std::result::Result::ok) {
            if block.label == "CERTIFICATE" {
                self.site_roots.push(block.contents);
                added += 1;
            }
        }
        if added == 0 {
            return Err(Error::CertParse(
                "site root PEM contains no certificate".to_string(),
            ));
        }
        Ok(())
    }

    /// Mark a certificate serial as revoked.
    pub fn revoke_serial(&mut self, serial: impl Into<String>) {
        self.revoked_serials.insert(serial.into());
    }

    /// Whether a serial appears in the revocation set.
    #[must_use]
    pub fn is_revoked(&self, serial: &str) -> bool {
        self.revoked_serials.contains(serial)
    }

    /// Whether `der` equals one of the registered site roots.
    #[must_use]
    pub fn matches_site_root(&self, der: &[u8]) -> bool {
        self.site_roots.iter().any(|root| root == der)
    }

    /// Serialize a read-modify-write sequence (load, compare, save).
    #[must_use]
    pub fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }

    /// Load the stored credentials for a common name.
    ///
    /// Read failures (other than the file not existing) are logged and
    /// reported as "no record".
    #[must_use]
    pub fn load(&self, common_name: &str) -> Option<String> {
        let path = self.path_for(common_name);
        match fs::read_to_string(&path) {
            Ok(pem) => Some(pem),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(
                    common_name = %common_name,
                    path = %path.display(),
                    error = %e,
                    "Trust record unreadable, treating as absent"
                );
                None
            }
        }
    }

    /// Persist credentials for a common name (temp file + rename).
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error when the record cannot be written.
    pub fn save(&self, common_name: &str, pem: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(common_name);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, pem)?;
        fs::rename(&tmp, &path)?;

        debug!(common_name = %common_name, path = %path.display(), "Trust record saved");
        Ok(())
    }

    /// Record path for a common name: lowercased, path separators replaced.
    fn path_for(&self, common_name: &str) -> PathBuf {
        let safe: String = common_name
            .to_ascii_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.crt"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
