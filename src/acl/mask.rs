//! Allow/deny mask evaluation.
//!
//! A [`Location`](super::location::Location) carries ordered allow and deny
//! lists of [`AuthMask`]s. Evaluation of a single list is a pure OR: the
//! list matches if **any** mask matches, independent of order. The
//! order-dependent combination of the two lists lives in
//! [`Location::check_access`](super::location::Location::check_access).
//!
//! # Address representation
//!
//! IP masks keep the four-word `address[4]` / `netmask[4]` form so arbitrary
//! (non-CIDR) netmasks work uniformly for IPv4 and IPv6. IPv4 addresses
//! occupy the last word; IPv4-mapped IPv6 addresses are normalised to their
//! IPv4 form before comparison.

use std::net::IpAddr;

use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// IP masks
// ─────────────────────────────────────────────────────────────────────────────

/// An IP address mask: `(client & netmask) == address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpMask {
    address: [u32; 4],
    netmask: [u32; 4],
}

impl IpMask {
    /// Build a mask from an address and an explicit (possibly non-CIDR)
    /// netmask. The stored address is pre-masked so comparison is a plain
    /// word-wise equality.
    #[must_use]
    pub fn from_parts(address: IpAddr, netmask: IpAddr) -> Self {
        let mask = words(netmask);
        let mut addr = words(address);
        for i in 0..4 {
            addr[i] &= mask[i];
        }
        Self {
            address: addr,
            netmask: mask,
        }
    }

    /// Build a mask from an address and a CIDR prefix length.
    ///
    /// The prefix counts from the top of the 128-bit word array for IPv6
    /// and from the top of the last word for IPv4.
    #[must_use]
    pub fn from_cidr(address: IpAddr, prefix: u8) -> Self {
        let bits = match address {
            IpAddr::V4(_) => u32::from(prefix.min(32)) + 96,
            IpAddr::V6(_) => u32::from(prefix.min(128)),
        };

        let mut mask = [0u32; 4];
        for (i, word) in mask.iter_mut().enumerate() {
            let start = i as u32 * 32;
            if bits >= start + 32 {
                *word = u32::MAX;
            } else if bits > start {
                *word = u32::MAX << (32 - (bits - start));
            }
        }

        let mut addr = words(address);
        for i in 0..4 {
            addr[i] &= mask[i];
        }
        Self {
            address: addr,
            netmask: mask,
        }
    }

    /// Parse `"addr"` or `"addr/prefix"` notation.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the address or prefix does not parse.
    pub fn parse(s: &str) -> Result<Self> {
        let (addr_str, prefix) = match s.split_once('/') {
            Some((a, p)) => {
                let prefix: u8 = p
                    .parse()
                    .map_err(|_| Error::Config(format!("Invalid prefix length in '{s}'")))?;
                (a, Some(prefix))
            }
            None => (s, None),
        };

        let addr: IpAddr = addr_str
            .parse()
            .map_err(|_| Error::Config(format!("Invalid IP address in '{s}'")))?;

        let prefix = prefix.unwrap_or(match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        });

        Ok(Self::from_cidr(addr, prefix))
    }

    /// `true` iff `(client[i] & netmask[i]) == address[i]` for all words.
    #[must_use]
    pub fn matches(&self, client: IpAddr) -> bool {
        let client = words(client);
        (0..4).all(|i| (client[i] & self.netmask[i]) == self.address[i])
    }
}

/// Map an address onto the four-word comparison form.
///
/// IPv4 (and IPv4-mapped IPv6) land in the last word with the upper words
/// zero, so a v4 client matches a v4 mask regardless of which socket family
/// delivered it.
fn words(addr: IpAddr) -> [u32; 4] {
    match addr {
        IpAddr::V4(v4) => [0, 0, 0, u32::from(v4)],
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => [0, 0, 0, u32::from(v4)],
            None => {
                let o = v6.octets();
                let w = |i: usize| u32::from_be_bytes([o[i], o[i + 1], o[i + 2], o[i + 3]]);
                [w(0), w(4), w(8), w(12)]
            }
        },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Name masks
// ─────────────────────────────────────────────────────────────────────────────

/// A hostname mask: exact name, or domain suffix when the pattern starts
/// with `.` (e.g. `".example.com"` matches `printer.example.com`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMask {
    pattern: String,
    domain_suffix: bool,
}

impl NameMask {
    /// Build a mask from a configured pattern. Leading `.` selects
    /// domain-suffix matching.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let domain_suffix = pattern.starts_with('.');
        Self {
            pattern,
            domain_suffix,
        }
    }

    /// Case-insensitive exact or suffix match.
    #[must_use]
    pub fn matches(&self, hostname: &str) -> bool {
        if self.domain_suffix {
            hostname.len() >= self.pattern.len()
                && hostname
                    .get(hostname.len() - self.pattern.len()..)
                    .is_some_and(|tail| tail.eq_ignore_ascii_case(&self.pattern))
        } else {
            hostname.eq_ignore_ascii_case(&self.pattern)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Interfaces
// ─────────────────────────────────────────────────────────────────────────────

/// A locally-owned network interface, supplied by the discovery collaborator.
#[derive(Debug, Clone)]
pub struct NetInterface {
    /// Interface name (`"eth0"`, `"lo"`, ...).
    pub name: String,
    /// Interface address.
    pub address: IpAddr,
    /// Interface netmask.
    pub netmask: IpAddr,
    /// Loopback flag; wildcard interface masks skip loopback interfaces.
    pub loopback: bool,
}

impl NetInterface {
    /// `true` when `client` falls inside this interface's subnet.
    #[must_use]
    pub fn contains(&self, client: IpAddr) -> bool {
        let mask = words(self.netmask);
        let own = words(self.address);
        let client = words(client);
        (0..4).all(|i| (client[i] & mask[i]) == (own[i] & mask[i]))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AuthMask
// ─────────────────────────────────────────────────────────────────────────────

/// One entry in a Location's allow or deny list. Never mutated after
/// creation.
#[derive(Debug, Clone)]
pub enum AuthMask {
    /// IP address/netmask mask.
    Ip(IpMask),
    /// Hostname or domain-suffix mask.
    Name(NameMask),
    /// Interface mask: a name, or `"*"` for any non-loopback local subnet.
    Interface(String),
}

impl AuthMask {
    /// Convenience: an `Allow all` / `Deny all` style mask.
    ///
    /// An all-zero netmask, so it matches every address of either family
    /// (a v4 `/0` would still pin the upper words and miss IPv6 clients).
    #[must_use]
    pub fn all() -> Self {
        Self::Ip(IpMask {
            address: [0; 4],
            netmask: [0; 4],
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Evaluator
// ─────────────────────────────────────────────────────────────────────────────

/// Evaluates mask lists against a client, with the interface table and the
/// configured wildcard-interface exceptions in scope.
#[derive(Debug, Clone, Copy)]
pub struct MaskEvaluator<'a> {
    interfaces: &'a [NetInterface],
    exceptions: &'a [IpMask],
}

impl<'a> MaskEvaluator<'a> {
    /// Create an evaluator over the current interface snapshot.
    #[must_use]
    pub fn new(interfaces: &'a [NetInterface], exceptions: &'a [IpMask]) -> Self {
        Self {
            interfaces,
            exceptions,
        }
    }

    /// `true` if **any** mask matches the client. A pure OR over the list;
    /// reordering the masks never changes the result.
    #[must_use]
    pub fn check_auth(&self, ip: IpAddr, hostname: &str, masks: &[AuthMask]) -> bool {
        masks.iter().any(|mask| match mask {
            AuthMask::Ip(m) => m.matches(ip),
            AuthMask::Name(m) => m.matches(hostname),
            AuthMask::Interface(name) if name == "*" => {
                self.exceptions.iter().any(|e| e.matches(ip))
                    || self
                        .interfaces
                        .iter()
                        .any(|i| !i.loopback && i.contains(ip))
            }
            AuthMask::Interface(name) => self
                .interfaces
                .iter()
                .any(|i| i.name == *name && i.contains(ip)),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
