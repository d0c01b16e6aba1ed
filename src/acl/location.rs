//! Locations: resource-scoped access rules and longest-prefix matching.
//!
//! A `Location` binds a resource path prefix to authentication and
//! authorization requirements plus ordered allow/deny mask lists. The
//! configuration loader builds a [`LocationSet`] once per reload; requests
//! resolve against it read-only via [`LocationSet::find_best`].
//!
//! `<Limit>` / `<LimitExcept>` blocks become child Locations sharing the
//! parent's path: the child inherits the parent's ACLs, claims a method
//! bitmask, and the parent's own bitmask is reduced by that claim, so every
//! `(path, method)` pair resolves to exactly one rule block.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use super::mask::{AuthMask, MaskEvaluator};
use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Methods
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP methods a Location limit can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// OPTIONS
    Options,
    /// GET
    Get,
    /// HEAD
    Head,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// TRACE
    Trace,
}

impl HttpMethod {
    fn bit(self) -> u16 {
        match self {
            Self::Options => 1 << 0,
            Self::Get => 1 << 1,
            Self::Head => 1 << 2,
            Self::Post => 1 << 3,
            Self::Put => 1 << 4,
            Self::Delete => 1 << 5,
            Self::Trace => 1 << 6,
        }
    }
}

/// Bitmask over [`HttpMethod`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodMask(u16);

impl MethodMask {
    /// All methods.
    pub const ALL: Self = Self(0x7f);
    /// No methods.
    pub const NONE: Self = Self(0);

    /// A mask containing exactly the given methods.
    #[must_use]
    pub fn of(methods: &[HttpMethod]) -> Self {
        Self(methods.iter().fold(0, |acc, m| acc | m.bit()))
    }

    /// Whether `method` is included.
    #[must_use]
    pub fn contains(self, method: HttpMethod) -> bool {
        self.0 & method.bit() != 0
    }

    /// Everything except the given mask (`<LimitExcept>` semantics).
    #[must_use]
    pub fn inverted(self) -> Self {
        Self(Self::ALL.0 ^ self.0)
    }

    /// Remove the methods of `other` from this mask.
    #[must_use]
    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Whether no method is included.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for MethodMask {
    fn default() -> Self {
        Self::ALL
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rule attributes
// ─────────────────────────────────────────────────────────────────────────────

/// Authentication scheme a Location requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    /// No authentication required.
    #[default]
    None,
    /// HTTP Basic (validated against the system identity provider).
    Basic,
    /// Kerberos single-sign-on.
    Negotiate,
    /// Use the scheduler-wide default type.
    Default,
}

/// How much of an identity the Location demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthLevel {
    /// No identity needed.
    #[default]
    Anonymous,
    /// A user matching the required-names list.
    User,
    /// Membership in one of the required groups.
    Group,
}

/// Whether both host and credential checks must pass, or either suffices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Satisfy {
    /// Host access AND authentication must both pass.
    #[default]
    All,
    /// Either host access or authentication suffices.
    Any,
}

/// Minimum encryption requirement for the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encryption {
    /// Encrypt when the client asks for it.
    #[default]
    IfRequested,
    /// Never encrypt.
    Never,
    /// Refuse unencrypted remote connections.
    Required,
}

/// Combination order for the allow and deny mask lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Order {
    /// Start allowed; deny list applies, then allow list re-allows.
    #[default]
    DenyAllow,
    /// Start denied; allow list applies, then deny list re-denies.
    AllowDeny,
}

/// One entry of a `Require` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredName {
    /// A literal user name.
    User(String),
    /// `@group` — membership in the named group.
    Group(String),
    /// `@OWNER` — the authenticated user owns the target job.
    Owner,
    /// `@SYSTEM` — membership in a configured system group, checked last.
    System,
    /// `@AUTHKEY(right)` — the presented authorization reference holds the
    /// named right.
    AuthKey(String),
}

impl RequiredName {
    /// Parse one configured name (`alice`, `@staff`, `@OWNER`, `@SYSTEM`,
    /// `@AUTHKEY(system.print.admin)`).
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if name.eq_ignore_ascii_case("@OWNER") {
            Self::Owner
        } else if name.eq_ignore_ascii_case("@SYSTEM") {
            Self::System
        } else if let Some(rest) = name
            .strip_prefix("@AUTHKEY(")
            .and_then(|r| r.strip_suffix(')'))
        {
            Self::AuthKey(rest.to_string())
        } else if let Some(group) = name.strip_prefix('@') {
            Self::Group(group.to_string())
        } else {
            Self::User(name.to_string())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Location
// ─────────────────────────────────────────────────────────────────────────────

/// One access rule block. Immutable once the owning [`LocationSet`] is
/// published in a snapshot.
#[derive(Debug, Clone)]
pub struct Location {
    /// Resource path prefix this rule covers.
    pub path: String,
    /// Methods this rule block claims.
    pub limit: MethodMask,
    /// Allow/deny combination order.
    pub order: Order,
    /// Required authentication scheme.
    pub auth_type: AuthType,
    /// Required identity level.
    pub auth_level: AuthLevel,
    /// Host-check / credential-check combination.
    pub satisfy: Satisfy,
    /// Minimum encryption requirement.
    pub encryption: Encryption,
    /// Ordered allow masks.
    pub allow: Vec<AuthMask>,
    /// Ordered deny masks.
    pub deny: Vec<AuthMask>,
    /// `Require` names, scanned in order (`@SYSTEM` deferred to last).
    pub names: Vec<RequiredName>,
    /// `true` when this block is a policy's generic operation limit, which
    /// may adopt an IPP `requesting-user-name` as a delegated identity.
    pub policy_limit: bool,
    /// Set on `<Limit>`/`<LimitExcept>` children; children never parent
    /// further children.
    child: bool,
}

impl Location {
    /// A new rule block covering all methods with no requirements.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            limit: MethodMask::ALL,
            order: Order::default(),
            auth_type: AuthType::default(),
            auth_level: AuthLevel::default(),
            satisfy: Satisfy::default(),
            encryption: Encryption::default(),
            allow: Vec::new(),
            deny: Vec::new(),
            names: Vec::new(),
            policy_limit: false,
            child: false,
        }
    }

    /// Host/IP access decision for this rule block.
    ///
    /// `localhost` is always allowed. Otherwise the allow and deny lists
    /// combine per [`Order`]: the list named second takes final precedence.
    #[must_use]
    pub fn check_access(&self, ip: IpAddr, hostname: &str, eval: &MaskEvaluator<'_>) -> bool {
        if hostname.eq_ignore_ascii_case("localhost") {
            return true;
        }

        match self.order {
            Order::DenyAllow => {
                let mut allowed = true;
                if eval.check_auth(ip, hostname, &self.deny) {
                    allowed = false;
                }
                if eval.check_auth(ip, hostname, &self.allow) {
                    allowed = true;
                }
                allowed
            }
            Order::AllowDeny => {
                let mut allowed = false;
                if eval.check_auth(ip, hostname, &self.allow) {
                    allowed = true;
                }
                if eval.check_auth(ip, hostname, &self.deny) {
                    allowed = false;
                }
                allowed
            }
        }
    }

    /// Whether the names list demands an authorization key (`@AUTHKEY` or
    /// `@SYSTEM`); peer-credential authentication is refused for such rules.
    #[must_use]
    pub fn requires_auth_key(&self) -> bool {
        self.names
            .iter()
            .any(|n| matches!(n, RequiredName::AuthKey(_) | RequiredName::System))
    }

    /// Whether `@OWNER` appears in the names list.
    #[must_use]
    pub fn allows_owner(&self) -> bool {
        self.names.iter().any(|n| matches!(n, RequiredName::Owner))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LocationSet
// ─────────────────────────────────────────────────────────────────────────────

/// All configured rule blocks, resolved by longest path prefix.
#[derive(Debug, Clone, Default)]
pub struct LocationSet {
    locations: Vec<Location>,
}

impl LocationSet {
    /// An empty set (every lookup misses; the authorizer then falls back to
    /// its localhost-only conservative default).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule block. The first writer wins on a duplicate path: the
    /// later duplicate is dropped.
    pub fn add(&mut self, location: Location) -> &mut Location {
        if let Some(pos) = self.locations.iter().position(|l| l.path == location.path) {
            return &mut self.locations[pos];
        }
        self.locations.push(location);
        self.locations.last_mut().unwrap()
    }

    /// Create a `<Limit>` child under `parent`: same path, inherited ACLs,
    /// the given method claim. The parent stops claiming those methods.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no rule block with `parent`'s path exists.
    pub fn add_limit(&mut self, parent: &str, methods: MethodMask) -> Result<&mut Location> {
        self.add_child(parent, methods)
    }

    /// Create a `<LimitExcept>` child under `parent`: claims every method
    /// *not* named.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no rule block with `parent`'s path exists.
    pub fn add_limit_except(
        &mut self,
        parent: &str,
        methods: MethodMask,
    ) -> Result<&mut Location> {
        self.add_child(parent, methods.inverted())
    }

    fn add_child(&mut self, parent: &str, claim: MethodMask) -> Result<&mut Location> {
        let parent_pos = self
            .locations
            .iter()
            .position(|l| l.path == parent && !l.child)
            .ok_or_else(|| Error::Config(format!("No Location '{parent}' to limit")))?;

        let mut child = self.locations[parent_pos].clone();
        child.limit = claim;
        child.child = true;
        self.locations[parent_pos].limit = self.locations[parent_pos].limit.without(claim);

        self.locations.push(child);
        Ok(self.locations.last_mut().unwrap())
    }

    /// Resolve the most specific rule block for `(path, method)`.
    ///
    /// The path is canonicalized (query string dropped, one trailing `/`
    /// dropped, a trailing `.ppd` dropped under `/printers/` and
    /// `/classes/`); matching is case-insensitive under those two trees and
    /// case-sensitive elsewhere. Among qualifying blocks the longest prefix
    /// wins; the first writer wins on an exact tie.
    #[must_use]
    pub fn find_best(&self, path: &str, method: HttpMethod) -> Option<&Location> {
        let resource = canonicalize(path);
        let ci = ci_resource(&resource);

        let mut best: Option<&Location> = None;
        let mut best_len = 0usize;

        for loc in &self.locations {
            if !loc.limit.contains(method) || loc.path.len() > resource.len() {
                continue;
            }
            let Some(prefix) = resource.get(..loc.path.len()) else {
                continue;
            };
            let matched = if ci {
                prefix.eq_ignore_ascii_case(&loc.path)
            } else {
                prefix == loc.path
            };
            // Strictly greater, so the first writer keeps an exact tie
            if matched && (loc.path.len() > best_len || best.is_none()) {
                best = Some(loc);
                best_len = loc.path.len();
            }
        }

        best
    }

    /// Number of rule blocks (children included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Whether the set holds no rule blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

/// Canonical resource form used for matching.
fn canonicalize(path: &str) -> String {
    let mut resource = match path.split_once('?') {
        Some((before, _)) => before,
        None => path,
    };

    if resource.len() > 1 && resource.ends_with('/') {
        resource = &resource[..resource.len() - 1];
    }

    if (resource.starts_with("/printers/") || resource.starts_with("/classes/"))
        && resource.ends_with(".ppd")
    {
        resource = &resource[..resource.len() - 4];
    }

    resource.to_string()
}

/// Whether a resource lives under the case-insensitive trees.
fn ci_resource(resource: &str) -> bool {
    resource.starts_with("/printers/") || resource.starts_with("/classes/")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::mask::{IpMask, NameMask};

    fn v4(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn set_with(paths: &[&str]) -> LocationSet {
        let mut set = LocationSet::new();
        for p in paths {
            set.add(Location::new(*p));
        }
        set
    }

    // ── canonicalization ──────────────────────────────────────────────────

    #[test]
    fn canonicalize_drops_query_string() {
        assert_eq!(canonicalize("/admin?op=add-printer"), "/admin");
    }

    #[test]
    fn canonicalize_drops_one_trailing_slash() {
        assert_eq!(canonicalize("/admin/"), "/admin");
        assert_eq!(canonicalize("/"), "/");
    }

    #[test]
    fn canonicalize_drops_ppd_under_printer_trees() {
        assert_eq!(canonicalize("/printers/laser.ppd"), "/printers/laser");
        assert_eq!(canonicalize("/classes/floor2.ppd"), "/classes/floor2");
        // Elsewhere .ppd is part of the name
        assert_eq!(canonicalize("/files/laser.ppd"), "/files/laser.ppd");
    }

    // ── find_best ─────────────────────────────────────────────────────────

    #[test]
    fn find_best_picks_longest_prefix() {
        let set = set_with(&["/", "/admin", "/admin/conf"]);
        let best = set.find_best("/admin/conf/cupsd.conf", HttpMethod::Get);
        assert_eq!(best.unwrap().path, "/admin/conf");
    }

    #[test]
    fn find_best_falls_back_to_root() {
        let set = set_with(&["/", "/admin"]);
        let best = set.find_best("/jobs", HttpMethod::Get);
        assert_eq!(best.unwrap().path, "/");
    }

    #[test]
    fn find_best_returns_none_on_empty_set() {
        let set = LocationSet::new();
        assert!(set.find_best("/anything", HttpMethod::Get).is_none());
    }

    #[test]
    fn find_best_is_case_insensitive_under_printers() {
        let set = set_with(&["/printers/Laser"]);
        let best = set.find_best("/printers/laser", HttpMethod::Get);
        assert_eq!(best.unwrap().path, "/printers/Laser");
    }

    #[test]
    fn find_best_is_case_sensitive_elsewhere() {
        let set = set_with(&["/admin"]);
        assert!(set.find_best("/Admin", HttpMethod::Get).is_none());
    }

    #[test]
    fn find_best_matches_ppd_request_to_printer_location() {
        let set = set_with(&["/printers/laser"]);
        let best = set.find_best("/printers/laser.ppd", HttpMethod::Get);
        assert_eq!(best.unwrap().path, "/printers/laser");
    }

    #[test]
    fn find_best_skips_blocks_not_claiming_the_method() {
        let mut set = LocationSet::new();
        set.add(Location::new("/admin")).limit = MethodMask::of(&[HttpMethod::Get]);
        assert!(set.find_best("/admin", HttpMethod::Post).is_none());
        assert!(set.find_best("/admin", HttpMethod::Get).is_some());
    }

    #[test]
    fn longest_prefix_property_holds() {
        // No qualifying block with a shorter prefix may win
        let set = set_with(&["/", "/printers", "/printers/laser", "/admin"]);
        for path in ["/printers/laser/jobs", "/printers/other", "/admin/x", "/"] {
            let best = set.find_best(path, HttpMethod::Get).unwrap();
            let canon = canonicalize(path);
            for loc in &set.locations {
                if loc.path.len() <= canon.len()
                    && canon[..loc.path.len()] == loc.path
                    && loc.limit.contains(HttpMethod::Get)
                {
                    assert!(
                        best.path.len() >= loc.path.len(),
                        "{path}: chose {} over longer {}",
                        best.path,
                        loc.path
                    );
                }
            }
        }
    }

    // ── Limit / LimitExcept ───────────────────────────────────────────────

    #[test]
    fn limit_child_claims_methods_from_parent() {
        let mut set = LocationSet::new();
        set.add(Location::new("/printers"));
        set.add_limit("/printers", MethodMask::of(&[HttpMethod::Post]))
            .unwrap()
            .auth_type = AuthType::Basic;

        let get = set.find_best("/printers", HttpMethod::Get).unwrap();
        assert_eq!(get.auth_type, AuthType::None);

        let post = set.find_best("/printers", HttpMethod::Post).unwrap();
        assert_eq!(post.auth_type, AuthType::Basic);
    }

    #[test]
    fn limit_except_child_claims_the_complement() {
        let mut set = LocationSet::new();
        set.add(Location::new("/admin"));
        set.add_limit_except("/admin", MethodMask::of(&[HttpMethod::Get, HttpMethod::Head]))
            .unwrap()
            .auth_level = AuthLevel::User;

        // GET stays with the parent block
        let get = set.find_best("/admin", HttpMethod::Get).unwrap();
        assert_eq!(get.auth_level, AuthLevel::Anonymous);

        // PUT goes to the LimitExcept child
        let put = set.find_best("/admin", HttpMethod::Put).unwrap();
        assert_eq!(put.auth_level, AuthLevel::User);
    }

    #[test]
    fn limit_child_inherits_parent_acls() {
        let mut set = LocationSet::new();
        let parent = set.add(Location::new("/jobs"));
        parent.order = Order::AllowDeny;
        parent.allow.push(AuthMask::Ip(IpMask::parse("10.0.0.0/8").unwrap()));

        let child = set
            .add_limit("/jobs", MethodMask::of(&[HttpMethod::Post]))
            .unwrap();
        assert_eq!(child.order, Order::AllowDeny);
        assert_eq!(child.allow.len(), 1);
    }

    #[test]
    fn add_limit_unknown_parent_is_config_error() {
        let mut set = LocationSet::new();
        let err = set.add_limit("/nowhere", MethodMask::ALL);
        assert!(err.is_err());
    }

    // ── check_access ──────────────────────────────────────────────────────

    fn eval() -> MaskEvaluator<'static> {
        MaskEvaluator::new(&[], &[])
    }

    #[test]
    fn localhost_always_allowed() {
        let mut loc = Location::new("/admin");
        loc.order = Order::AllowDeny; // default-denied
        assert!(loc.check_access(v4("127.0.0.1"), "localhost", &eval()));
        assert!(loc.check_access(v4("127.0.0.1"), "LOCALHOST", &eval()));
    }

    #[test]
    fn deny_allow_order_allow_list_takes_precedence() {
        // Allow 10.0.0.0/8; Deny all; Order Deny,Allow
        let mut loc = Location::new("/");
        loc.order = Order::DenyAllow;
        loc.deny.push(AuthMask::all());
        loc.allow.push(AuthMask::Ip(IpMask::parse("10.0.0.0/8").unwrap()));

        assert!(loc.check_access(v4("10.1.2.3"), "client", &eval()));
        assert!(!loc.check_access(v4("8.8.8.8"), "client", &eval()));
    }

    #[test]
    fn allow_deny_order_deny_list_takes_precedence() {
        let mut loc = Location::new("/");
        loc.order = Order::AllowDeny;
        loc.allow.push(AuthMask::all());
        loc.deny.push(AuthMask::Name(NameMask::new(".blocked.example")));

        assert!(loc.check_access(v4("8.8.8.8"), "ok.example", &eval()));
        assert!(!loc.check_access(v4("8.8.8.8"), "bad.blocked.example", &eval()));
    }

    #[test]
    fn deny_allow_with_empty_lists_starts_allowed() {
        let loc = Location::new("/");
        assert!(loc.check_access(v4("8.8.8.8"), "anyone", &eval()));
    }

    #[test]
    fn allow_deny_with_empty_lists_starts_denied() {
        let mut loc = Location::new("/");
        loc.order = Order::AllowDeny;
        assert!(!loc.check_access(v4("8.8.8.8"), "anyone", &eval()));
    }

    // ── required names ────────────────────────────────────────────────────

    #[test]
    fn required_name_parse_variants() {
        assert_eq!(RequiredName::parse("alice"), RequiredName::User("alice".into()));
        assert_eq!(RequiredName::parse("@staff"), RequiredName::Group("staff".into()));
        assert_eq!(RequiredName::parse("@OWNER"), RequiredName::Owner);
        assert_eq!(RequiredName::parse("@owner"), RequiredName::Owner);
        assert_eq!(RequiredName::parse("@SYSTEM"), RequiredName::System);
        assert_eq!(
            RequiredName::parse("@AUTHKEY(system.print.admin)"),
            RequiredName::AuthKey("system.print.admin".into())
        );
    }

    #[test]
    fn requires_auth_key_for_system_and_authkey() {
        let mut loc = Location::new("/admin");
        assert!(!loc.requires_auth_key());
        loc.names.push(RequiredName::System);
        assert!(loc.requires_auth_key());

        let mut loc2 = Location::new("/admin");
        loc2.names.push(RequiredName::AuthKey("right".into()));
        assert!(loc2.requires_auth_key());
        assert!(!loc2.allows_owner());
    }

    // ── method mask ───────────────────────────────────────────────────────

    #[test]
    fn method_mask_inversion_is_complement() {
        let m = MethodMask::of(&[HttpMethod::Get, HttpMethod::Head]);
        let inv = m.inverted();
        assert!(!inv.contains(HttpMethod::Get));
        assert!(!inv.contains(HttpMethod::Head));
        assert!(inv.contains(HttpMethod::Post));
        assert!(inv.contains(HttpMethod::Delete));
    }

    #[test]
    fn method_mask_without_removes_claim() {
        let all = MethodMask::ALL;
        let claimed = MethodMask::of(&[HttpMethod::Post]);
        let rest = all.without(claimed);
        assert!(!rest.contains(HttpMethod::Post));
        assert!(rest.contains(HttpMethod::Get));
    }
}
