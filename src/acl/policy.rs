//! Named operation policies.
//!
//! A `Policy` bundles per-IPP-operation rule blocks (each shaped like a
//! [`Location`]) under a name printers can reference. An operation resolves
//! to its specific rule block, falling back to the policy's generic limit.
//! Policies are immutable snapshots, replaced wholesale on reload.

use std::collections::HashMap;

use super::location::Location;

// ─────────────────────────────────────────────────────────────────────────────
// IPP operations
// ─────────────────────────────────────────────────────────────────────────────

/// An IPP operation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IppOperation(pub u16);

impl IppOperation {
    /// Print-Job
    pub const PRINT_JOB: Self = Self(0x0002);
    /// Validate-Job
    pub const VALIDATE_JOB: Self = Self(0x0004);
    /// Create-Job
    pub const CREATE_JOB: Self = Self(0x0005);
    /// Send-Document
    pub const SEND_DOCUMENT: Self = Self(0x0006);
    /// Cancel-Job
    pub const CANCEL_JOB: Self = Self(0x0008);
    /// Get-Job-Attributes
    pub const GET_JOB_ATTRIBUTES: Self = Self(0x0009);
    /// Get-Jobs
    pub const GET_JOBS: Self = Self(0x000a);
    /// Get-Printer-Attributes
    pub const GET_PRINTER_ATTRIBUTES: Self = Self(0x000b);
    /// Hold-Job
    pub const HOLD_JOB: Self = Self(0x000c);
    /// Release-Job
    pub const RELEASE_JOB: Self = Self(0x000d);
    /// Pause-Printer
    pub const PAUSE_PRINTER: Self = Self(0x0010);
    /// Resume-Printer
    pub const RESUME_PRINTER: Self = Self(0x0011);
    /// Purge-Jobs
    pub const PURGE_JOBS: Self = Self(0x0012);
}

// ─────────────────────────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────────────────────────

/// A named bundle of per-operation rule blocks plus the private-attribute
/// access lists for jobs and subscriptions.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Policy name, referenced by printer configuration.
    pub name: String,
    /// Who may read private job attributes.
    pub job_private_access: Vec<String>,
    /// Which job attributes are private.
    pub job_private_values: Vec<String>,
    /// Who may read private subscription attributes.
    pub sub_private_access: Vec<String>,
    /// Which subscription attributes are private.
    pub sub_private_values: Vec<String>,

    op_limits: HashMap<IppOperation, Location>,
    default_limit: Option<Location>,
}

impl Policy {
    /// A new policy with the standard private-attribute defaults.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            job_private_access: vec!["@OWNER".to_string(), "@SYSTEM".to_string()],
            job_private_values: [
                "job-name",
                "job-originating-host-name",
                "job-originating-user-name",
                "phone",
            ]
            .map(str::to_string)
            .to_vec(),
            sub_private_access: vec!["@OWNER".to_string(), "@SYSTEM".to_string()],
            sub_private_values: [
                "notify-events",
                "notify-pull-method",
                "notify-recipient-uri",
                "notify-subscriber-user-name",
                "notify-user-data",
            ]
            .map(str::to_string)
            .to_vec(),
            op_limits: HashMap::new(),
            default_limit: None,
        }
    }

    /// Attach `rule` to each of the given operations. A later rule for an
    /// operation replaces an earlier one.
    pub fn add_op_limit(&mut self, ops: &[IppOperation], rule: Location) {
        for op in ops {
            self.op_limits.insert(*op, rule.clone());
        }
    }

    /// Set the generic limit used by operations with no specific rule.
    ///
    /// The generic limit is marked as a policy limit: it may adopt an IPP
    /// `requesting-user-name` as a delegated identity during authorization.
    pub fn set_default_limit(&mut self, mut rule: Location) {
        rule.policy_limit = true;
        self.default_limit = Some(rule);
    }

    /// Resolve the rule block for `op`.
    #[must_use]
    pub fn limit_for(&self, op: IppOperation) -> Option<&Location> {
        self.op_limits.get(&op).or(self.default_limit.as_ref())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PolicySet
// ─────────────────────────────────────────────────────────────────────────────

/// All configured policies, looked up by case-insensitive name.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    policies: Vec<Policy>,
}

impl PolicySet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a policy; a duplicate name replaces the earlier policy.
    pub fn add(&mut self, policy: Policy) {
        if let Some(existing) = self
            .policies
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&policy.name))
        {
            *existing = policy;
        } else {
            self.policies.push(policy);
        }
    }

    /// Find a policy by name, case-insensitively.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Policy> {
        self.policies
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::location::{AuthLevel, AuthType};

    #[test]
    fn op_limit_overrides_default() {
        let mut policy = Policy::new("default");

        let mut cancel = Location::new("/");
        cancel.auth_level = AuthLevel::User;
        policy.add_op_limit(&[IppOperation::CANCEL_JOB], cancel);

        let generic = Location::new("/");
        policy.set_default_limit(generic);

        assert_eq!(
            policy
                .limit_for(IppOperation::CANCEL_JOB)
                .unwrap()
                .auth_level,
            AuthLevel::User
        );
        assert_eq!(
            policy
                .limit_for(IppOperation::PRINT_JOB)
                .unwrap()
                .auth_level,
            AuthLevel::Anonymous
        );
    }

    #[test]
    fn default_limit_is_marked_as_policy_limit() {
        let mut policy = Policy::new("default");
        policy.set_default_limit(Location::new("/"));
        assert!(policy.limit_for(IppOperation::PRINT_JOB).unwrap().policy_limit);
    }

    #[test]
    fn op_limits_are_not_policy_limits() {
        let mut policy = Policy::new("default");
        policy.add_op_limit(&[IppOperation::PAUSE_PRINTER], Location::new("/"));
        assert!(
            !policy
                .limit_for(IppOperation::PAUSE_PRINTER)
                .unwrap()
                .policy_limit
        );
    }

    #[test]
    fn no_limits_resolves_to_none() {
        let policy = Policy::new("empty");
        assert!(policy.limit_for(IppOperation::PRINT_JOB).is_none());
    }

    #[test]
    fn one_rule_can_cover_many_operations() {
        let mut policy = Policy::new("default");
        let mut admin = Location::new("/");
        admin.auth_type = AuthType::Basic;
        policy.add_op_limit(
            &[IppOperation::PAUSE_PRINTER, IppOperation::RESUME_PRINTER],
            admin,
        );

        for op in [IppOperation::PAUSE_PRINTER, IppOperation::RESUME_PRINTER] {
            assert_eq!(policy.limit_for(op).unwrap().auth_type, AuthType::Basic);
        }
    }

    #[test]
    fn private_attribute_defaults_cover_owner_and_system() {
        let policy = Policy::new("default");
        assert_eq!(policy.job_private_access, &["@OWNER", "@SYSTEM"]);
        assert!(
            policy
                .job_private_values
                .contains(&"job-originating-user-name".to_string())
        );
        assert_eq!(policy.sub_private_access, &["@OWNER", "@SYSTEM"]);
    }

    #[test]
    fn policy_set_lookup_is_case_insensitive() {
        let mut set = PolicySet::new();
        set.add(Policy::new("Default"));
        assert!(set.find("default").is_some());
        assert!(set.find("DEFAULT").is_some());
        assert!(set.find("other").is_none());
    }

    #[test]
    fn duplicate_policy_name_replaces() {
        let mut set = PolicySet::new();
        set.add(Policy::new("default"));

        let mut replacement = Policy::new("default");
        replacement.set_default_limit(Location::new("/"));
        set.add(replacement);

        assert!(
            set.find("default")
                .unwrap()
                .limit_for(IppOperation::PRINT_JOB)
                .is_some()
        );
    }
}
