//! Configuration types for the authorization core.
//!
//! The scheduler's configuration parser (Locations, Policies, masks) lives
//! outside this crate; what is configured here are the scheduler-wide knobs
//! the decision logic consumes: server identity, the default authentication
//! type, system groups, and the credential-trust settings.
//!
//! Loaded from YAML with environment overrides (`SPOOLGATE_` prefix).

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::acl::location::AuthType;
use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Access-control configuration
    pub access: AccessConfig,
    /// Credential trust configuration
    pub trust: TrustConfig,
}

/// Scheduler-wide access-control settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Canonical server name; requests with no matching Location are only
    /// allowed when addressed to localhost, this name, or an alias.
    pub server_name: String,

    /// Additional hostnames this server answers to.
    pub server_aliases: Vec<String>,

    /// Effective authentication type for Locations declaring `Default`.
    pub default_auth_type: AuthType,

    /// Groups whose members satisfy an `@SYSTEM` requirement (subject to
    /// the admin-capability check).
    pub system_groups: Vec<String>,

    /// Strip an `@domain` suffix from usernames and job owners before
    /// comparing them. Off by default; enable when an upstream directory
    /// reports qualified names but job ownership records plain ones.
    pub strip_domain: bool,

    /// CIDR ranges always accepted by wildcard interface masks, in addition
    /// to local subnet containment. Historical vendor exceptions
    /// (e.g. `"fd00::/8"`) belong here rather than in code.
    pub interface_exceptions: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            server_name: "localhost".to_string(),
            server_aliases: Vec::new(),
            default_auth_type: AuthType::Basic,
            system_groups: default_system_groups(),
            strip_domain: false,
            interface_exceptions: Vec::new(),
        }
    }
}

fn default_system_groups() -> Vec<String> {
    vec!["sys".to_string(), "system".to_string(), "root".to_string()]
}

/// Credential-trust (TOFU) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Accept previously unseen credentials and remember them.
    ///
    /// When `false`, every certificate must validate against a site CA or
    /// the system trust store.
    pub trust_first_use: bool,

    /// Validate the certificate hostname even for first-use credentials.
    pub validate_certs: bool,

    /// Treat certificates outside their validity window as trusted anyway.
    ///
    /// Only for closed networks where clock skew on embedded print servers
    /// is routine.
    pub allow_expired_certs: bool,

    /// Accept self-signed leaf certificates on first use.
    pub allow_self_signed: bool,

    /// Directory holding one stored credential file per common name.
    pub store_dir: PathBuf,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            trust_first_use: true,
            validate_certs: false,
            allow_expired_certs: false,
            allow_self_signed: true,
            store_dir: PathBuf::from("/var/spool/spoolgate/trust"),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        // Load from file if provided
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (SPOOLGATE_ prefix)
        figment = figment.merge(Env::prefixed("SPOOLGATE_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if the server name is empty or no system group is
    /// configured (an `@SYSTEM` requirement would then be unsatisfiable,
    /// locking administrators out).
    pub fn validate(&self) -> Result<()> {
        if self.access.server_name.is_empty() {
            return Err(Error::Config("access.server_name must not be empty".into()));
        }
        if self.access.system_groups.is_empty() {
            return Err(Error::Config(
                "access.system_groups must name at least one group".into(),
            ));
        }
        if self.access.default_auth_type == AuthType::Default {
            return Err(Error::Config(
                "access.default_auth_type must be a concrete type, not 'default'".into(),
            ));
        }
        Ok(())
    }
}
