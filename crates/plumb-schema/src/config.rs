use crate::specs::{AppSpec, CredentialSpec, OrganizationSpec};
use crate::types::{DriverName, ProvisionerType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported config_version: {0}, expected {CONFIG_VERSION}")]
    UnsupportedVersion(u32),
    #[error("driver.name must not be empty")]
    EmptyDriverName,
    #[error("validation.{section}: retry_interval_secs must be > 0 when timeout_secs > 0")]
    ZeroRetryInterval { section: &'static str },
    #[error("{kind} name must not be empty")]
    EmptyName { kind: &'static str },
    #[error("duplicate {kind} '{name}'")]
    Duplicate { kind: &'static str, name: String },
    #[error("credential '{credential}' references unknown organization '{organization}'")]
    UnknownOrganization {
        credential: String,
        organization: String,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    pub config_version: u32,
    pub driver: DriverSection,
    #[serde(default)]
    pub validation: ValidationSection,
    #[serde(default)]
    pub cluster: ClusterSection,
    #[serde(default)]
    pub organizations: Vec<OrganizationSpec>,
    #[serde(default)]
    pub credentials: Vec<CredentialSpec>,
    #[serde(default)]
    pub apps: Vec<AppSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DriverSection {
    pub name: DriverName,
    #[serde(default)]
    pub provisioner: Option<ProvisionerType>,
    #[serde(default)]
    pub default_provisioner: Option<ProvisionerType>,
    #[serde(default = "default_scheduler")]
    pub scheduler: String,
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
    #[serde(default)]
    pub storage_classes: BTreeMap<String, String>,
}

fn default_scheduler() -> String {
    "k8s".to_owned()
}

/// How the validator treats a predicate error that carries no pass/retry/fatal
/// classification.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UnclassifiedErrorPolicy {
    #[default]
    Retry,
    EscalateOnRepeat,
    Fatal,
}

impl fmt::Display for UnclassifiedErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnclassifiedErrorPolicy::Retry => write!(f, "retry"),
            UnclassifiedErrorPolicy::EscalateOnRepeat => write!(f, "escalate-on-repeat"),
            UnclassifiedErrorPolicy::Fatal => write!(f, "fatal"),
        }
    }
}

/// A timeout and fixed retry interval pair, in whole seconds.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WindowSection {
    pub timeout_secs: u64,
    pub retry_interval_secs: u64,
}

impl WindowSection {
    pub const fn new(timeout_secs: u64, retry_interval_secs: u64) -> Self {
        Self {
            timeout_secs,
            retry_interval_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ValidationSection {
    #[serde(default)]
    pub unclassified_errors: UnclassifiedErrorPolicy,
    #[serde(default = "default_volumes_window")]
    pub volumes: WindowSection,
    #[serde(default = "default_app_ready_window")]
    pub app_ready: WindowSection,
    #[serde(default = "default_cleanup_window")]
    pub cleanup: WindowSection,
}

fn default_volumes_window() -> WindowSection {
    WindowSection::new(45, 5)
}

fn default_app_ready_window() -> WindowSection {
    WindowSection::new(600, 10)
}

fn default_cleanup_window() -> WindowSection {
    WindowSection::new(300, 10)
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            unclassified_errors: UnclassifiedErrorPolicy::default(),
            volumes: default_volumes_window(),
            app_ready: default_app_ready_window(),
            cleanup: default_cleanup_window(),
        }
    }
}

/// Target cluster. The `settle_polls` / `reclaim_polls` knobs drive the
/// simulated cluster used by `plumb run`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClusterSection {
    #[serde(default = "default_cluster_name")]
    pub name: String,
    #[serde(default)]
    pub settle_polls: u32,
    #[serde(default)]
    pub reclaim_polls: u32,
    #[serde(default)]
    pub storage_nodes: Vec<String>,
}

fn default_cluster_name() -> String {
    "source".to_owned()
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            name: default_cluster_name(),
            settle_polls: 0,
            reclaim_polls: 0,
            storage_nodes: Vec::new(),
        }
    }
}

impl HarnessConfig {
    /// Minimal configuration for the given driver with default windows.
    pub fn for_driver(name: impl Into<DriverName>) -> Self {
        Self {
            config_version: CONFIG_VERSION,
            driver: DriverSection {
                name: name.into(),
                provisioner: None,
                default_provisioner: None,
                scheduler: default_scheduler(),
                credentials: BTreeMap::new(),
                storage_classes: BTreeMap::new(),
            },
            validation: ValidationSection::default(),
            cluster: ClusterSection::default(),
            organizations: Vec::new(),
            credentials: Vec::new(),
            apps: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.config_version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.config_version));
        }
        if self.driver.name.trim().is_empty() {
            return Err(ConfigError::EmptyDriverName);
        }
        for (section, window) in [
            ("volumes", &self.validation.volumes),
            ("app_ready", &self.validation.app_ready),
            ("cleanup", &self.validation.cleanup),
        ] {
            if window.timeout_secs > 0 && window.retry_interval_secs == 0 {
                return Err(ConfigError::ZeroRetryInterval { section });
            }
        }
        if self.cluster.name.trim().is_empty() {
            return Err(ConfigError::EmptyName { kind: "cluster" });
        }

        let mut orgs = std::collections::BTreeSet::new();
        for org in &self.organizations {
            if org.id.trim().is_empty() {
                return Err(ConfigError::EmptyName {
                    kind: "organization",
                });
            }
            if !orgs.insert(org.id.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "organization",
                    name: org.id.clone(),
                });
            }
        }
        for cred in &self.credentials {
            if cred.name.trim().is_empty() {
                return Err(ConfigError::EmptyName { kind: "credential" });
            }
            if !orgs.contains(cred.organization.as_str()) {
                return Err(ConfigError::UnknownOrganization {
                    credential: cred.name.clone(),
                    organization: cred.organization.clone(),
                });
            }
        }

        let mut apps = std::collections::BTreeSet::new();
        for app in &self.apps {
            if app.name.trim().is_empty() || app.namespace.trim().is_empty() {
                return Err(ConfigError::EmptyName { kind: "app" });
            }
            if !apps.insert(app.key()) {
                return Err(ConfigError::Duplicate {
                    kind: "app",
                    name: app.key(),
                });
            }
        }
        Ok(())
    }
}

pub fn parse_config_str(input: &str) -> Result<HarnessConfig, ConfigError> {
    let config: HarnessConfig = toml::from_str(input)?;
    config.validate()?;
    Ok(config)
}

pub fn parse_config_file(path: impl AsRef<Path>) -> Result<HarnessConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::CloudProvider;

    #[test]
    fn parses_full_config() {
        let input = r#"
config_version = 1

[driver]
name = "pxd"
provisioner = "csi"
default_provisioner = "portworx"
scheduler = "openshift"

[driver.credentials]
token = "abc"

[driver.storage_classes]
csi = "px-csi-db"

[validation]
unclassified_errors = "escalate-on-repeat"

[validation.volumes]
timeout_secs = 30
retry_interval_secs = 3

[cluster]
name = "dest"
settle_polls = 2
reclaim_polls = 1
storage_nodes = ["node-1", "node-2"]

[[organizations]]
id = "default"
name = "Default Org"

[[credentials]]
organization = "default"
name = "aws-backup"
provider = "aws"
bucket = "backups"

[[apps]]
name = "mysql"
namespace = "mysql-ns"
claims = ["mysql-data"]
"#;
        let config = parse_config_str(input).unwrap();
        assert_eq!(config.driver.name, "pxd");
        assert_eq!(config.driver.provisioner.as_deref(), Some("csi"));
        assert_eq!(config.driver.scheduler, "openshift");
        assert_eq!(config.driver.credentials["token"], "abc");
        assert_eq!(config.driver.storage_classes["csi"], "px-csi-db");
        assert_eq!(
            config.validation.unclassified_errors,
            UnclassifiedErrorPolicy::EscalateOnRepeat
        );
        assert_eq!(config.validation.volumes.timeout(), Duration::from_secs(30));
        assert_eq!(
            config.validation.volumes.retry_interval(),
            Duration::from_secs(3)
        );
        // Sections not present keep their defaults.
        assert_eq!(config.validation.app_ready, WindowSection::new(600, 10));
        assert_eq!(config.cluster.name, "dest");
        assert_eq!(config.cluster.storage_nodes.len(), 2);
        assert_eq!(config.credentials[0].provider, CloudProvider::Aws);
        assert_eq!(config.apps[0].claims, vec!["mysql-data"]);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse_config_str(
            r#"
config_version = 1
[driver]
name = "pso"
"#,
        )
        .unwrap();
        assert_eq!(config.driver.scheduler, "k8s");
        assert!(config.driver.provisioner.is_none());
        assert_eq!(config.validation, ValidationSection::default());
        assert_eq!(config.cluster.name, "source");
        assert!(config.apps.is_empty());
    }

    #[test]
    fn rejects_unknown_version() {
        let err = parse_config_str(
            r#"
config_version = 2
[driver]
name = "pxd"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion(2)));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = parse_config_str(
            r#"
config_version = 1
[driver]
name = "pxd"
flavour = "vanilla"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml(_)));
    }

    #[test]
    fn rejects_zero_interval_with_timeout() {
        let err = parse_config_str(
            r#"
config_version = 1
[driver]
name = "pxd"
[validation.cleanup]
timeout_secs = 60
retry_interval_secs = 0
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cleanup"));
    }

    #[test]
    fn zero_timeout_with_zero_interval_is_single_shot() {
        let config = parse_config_str(
            r#"
config_version = 1
[driver]
name = "pxd"
[validation.cleanup]
timeout_secs = 0
retry_interval_secs = 0
"#,
        )
        .unwrap();
        assert_eq!(config.validation.cleanup.timeout(), Duration::ZERO);
    }

    #[test]
    fn rejects_empty_driver_name() {
        let err = parse_config_str(
            r#"
config_version = 1
[driver]
name = " "
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyDriverName));
    }

    #[test]
    fn rejects_credential_for_unknown_org() {
        let err = parse_config_str(
            r#"
config_version = 1
[driver]
name = "pxd"
[[credentials]]
organization = "ghost"
name = "c1"
provider = "gcp"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOrganization { .. }));
    }

    #[test]
    fn rejects_duplicate_apps() {
        let err = parse_config_str(
            r#"
config_version = 1
[driver]
name = "pxd"
[[apps]]
name = "a"
namespace = "ns"
[[apps]]
name = "a"
namespace = "ns"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Duplicate { kind: "app", .. }));
    }

    #[test]
    fn parses_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plumb.toml");
        std::fs::write(
            &path,
            "config_version = 1\n[driver]\nname = \"linstor\"\nprovisioner = \"linstor\"\n",
        )
        .unwrap();
        let config = parse_config_file(&path).unwrap();
        assert_eq!(config.driver.name, "linstor");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_config_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn policy_display_matches_config_spelling() {
        assert_eq!(
            UnclassifiedErrorPolicy::EscalateOnRepeat.to_string(),
            "escalate-on-repeat"
        );
    }
}
