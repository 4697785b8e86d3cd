//! Immutable configuration carried by every managed entity.

use crate::types::ProvisionerType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClusterSpec {
    pub name: String,
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

impl ClusterSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kubeconfig: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NamespaceSpec {
    pub name: String,
}

impl NamespaceSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A workload scheduled by a scenario. `claims` are the persistent volume
/// claims the app mounts; each must become bound to a healthy volume.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppSpec {
    pub name: String,
    pub namespace: String,
    /// Falls back to the run's configured provisioner when absent.
    #[serde(default)]
    pub provisioner: Option<ProvisionerType>,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default)]
    pub claims: Vec<String>,
    #[serde(default)]
    pub volume_options: BTreeMap<String, String>,
}

fn default_replicas() -> u32 {
    1
}

impl AppSpec {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            provisioner: None,
            replicas: default_replicas(),
            claims: Vec::new(),
            volume_options: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_claims<I, S>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.claims = claims.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_replicas(mut self, replicas: u32) -> Self {
        self.replicas = replicas;
        self
    }

    #[must_use]
    pub fn with_provisioner(mut self, provisioner: impl Into<ProvisionerType>) -> Self {
        self.provisioner = Some(provisioner.into());
        self
    }

    /// `namespace/name`, unique across a cluster.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OrganizationSpec {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl OrganizationSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    #[default]
    Aws,
    Azure,
    Gcp,
    Ibm,
    Nfs,
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudProvider::Aws => write!(f, "aws"),
            CloudProvider::Azure => write!(f, "azure"),
            CloudProvider::Gcp => write!(f, "gcp"),
            CloudProvider::Ibm => write!(f, "ibm"),
            CloudProvider::Nfs => write!(f, "nfs"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CredentialSpec {
    pub organization: String,
    pub name: String,
    pub provider: CloudProvider,
    #[serde(default)]
    pub bucket: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_key_joins_namespace_and_name() {
        let app = AppSpec::new("mysql", "db");
        assert_eq!(app.key(), "db/mysql");
    }

    #[test]
    fn app_builders() {
        let app = AppSpec::new("pg", "db")
            .with_claims(["pg-data", "pg-wal"])
            .with_replicas(3)
            .with_provisioner("csi");
        assert_eq!(app.claims, vec!["pg-data", "pg-wal"]);
        assert_eq!(app.replicas, 3);
        assert_eq!(app.provisioner.as_deref(), Some("csi"));
    }

    #[test]
    fn app_defaults_from_toml() {
        let app: AppSpec = toml::from_str(
            r#"
name = "redis"
namespace = "cache"
"#,
        )
        .unwrap();
        assert_eq!(app.replicas, 1);
        assert!(app.claims.is_empty());
        assert!(app.provisioner.is_none());
    }

    #[test]
    fn cloud_provider_lowercase() {
        let cred: CredentialSpec = toml::from_str(
            r#"
organization = "default"
name = "backup"
provider = "azure"
"#,
        )
        .unwrap();
        assert_eq!(cred.provider, CloudProvider::Azure);
        assert_eq!(cred.provider.to_string(), "azure");
    }
}
