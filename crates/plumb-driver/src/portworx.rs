use crate::adapter::{DriverBase, InitOptions, ProvisionerAdapter, ProvisionerTable};
use crate::DriverError;
use plumb_schema::StorageProvisioner;
use tracing::{debug, info};

pub const DRIVER_NAME: &str = "pxd";

/// In-tree and CSI spellings of the Portworx provisioner.
pub const PROVISIONERS: ProvisionerTable = &[
    ("portworx", "kubernetes.io/portworx-volume"),
    ("csi", "pxd.portworx.com"),
];

const DEFAULT_PROVISIONER_TYPE: &str = "portworx";

/// Portworx backend. Tracks the cluster's storage-node endpoints and
/// detects volumes left behind without a claim.
#[derive(Debug, Clone, Default)]
pub struct PortworxDriver {
    base: DriverBase,
    token: Option<String>,
    endpoints: Vec<String>,
}

impl PortworxDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Management endpoints of online storage nodes, as of the last refresh.
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl ProvisionerAdapter for PortworxDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    fn provisioners(&self) -> ProvisionerTable {
        PROVISIONERS
    }

    fn init(&mut self, options: &InitOptions) -> Result<(), DriverError> {
        self.base.init(
            DRIVER_NAME,
            PROVISIONERS,
            Some(DEFAULT_PROVISIONER_TYPE),
            options,
        )?;
        self.token = options.credentials.get("token").cloned();
        self.refresh_driver_endpoints()?;

        info!("the following Portworx nodes are in the cluster:");
        for endpoint in &self.endpoints {
            info!("  {endpoint}");
        }
        Ok(())
    }

    fn storage_provisioner(&self) -> Option<&StorageProvisioner> {
        self.base.storage_provisioner.as_ref()
    }

    fn validate_volume_cleanup(&self) -> Result<(), DriverError> {
        let provider = self.base.provider(DRIVER_NAME)?;
        let Some(provisioner) = self.base.storage_provisioner.as_ref() else {
            return Err(DriverError::NotInitialized(DRIVER_NAME.to_owned()));
        };

        let leaked: Vec<String> = provider
            .list_volumes()?
            .into_iter()
            .filter(|v| v.provisioner == *provisioner && v.claim.is_none())
            .map(|v| match v.owner {
                Some(owner) => format!("{} (owner {owner})", v.name),
                None => v.name,
            })
            .collect();

        if leaked.is_empty() {
            debug!("no leaked {provisioner} volumes");
            Ok(())
        } else {
            Err(DriverError::LeakedResources {
                driver: DRIVER_NAME.to_owned(),
                resources: leaked,
            })
        }
    }

    fn refresh_driver_endpoints(&mut self) -> Result<(), DriverError> {
        let nodes = self.base.provider(DRIVER_NAME)?.storage_nodes()?;
        if nodes.is_empty() {
            return Err(DriverError::InitFailed {
                driver: DRIVER_NAME.to_owned(),
                reason: "cluster inspect returned empty nodes".to_owned(),
            });
        }
        self.endpoints = nodes
            .into_iter()
            .filter(|n| n.online)
            .map(|n| n.mgmt_ip)
            .collect();
        debug!("refreshed {} Portworx endpoints", self.endpoints.len());
        Ok(())
    }

    fn deep_copy(&self) -> Box<dyn ProvisionerAdapter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCluster;
    use crate::provider::{StorageNode, WorkloadScheduler};
    use plumb_schema::AppSpec;
    use std::sync::Arc;

    fn cluster_with_nodes() -> Arc<MockCluster> {
        let cluster = MockCluster::new();
        cluster.add_storage_node(StorageNode {
            id: "n1".to_owned(),
            mgmt_ip: "10.0.0.1".to_owned(),
            online: true,
        });
        cluster.add_storage_node(StorageNode {
            id: "n2".to_owned(),
            mgmt_ip: "10.0.0.2".to_owned(),
            online: false,
        });
        Arc::new(cluster)
    }

    #[test]
    fn init_defaults_to_portworx_in_tree() {
        let cluster = cluster_with_nodes();
        let mut driver = PortworxDriver::new();
        driver.init(&InitOptions::new(cluster)).unwrap();
        assert_eq!(
            driver.storage_provisioner().unwrap(),
            "kubernetes.io/portworx-volume"
        );
        assert_eq!(driver.endpoints(), ["10.0.0.1"]);
    }

    #[test]
    fn init_is_idempotent() {
        let cluster = cluster_with_nodes();
        let opts = InitOptions::new(cluster)
            .with_provisioner("csi")
            .with_credential("token", "abc");
        let mut driver = PortworxDriver::new();
        driver.init(&opts).unwrap();
        let first = (driver.storage_provisioner().cloned(), driver.endpoints().to_vec());
        driver.init(&opts).unwrap();
        assert_eq!(
            (driver.storage_provisioner().cloned(), driver.endpoints().to_vec()),
            first
        );
        assert_eq!(driver.token(), Some("abc"));
    }

    #[test]
    fn init_fails_without_storage_nodes() {
        let mut driver = PortworxDriver::new();
        let err = driver
            .init(&InitOptions::new(Arc::new(MockCluster::new())))
            .unwrap_err();
        assert!(err.to_string().contains("empty nodes"));
    }

    #[test]
    fn init_rejects_unsupported_type() {
        let mut driver = PortworxDriver::new();
        let err = driver
            .init(&InitOptions::new(cluster_with_nodes()).with_provisioner("rbd-csi"))
            .unwrap_err();
        assert!(matches!(err, DriverError::InitFailed { .. }));
    }

    #[test]
    fn cleanup_before_init_is_not_initialized() {
        let driver = PortworxDriver::new();
        assert!(matches!(
            driver.validate_volume_cleanup(),
            Err(DriverError::NotInitialized(_))
        ));
    }

    #[test]
    fn cleanup_reports_leaked_volumes() {
        let cluster = cluster_with_nodes();
        cluster.leak_volumes(true);
        let mut driver = PortworxDriver::new();
        driver
            .init(&InitOptions::new(cluster.clone()).with_provisioner("csi"))
            .unwrap();

        let app = AppSpec::new("mysql", "db").with_claims(["mysql-data"]);
        cluster
            .deploy(&app, driver.storage_provisioner().unwrap())
            .unwrap();
        cluster.destroy(&app).unwrap();

        let err = driver.validate_volume_cleanup().unwrap_err();
        match err {
            DriverError::LeakedResources { driver, resources } => {
                assert_eq!(driver, "pxd");
                assert_eq!(resources.len(), 1);
                assert!(resources[0].contains("db/mysql"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bound_volumes_are_not_leaks() {
        let cluster = cluster_with_nodes();
        let mut driver = PortworxDriver::new();
        driver.init(&InitOptions::new(cluster.clone())).unwrap();

        let app = AppSpec::new("redis", "cache").with_claims(["redis-data"]);
        cluster
            .deploy(&app, driver.storage_provisioner().unwrap())
            .unwrap();
        assert!(driver.validate_volume_cleanup().is_ok());
    }

    #[test]
    fn deep_copy_does_not_share_endpoints() {
        let cluster = cluster_with_nodes();
        let mut original = PortworxDriver::new();
        original.init(&InitOptions::new(cluster.clone())).unwrap();

        let mut copy = original.clone();
        cluster.add_storage_node(StorageNode {
            id: "n3".to_owned(),
            mgmt_ip: "10.0.0.3".to_owned(),
            online: true,
        });
        copy.refresh_driver_endpoints().unwrap();

        assert_eq!(copy.endpoints().len(), 2);
        assert_eq!(original.endpoints().len(), 1);
    }
}
