use crate::adapter::{DriverBase, InitOptions, ProvisionerAdapter, ProvisionerTable};
use crate::DriverError;
use plumb_schema::StorageProvisioner;

pub const DRIVER_NAME: &str = "ocp";

/// OpenShift Data Foundation Ceph provisioners.
pub const PROVISIONERS: ProvisionerTable = &[
    ("rbd-csi", "openshift-storage.rbd.csi.ceph.com"),
    ("cephfs-csi", "openshift-storage.cephfs.csi.ceph.com"),
    ("rgw-csi", "openshift-storage.ceph.rook.io/bucket"),
];

#[derive(Debug, Clone, Default)]
pub struct OcpDriver {
    base: DriverBase,
}

impl OcpDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProvisionerAdapter for OcpDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    fn provisioners(&self) -> ProvisionerTable {
        PROVISIONERS
    }

    fn init(&mut self, options: &InitOptions) -> Result<(), DriverError> {
        self.base.init(DRIVER_NAME, PROVISIONERS, None, options)
    }

    fn storage_provisioner(&self) -> Option<&StorageProvisioner> {
        self.base.storage_provisioner.as_ref()
    }

    fn deep_copy(&self) -> Box<dyn ProvisionerAdapter> {
        Box::new(self.clone())
    }
}
