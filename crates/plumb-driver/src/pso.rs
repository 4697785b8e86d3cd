use crate::adapter::{DriverBase, InitOptions, ProvisionerAdapter, ProvisionerTable};
use crate::DriverError;
use plumb_schema::StorageProvisioner;

pub const DRIVER_NAME: &str = "pso";

pub const PROVISIONERS: ProvisionerTable = &[("pso", "pure-csi")];

/// Pure Service Orchestrator. Same volume semantics as Portworx under a
/// different name, so scenarios can carry separate specs for Pure volumes.
#[derive(Debug, Clone, Default)]
pub struct PsoDriver {
    base: DriverBase,
}

impl PsoDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProvisionerAdapter for PsoDriver {
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
