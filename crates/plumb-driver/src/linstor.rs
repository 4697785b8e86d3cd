use crate::adapter::{DriverBase, InitOptions, ProvisionerAdapter, ProvisionerTable};
use crate::DriverError;
use plumb_schema::StorageProvisioner;

pub const DRIVER_NAME: &str = "linstor";

pub const PROVISIONERS: ProvisionerTable = &[("linstor", "linstor.csi.linbit.com")];

/// Credential key holding the comma-separated LINSTOR controller URLs.
pub const CONTROLLERS_KEY: &str = "controllers";

#[derive(Debug, Clone, Default)]
pub struct LinstorDriver {
    base: DriverBase,
    controllers: Vec<String>,
}

impl LinstorDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controllers(&self) -> &[String] {
        &self.controllers
    }
}

impl ProvisionerAdapter for LinstorDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    fn provisioners(&self) -> ProvisionerTable {
        PROVISIONERS
    }

    fn init(&mut self, options: &InitOptions) -> Result<(), DriverError> {
        let controllers: Vec<String> = options
            .credentials
            .get(CONTROLLERS_KEY)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        if controllers.is_empty() {
            return Err(DriverError::InitFailed {
                driver: DRIVER_NAME.to_owned(),
                reason: format!("credential '{CONTROLLERS_KEY}' is required to create a LINSTOR client"),
            });
        }

        self.base.init(DRIVER_NAME, PROVISIONERS, None, options)?;
        self.controllers = controllers;
        Ok(())
    }

    fn storage_provisioner(&self) -> Option<&StorageProvisioner> {
        self.base.storage_provisioner.as_ref()
    }

    fn deep_copy(&self) -> Box<dyn ProvisionerAdapter> {
        Box::new(self.clone())
    }
}
