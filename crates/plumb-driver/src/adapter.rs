use crate::provider::ClusterStateProvider;
use crate::DriverError;
use plumb_schema::{ProvisionerType, StorageProvisioner};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Provisioner types a backend supports, mapped to the provisioner string
/// that appears on its storage classes and volumes.
pub type ProvisionerTable = &'static [(&'static str, &'static str)];

pub fn lookup_provisioner(table: ProvisionerTable, provisioner_type: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(ty, _)| *ty == provisioner_type)
        .map(|(_, p)| *p)
}

/// Options handed to [`ProvisionerAdapter::init`] for one test run.
#[derive(Clone)]
pub struct InitOptions {
    pub provisioner: Option<ProvisionerType>,
    pub scheduler: String,
    pub credentials: BTreeMap<String, String>,
    pub storage_classes: BTreeMap<String, String>,
    pub provider: Arc<dyn ClusterStateProvider>,
}

impl fmt::Debug for InitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitOptions")
            .field("provisioner", &self.provisioner)
            .field("scheduler", &self.scheduler)
            .field("credentials", &self.credentials.keys().collect::<Vec<_>>())
            .field("storage_classes", &self.storage_classes)
            .finish_non_exhaustive()
    }
}

impl InitOptions {
    pub fn new(provider: Arc<dyn ClusterStateProvider>) -> Self {
        Self {
            provisioner: None,
            scheduler: "k8s".to_owned(),
            credentials: BTreeMap::new(),
            storage_classes: BTreeMap::new(),
            provider,
        }
    }

    #[must_use]
    pub fn with_provisioner(mut self, provisioner: impl Into<ProvisionerType>) -> Self {
        self.provisioner = Some(provisioner.into());
        self
    }

    #[must_use]
    pub fn with_scheduler(mut self, scheduler: &str) -> Self {
        scheduler.clone_into(&mut self.scheduler);
        self
    }

    #[must_use]
    pub fn with_credential(mut self, key: &str, value: &str) -> Self {
        self.credentials.insert(key.to_owned(), value.to_owned());
        self
    }

    #[must_use]
    pub fn with_storage_class(mut self, provisioner_type: &str, class: &str) -> Self {
        self.storage_classes
            .insert(provisioner_type.to_owned(), class.to_owned());
        self
    }
}

/// Capability contract every storage backend satisfies.
///
/// Instances held by the registry are templates: callers take a
/// [`deep_copy`](Self::deep_copy) and `init` that copy, so concurrent
/// scenarios never share adapter state.
pub trait ProvisionerAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Provisioner types this backend accepts.
    fn provisioners(&self) -> ProvisionerTable;

    /// Backend setup for one run. Calling it again with the same options
    /// leaves the adapter in the same state.
    fn init(&mut self, options: &InitOptions) -> Result<(), DriverError>;

    /// Provisioner string chosen by `init`; `None` before initialization.
    fn storage_provisioner(&self) -> Option<&StorageProvisioner>;

    /// Verify that no backend-owned resources outlived teardown.
    fn validate_volume_cleanup(&self) -> Result<(), DriverError> {
        debug!("volume cleanup validation not supported by {} driver", self.name());
        Ok(())
    }

    /// Re-read the backend's storage endpoints from the cluster.
    fn refresh_driver_endpoints(&mut self) -> Result<(), DriverError> {
        warn!(
            "RefreshDriverEndpoints has not been implemented for volume driver {}",
            self.name()
        );
        Ok(())
    }

    fn deep_copy(&self) -> Box<dyn ProvisionerAdapter>;
}

/// State shared by every built-in adapter.
#[derive(Clone, Default)]
pub struct DriverBase {
    pub storage_provisioner: Option<StorageProvisioner>,
    pub scheduler: String,
    pub provider: Option<Arc<dyn ClusterStateProvider>>,
}

impl fmt::Debug for DriverBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverBase")
            .field("storage_provisioner", &self.storage_provisioner)
            .field("scheduler", &self.scheduler)
            .field("initialized", &self.provider.is_some())
            .finish()
    }
}

impl DriverBase {
    /// Pick the storage provisioner for `options.provisioner` (or
    /// `default_type` when none was requested) and check the storage-class
    /// mapping against `table`.
    pub fn init(
        &mut self,
        driver: &str,
        table: ProvisionerTable,
        default_type: Option<&str>,
        options: &InitOptions,
    ) -> Result<(), DriverError> {
        let requested = options
            .provisioner
            .as_deref()
            .filter(|p| !p.trim().is_empty());
        let provisioner_type = match (requested, default_type) {
            (Some(ty), _) | (None, Some(ty)) => ty,
            (None, None) => {
                return Err(DriverError::InitFailed {
                    driver: driver.to_owned(),
                    reason: "provisioner is empty".to_owned(),
                })
            }
        };

        let provisioner = lookup_provisioner(table, provisioner_type).ok_or_else(|| {
            DriverError::InitFailed {
                driver: driver.to_owned(),
                reason: format!("does not support provisioner type '{provisioner_type}'"),
            }
        })?;

        for class_type in options.storage_classes.keys() {
            if lookup_provisioner(table, class_type).is_none() {
                return Err(DriverError::InitFailed {
                    driver: driver.to_owned(),
                    reason: format!(
                        "storage class mapping names provisioner type '{class_type}', which this driver does not support"
                    ),
                });
            }
        }

        info!(
            "using the {driver} volume driver with provisioner {provisioner} under scheduler {}",
            options.scheduler
        );
        self.storage_provisioner = Some(StorageProvisioner::new(provisioner));
        self.scheduler.clone_from(&options.scheduler);
        self.provider = Some(Arc::clone(&options.provider));
        Ok(())
    }

    pub fn provider(&self, driver: &str) -> Result<&dyn ClusterStateProvider, DriverError> {
        self.provider
            .as_deref()
            .ok_or_else(|| DriverError::NotInitialized(driver.to_owned()))
    }
}
