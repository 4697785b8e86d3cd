//! Storage backends for Plumb.
//!
//! Each backend implements [`ProvisionerAdapter`] and is registered into a
//! [`DriverRegistry`] under its driver id, with its provisioner types as
//! aliases. Backends observe the cluster only through the
//! [`ClusterStateProvider`] capability; [`MockCluster`] provides an in-memory
//! implementation.

pub mod adapter;
pub mod linstor;
pub mod mock;
pub mod ocp;
pub mod portworx;
pub mod provider;
pub mod pso;
pub mod registry;

pub use adapter::{lookup_provisioner, DriverBase, InitOptions, ProvisionerAdapter, ProvisionerTable};
pub use linstor::LinstorDriver;
pub use mock::MockCluster;
pub use ocp::OcpDriver;
pub use portworx::PortworxDriver;
pub use provider::{
    ClaimPhase, ClaimStatus, ClusterStateProvider, ProviderError, ReplicaSetStatus, StorageNode,
    VolumeHealth, VolumeInfo, WorkloadScheduler,
};
pub use pso::PsoDriver;
pub use registry::{DriverInfo, DriverRegistry};

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("volume driver '{0}' is already registered")]
    DuplicateDriver(String),
    #[error("provisioner alias '{alias}' of driver '{driver}' is already claimed by '{existing}'")]
    DuplicateAlias {
        alias: String,
        existing: String,
        driver: String,
    },
    #[error("no volume driver supports provisioner '{0}'")]
    UnsupportedProvisioner(String),
    #[error("{driver} driver init failed: {reason}")]
    InitFailed { driver: String, reason: String },
    #[error("{0} driver has not been initialized")]
    NotInitialized(String),
    #[error("{driver} driver found {} leaked resources: {}", .resources.len(), .resources.join(", "))]
    LeakedResources {
        driver: String,
        resources: Vec<String>,
    },
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Registry holding every compiled-in backend, keyed by driver id.
pub fn builtin_registry() -> Result<DriverRegistry, DriverError> {
    let mut registry = DriverRegistry::new();
    let backends: [(&str, ProvisionerTable, Box<dyn ProvisionerAdapter>); 4] = [
        (portworx::DRIVER_NAME, portworx::PROVISIONERS, Box::new(PortworxDriver::new())),
        (pso::DRIVER_NAME, pso::PROVISIONERS, Box::new(PsoDriver::new())),
        (ocp::DRIVER_NAME, ocp::PROVISIONERS, Box::new(OcpDriver::new())),
        (linstor::DRIVER_NAME, linstor::PROVISIONERS, Box::new(LinstorDriver::new())),
    ];
    for (id, table, adapter) in backends {
        registry.register(id, table.iter().map(|(ty, _)| *ty), adapter)?;
    }
    Ok(registry)
}
