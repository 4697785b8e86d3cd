//! Identifier types, entity specs, and harness configuration for Plumb.
//!
//! This crate defines the schema layer: string newtypes for driver and
//! provisioner identifiers, the immutable specs carried by managed entities
//! (`ClusterSpec`, `AppSpec`, `CredentialSpec`, ...), and TOML parsing of the
//! harness configuration (`HarnessConfig`).

pub mod config;
pub mod specs;
pub mod types;

pub use config::{
    parse_config_file, parse_config_str, ClusterSection, ConfigError, DriverSection,
    HarnessConfig, UnclassifiedErrorPolicy, ValidationSection, WindowSection, CONFIG_VERSION,
};
pub use specs::{
    AppSpec, CloudProvider, ClusterSpec, CredentialSpec, NamespaceSpec, OrganizationSpec,
};
pub use types::{DriverName, ProvisionerType, StorageProvisioner};
