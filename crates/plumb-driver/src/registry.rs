use crate::adapter::ProvisionerAdapter;
use crate::DriverError;
use plumb_schema::{DriverName, ProvisionerType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

struct Registration {
    aliases: BTreeSet<String>,
    adapter: Box<dyn ProvisionerAdapter>,
}

/// Listing entry for a registered backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriverInfo {
    pub name: DriverName,
    pub aliases: Vec<ProvisionerType>,
}

/// Table of compiled-in storage backends keyed by provisioner id.
///
/// Populated once during startup, then shared read-only (typically behind an
/// `Arc`). An alias may belong to only one backend and may not shadow another
/// backend's id, so resolution never depends on registration order.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, Registration>,
    default_provisioner: Option<ProvisionerType>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<I, S>(
        &mut self,
        id: &str,
        aliases: I,
        adapter: Box<dyn ProvisionerAdapter>,
    ) -> Result<(), DriverError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.drivers.contains_key(id) {
            return Err(DriverError::DuplicateDriver(id.to_owned()));
        }
        if let Some(owner) = self.alias_owner(id) {
            return Err(DriverError::DuplicateAlias {
                alias: id.to_owned(),
                existing: owner.to_owned(),
                driver: id.to_owned(),
            });
        }

        let aliases: BTreeSet<String> = aliases.into_iter().map(Into::into).collect();
        for alias in &aliases {
            if alias == id {
                continue;
            }
            let owner = if self.drivers.contains_key(alias.as_str()) {
                Some(alias.as_str())
            } else {
                self.alias_owner(alias)
            };
            if let Some(owner) = owner {
                return Err(DriverError::DuplicateAlias {
                    alias: alias.clone(),
                    existing: owner.to_owned(),
                    driver: id.to_owned(),
                });
            }
        }

        debug!("registered {id} driver with provisioner types {aliases:?}");
        self.drivers
            .insert(id.to_owned(), Registration { aliases, adapter });
        Ok(())
    }

    /// Provisioner type used when a requested type has no backend.
    pub fn set_default_provisioner(&mut self, provisioner: Option<ProvisionerType>) {
        self.default_provisioner = provisioner;
    }

    pub fn default_provisioner(&self) -> Option<&ProvisionerType> {
        self.default_provisioner.as_ref()
    }

    fn alias_owner(&self, alias: &str) -> Option<&str> {
        self.drivers
            .iter()
            .find(|(_, reg)| reg.aliases.contains(alias))
            .map(|(id, _)| id.as_str())
    }

    fn lookup(&self, requested: &str) -> Option<&str> {
        if let Some((id, _)) = self.drivers.get_key_value(requested) {
            return Some(id.as_str());
        }
        self.alias_owner(requested)
    }

    /// Canonical driver id for `requested`: exact id, then alias, then the
    /// default provisioner.
    pub fn resolve_id(&self, requested: &str) -> Result<&str, DriverError> {
        if let Some(id) = self.lookup(requested) {
            return Ok(id);
        }
        if let Some(default) = &self.default_provisioner {
            if let Some(id) = self.lookup(default) {
                warn!("no driver registered for provisioner '{requested}', falling back to default '{default}' ({id})");
                return Ok(id);
            }
        }
        Err(DriverError::UnsupportedProvisioner(requested.to_owned()))
    }

    pub fn resolve(&self, requested: &str) -> Result<&dyn ProvisionerAdapter, DriverError> {
        let id = self.resolve_id(requested)?;
        self.drivers
            .get(id)
            .map(|reg| reg.adapter.as_ref())
            .ok_or_else(|| DriverError::UnsupportedProvisioner(requested.to_owned()))
    }

    /// Fresh, uninitialized copy of the adapter for `requested`.
    pub fn checkout(&self, requested: &str) -> Result<Box<dyn ProvisionerAdapter>, DriverError> {
        Ok(self.resolve(requested)?.deep_copy())
    }

    pub fn drivers(&self) -> Vec<DriverInfo> {
        self.drivers
            .iter()
            .map(|(id, reg)| DriverInfo {
                name: DriverName::new(id.as_str()),
                aliases: reg
                    .aliases
                    .iter()
                    .map(|a| ProvisionerType::new(a.as_str()))
                    .collect(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}
