//! Predicates for the standard validations of a scenario.
//!
//! Provider errors are handed back to the validator unclassified, except
//! `Unauthorized`, which is always fatal.

use crate::validate::{Check, ValidationContext};
use plumb_driver::{
    ClaimPhase, ClusterStateProvider, DriverError, ProviderError, ProvisionerAdapter, VolumeHealth,
};
use plumb_schema::StorageProvisioner;

fn fatal_if_unauthorized(err: ProviderError) -> Result<Check, ProviderError> {
    match err {
        ProviderError::Unauthorized(reason) => Ok(Check::Fatal(format!("unauthorized: {reason}"))),
        other => Err(other),
    }
}

/// Every claim bound to a healthy volume from `provisioner`.
///
/// All claims are queried on each attempt so the reason lists everything
/// still outstanding.
pub fn volumes_healthy(
    provisioner: StorageProvisioner,
    namespace: String,
    claims: Vec<String>,
) -> impl FnMut(&dyn ClusterStateProvider, &ValidationContext) -> Result<Check, ProviderError> {
    move |provider, _ctx| {
        let mut pending = Vec::new();
        for claim in &claims {
            let status = match provider.claim(&namespace, claim) {
                Ok(status) => status,
                Err(e) => return fatal_if_unauthorized(e),
            };
            let Some(status) = status else {
                pending.push(format!("claim {namespace}/{claim} not found"));
                continue;
            };
            let volume = match (status.phase, status.volume) {
                (ClaimPhase::Lost, _) => {
                    return Ok(Check::Fatal(format!("claim {namespace}/{claim} is Lost")))
                }
                (ClaimPhase::Bound, Some(volume)) => volume,
                (phase, _) => {
                    pending.push(format!("claim {namespace}/{claim} is {phase}"));
                    continue;
                }
            };

            let info = match provider.volume(&volume) {
                Ok(info) => info,
                Err(e) => return fatal_if_unauthorized(e),
            };
            let Some(info) = info else {
                pending.push(format!("volume {volume} for claim {namespace}/{claim} not found"));
                continue;
            };
            if info.provisioner != provisioner {
                return Ok(Check::Fatal(format!(
                    "volume {volume} was provisioned by {}, expected {provisioner}",
                    info.provisioner
                )));
            }
            if info.health != VolumeHealth::Healthy {
                pending.push(format!("volume {volume} is {}", info.health));
            }
        }

        if pending.is_empty() {
            Ok(Check::Pass)
        } else {
            Ok(Check::Retry(pending.join("; ")))
        }
    }
}

/// At least `replicas` ready replicas across the app's replica sets.
pub fn app_ready(
    namespace: String,
    app: String,
    replicas: u32,
) -> impl FnMut(&dyn ClusterStateProvider, &ValidationContext) -> Result<Check, ProviderError> {
    move |provider, _ctx| {
        let sets = match provider.replica_sets(&namespace, &app) {
            Ok(sets) => sets,
            Err(e) => return fatal_if_unauthorized(e),
        };
        if sets.is_empty() {
            return Ok(Check::Retry(format!("no replica sets for {namespace}/{app}")));
        }
        let ready: u32 = sets.iter().map(|s| s.ready).sum();
        if ready >= replicas {
            Ok(Check::Pass)
        } else {
            Ok(Check::Retry(format!(
                "{namespace}/{app}: {ready}/{replicas} replicas ready"
            )))
        }
    }
}

/// The adapter reports no leaked resources.
pub fn resources_reclaimed(
    adapter: &dyn ProvisionerAdapter,
) -> impl FnMut(&dyn ClusterStateProvider, &ValidationContext) -> Result<Check, ProviderError> + '_ {
    move |_provider, _ctx| match adapter.validate_volume_cleanup() {
        Ok(()) => Ok(Check::Pass),
        Err(e @ DriverError::LeakedResources { .. }) => Ok(Check::Retry(e.to_string())),
        Err(DriverError::Provider(e)) => fatal_if_unauthorized(e),
        Err(other) => Ok(Check::Fatal(other.to_string())),
    }
}
