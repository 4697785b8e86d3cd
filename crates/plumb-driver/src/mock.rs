//! In-memory cluster implementing both provider capabilities.
//!
//! Convergence is driven by poll counts rather than wall time: a deployed
//! claim reports `Pending` for `settle_polls` queries before binding, and a
//! destroyed volume stays listed for `reclaim_polls` listings.

use crate::provider::{
    ClaimPhase, ClaimStatus, ClusterStateProvider, ProviderError, ReplicaSetStatus, StorageNode,
    VolumeHealth, VolumeInfo, WorkloadScheduler,
};
use plumb_schema::{AppSpec, StorageProvisioner};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

struct ClaimEntry {
    owner: String,
    volume: String,
    remaining: u32,
    lost: bool,
}

struct VolumeEntry {
    info: VolumeInfo,
    reclaim_in: Option<u32>,
}

struct WorkloadEntry {
    desired: u32,
    remaining: u32,
}

#[derive(Default)]
struct State {
    settle_polls: u32,
    reclaim_polls: u32,
    leak: bool,
    nodes: Vec<StorageNode>,
    claims: BTreeMap<(String, String), ClaimEntry>,
    volumes: BTreeMap<String, VolumeEntry>,
    workloads: BTreeMap<String, WorkloadEntry>,
    fault: Option<(u32, ProviderError)>,
}

impl State {
    fn take_fault(&mut self) -> Result<(), ProviderError> {
        match self.fault.take() {
            Some((n, err)) if n > 0 => {
                if n > 1 {
                    self.fault = Some((n - 1, err.clone()));
                }
                Err(err)
            }
            _ => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MockCluster {
    state: Mutex<State>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settle_polls(self, polls: u32) -> Self {
        self.lock().settle_polls = polls;
        self
    }

    #[must_use]
    pub fn with_reclaim_polls(self, polls: u32) -> Self {
        self.lock().reclaim_polls = polls;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_storage_node(&self, node: StorageNode) {
        self.lock().nodes.push(node);
    }

    /// When set, volumes survive `destroy`, detached from their claim.
    pub fn leak_volumes(&self, leak: bool) {
        self.lock().leak = leak;
    }

    /// Fail the next `n` state queries with `err`.
    pub fn fail_next(&self, n: u32, err: ProviderError) {
        self.lock().fault = (n > 0).then_some((n, err));
    }

    /// Mark a claim as lost; its volume is degraded.
    pub fn lose_claim(&self, namespace: &str, claim: &str) {
        let mut state = self.lock();
        let key = (namespace.to_owned(), claim.to_owned());
        let Some(entry) = state.claims.get_mut(&key) else {
            return;
        };
        entry.lost = true;
        let volume = entry.volume.clone();
        if let Some(v) = state.volumes.get_mut(&volume) {
            v.info.health = VolumeHealth::Degraded;
        }
    }

    pub fn set_volume_health(&self, volume: &str, health: VolumeHealth) {
        if let Some(v) = self.lock().volumes.get_mut(volume) {
            v.info.health = health;
        }
    }

    pub fn volume_count(&self) -> usize {
        self.lock().volumes.len()
    }
}

pub fn volume_name(namespace: &str, claim: &str) -> String {
    format!("pvc-{namespace}-{claim}")
}

impl ClusterStateProvider for MockCluster {
    fn list_volumes(&self) -> Result<Vec<VolumeInfo>, ProviderError> {
        let mut state = self.lock();
        state.take_fault()?;

        state.volumes.retain(|_, v| match v.reclaim_in {
            Some(0) => false,
            Some(ref mut n) => {
                *n -= 1;
                true
            }
            None => true,
        });
        Ok(state.volumes.values().map(|v| v.info.clone()).collect())
    }

    fn volume(&self, name: &str) -> Result<Option<VolumeInfo>, ProviderError> {
        let mut state = self.lock();
        state.take_fault()?;
        Ok(state.volumes.get(name).map(|v| v.info.clone()))
    }

    fn claim(&self, namespace: &str, claim: &str) -> Result<Option<ClaimStatus>, ProviderError> {
        let mut state = self.lock();
        state.take_fault()?;

        let key = (namespace.to_owned(), claim.to_owned());
        let Some(entry) = state.claims.get_mut(&key) else {
            return Ok(None);
        };
        if entry.lost {
            return Ok(Some(ClaimStatus {
                name: claim.to_owned(),
                phase: ClaimPhase::Lost,
                volume: Some(entry.volume.clone()),
            }));
        }
        if entry.remaining > 0 {
            entry.remaining -= 1;
            return Ok(Some(ClaimStatus {
                name: claim.to_owned(),
                phase: ClaimPhase::Pending,
                volume: None,
            }));
        }

        let volume = entry.volume.clone();
        if let Some(v) = state.volumes.get_mut(&volume) {
            if v.info.health == VolumeHealth::Pending {
                v.info.health = VolumeHealth::Healthy;
            }
        }
        Ok(Some(ClaimStatus {
            name: claim.to_owned(),
            phase: ClaimPhase::Bound,
            volume: Some(volume),
        }))
    }

    fn replica_sets(
        &self,
        namespace: &str,
        app: &str,
    ) -> Result<Vec<ReplicaSetStatus>, ProviderError> {
        let mut state = self.lock();
        state.take_fault()?;

        let Some(workload) = state.workloads.get_mut(&format!("{namespace}/{app}")) else {
            return Ok(Vec::new());
        };
        let ready = if workload.remaining > 0 {
            workload.remaining -= 1;
            0
        } else {
            workload.desired
        };
        Ok(vec![ReplicaSetStatus {
            name: format!("{app}-rs"),
            desired: workload.desired,
            ready,
        }])
    }

    fn storage_nodes(&self) -> Result<Vec<StorageNode>, ProviderError> {
        let mut state = self.lock();
        state.take_fault()?;
        Ok(state.nodes.clone())
    }
}

impl WorkloadScheduler for MockCluster {
    fn deploy(&self, app: &AppSpec, provisioner: &StorageProvisioner) -> Result<(), ProviderError> {
        let mut state = self.lock();
        let owner = app.key();
        let settle = state.settle_polls;

        for claim in &app.claims {
            let volume = volume_name(&app.namespace, claim);
            state.volumes.insert(
                volume.clone(),
                VolumeEntry {
                    info: VolumeInfo {
                        name: volume.clone(),
                        provisioner: provisioner.clone(),
                        health: VolumeHealth::Pending,
                        owner: Some(owner.clone()),
                        claim: Some(format!("{}/{claim}", app.namespace)),
                    },
                    reclaim_in: None,
                },
            );
            state.claims.insert(
                (app.namespace.clone(), claim.clone()),
                ClaimEntry {
                    owner: owner.clone(),
                    volume,
                    remaining: settle,
                    lost: false,
                },
            );
        }
        state.workloads.insert(
            owner.clone(),
            WorkloadEntry {
                desired: app.replicas,
                remaining: settle,
            },
        );
        debug!("deployed {owner} with {} claims on {provisioner}", app.claims.len());
        Ok(())
    }

    fn destroy(&self, app: &AppSpec) -> Result<(), ProviderError> {
        let mut state = self.lock();
        let owner = app.key();
        if state.workloads.remove(&owner).is_none() {
            return Err(ProviderError::NotFound(format!("workload {owner}")));
        }

        let mut released = Vec::new();
        state.claims.retain(|_, c| {
            if c.owner == owner {
                released.push(c.volume.clone());
                false
            } else {
                true
            }
        });

        let (leak, reclaim) = (state.leak, state.reclaim_polls);
        for name in &released {
            if let Some(v) = state.volumes.get_mut(name) {
                v.info.claim = None;
                if !leak {
                    v.reclaim_in = Some(reclaim);
                }
            }
        }
        debug!("destroyed {owner}, released {} volumes (leak={leak})", released.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provisioner() -> StorageProvisioner {
        StorageProvisioner::new("pxd.portworx.com")
    }

    fn app() -> AppSpec {
        AppSpec::new("mysql", "db")
            .with_claims(["data", "logs"])
            .with_replicas(2)
    }

    #[test]
    fn claims_bind_after_settle_polls() {
        let cluster = MockCluster::new().with_settle_polls(2);
        cluster.deploy(&app(), &provisioner()).unwrap();

        for _ in 0..2 {
            let status = cluster.claim("db", "data").unwrap().unwrap();
            assert_eq!(status.phase, ClaimPhase::Pending);
            assert!(status.volume.is_none());
        }
        let status = cluster.claim("db", "data").unwrap().unwrap();
        assert_eq!(status.phase, ClaimPhase::Bound);
        assert_eq!(status.volume.as_deref(), Some("pvc-db-data"));

        let volume = cluster.volume("pvc-db-data").unwrap().unwrap();
        assert_eq!(volume.health, VolumeHealth::Healthy);
        assert_eq!(volume.owner.as_deref(), Some("db/mysql"));
        assert_eq!(volume.claim.as_deref(), Some("db/data"));
        let other = cluster.volume("pvc-db-logs").unwrap().unwrap();
        assert_eq!(other.health, VolumeHealth::Pending);
    }

    #[test]
    fn unknown_claim_is_none() {
        let cluster = MockCluster::new();
        assert!(cluster.claim("db", "ghost").unwrap().is_none());
        assert!(cluster.replica_sets("db", "ghost").unwrap().is_empty());
    }

    #[test]
    fn replicas_become_ready() {
        let cluster = MockCluster::new().with_settle_polls(1);
        cluster.deploy(&app(), &provisioner()).unwrap();
        assert_eq!(cluster.replica_sets("db", "mysql").unwrap()[0].ready, 0);
        let rs = &cluster.replica_sets("db", "mysql").unwrap()[0];
        assert_eq!((rs.desired, rs.ready), (2, 2));
    }

    #[test]
    fn destroyed_volumes_are_reclaimed_after_listings() {
        let cluster = MockCluster::new().with_reclaim_polls(1);
        cluster.deploy(&app(), &provisioner()).unwrap();
        cluster.destroy(&app()).unwrap();

        assert_eq!(cluster.list_volumes().unwrap().len(), 2);
        assert!(cluster.list_volumes().unwrap().is_empty());
        assert!(cluster.claim("db", "data").unwrap().is_none());
    }

    #[test]
    fn leaked_volumes_survive_destroy() {
        let cluster = MockCluster::new();
        cluster.leak_volumes(true);
        cluster.deploy(&app(), &provisioner()).unwrap();
        cluster.destroy(&app()).unwrap();
        for _ in 0..3 {
            let volumes = cluster.list_volumes().unwrap();
            assert_eq!(volumes.len(), 2);
            assert!(volumes.iter().all(|v| v.claim.is_none()));
        }
    }

    #[test]
    fn destroy_unknown_workload_is_not_found() {
        let cluster = MockCluster::new();
        assert!(matches!(
            cluster.destroy(&app()),
            Err(ProviderError::NotFound(_))
        ));
    }

    #[test]
    fn injected_faults_expire() {
        let cluster = MockCluster::new();
        cluster.fail_next(2, ProviderError::Unavailable("apiserver down".to_owned()));
        assert!(cluster.storage_nodes().is_err());
        assert!(cluster.list_volumes().is_err());
        assert!(cluster.storage_nodes().is_ok());
    }

    #[test]
    fn lost_claim_reports_lost() {
        let cluster = MockCluster::new();
        cluster.deploy(&app(), &provisioner()).unwrap();
        cluster.lose_claim("db", "logs");
        let status = cluster.claim("db", "logs").unwrap().unwrap();
        assert_eq!(status.phase, ClaimPhase::Lost);
        assert_eq!(
            cluster.volume("pvc-db-logs").unwrap().unwrap().health,
            VolumeHealth::Degraded
        );
    }
}
