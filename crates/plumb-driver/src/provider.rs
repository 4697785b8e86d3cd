//! Capabilities supplied by the cluster/cloud SDK layer.
//!
//! The harness never talks to the system under test directly: state queries
//! go through a [`ClusterStateProvider`] and workload placement through a
//! [`WorkloadScheduler`]. Both are opaque handles; `MockCluster` implements
//! them in memory.

use plumb_schema::{AppSpec, StorageProvisioner};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("cluster API unavailable: {0}")]
    Unavailable(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VolumeHealth {
    Pending,
    Healthy,
    Degraded,
}

impl fmt::Display for VolumeHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeHealth::Pending => write!(f, "pending"),
            VolumeHealth::Healthy => write!(f, "healthy"),
            VolumeHealth::Degraded => write!(f, "degraded"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeInfo {
    pub name: String,
    pub provisioner: StorageProvisioner,
    pub health: VolumeHealth,
    /// `namespace/app` of the workload the volume was created for, if any.
    pub owner: Option<String>,
    /// `namespace/claim` currently bound to the volume.
    pub claim: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClaimPhase {
    Pending,
    Bound,
    Lost,
}

impl fmt::Display for ClaimPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimPhase::Pending => write!(f, "Pending"),
            ClaimPhase::Bound => write!(f, "Bound"),
            ClaimPhase::Lost => write!(f, "Lost"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimStatus {
    pub name: String,
    pub phase: ClaimPhase,
    /// Bound volume name once the claim is `Bound`.
    pub volume: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplicaSetStatus {
    pub name: String,
    pub desired: u32,
    pub ready: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageNode {
    pub id: String,
    pub mgmt_ip: String,
    pub online: bool,
}

pub trait ClusterStateProvider: Send + Sync {
    fn list_volumes(&self) -> Result<Vec<VolumeInfo>, ProviderError>;

    fn volume(&self, name: &str) -> Result<Option<VolumeInfo>, ProviderError> {
        Ok(self.list_volumes()?.into_iter().find(|v| v.name == name))
    }

    fn claim(&self, namespace: &str, claim: &str) -> Result<Option<ClaimStatus>, ProviderError>;

    fn replica_sets(&self, namespace: &str, app: &str)
        -> Result<Vec<ReplicaSetStatus>, ProviderError>;

    fn storage_nodes(&self) -> Result<Vec<StorageNode>, ProviderError>;
}

pub trait WorkloadScheduler: Send + Sync {
    /// Place `app` on the cluster with its claims provisioned by `provisioner`.
    fn deploy(&self, app: &AppSpec, provisioner: &StorageProvisioner)
        -> Result<(), ProviderError>;

    /// Tear down the workload and its claims.
    fn destroy(&self, app: &AppSpec) -> Result<(), ProviderError>;
}
