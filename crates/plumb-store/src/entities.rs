//! Managed entities of a harness run and the sub-managers they own.

use crate::manager::{Entity, EntityManager, Shared};
use plumb_schema::{AppSpec, ClusterSpec, CredentialSpec, NamespaceSpec, OrganizationSpec};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppState {
    #[default]
    Defined,
    Scheduled,
    Ready,
    Destroyed,
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppState::Defined => write!(f, "defined"),
            AppState::Scheduled => write!(f, "scheduled"),
            AppState::Ready => write!(f, "ready"),
            AppState::Destroyed => write!(f, "destroyed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct App {
    pub spec: AppSpec,
    pub state: AppState,
}

impl App {
    pub fn new(spec: AppSpec) -> Self {
        Self {
            spec,
            state: AppState::Defined,
        }
    }
}

impl Entity for App {
    const KIND: &'static str = "app";
}

pub struct Namespace {
    pub spec: NamespaceSpec,
    pub apps: EntityManager<App>,
}

impl Namespace {
    pub fn new(spec: NamespaceSpec) -> Self {
        Self {
            spec,
            apps: EntityManager::new(),
        }
    }
}

impl Entity for Namespace {
    const KIND: &'static str = "namespace";
}

pub struct Cluster {
    pub spec: ClusterSpec,
    pub namespaces: EntityManager<Namespace>,
}

impl Cluster {
    pub fn new(spec: ClusterSpec) -> Self {
        Self {
            spec,
            namespaces: EntityManager::new(),
        }
    }

    /// Namespace `name`, registered on first use.
    pub fn namespace(&self, name: &str) -> Shared<Namespace> {
        self.namespaces
            .get_or_create_default(name, || Namespace::new(NamespaceSpec::new(name)))
    }
}

impl Entity for Cluster {
    const KIND: &'static str = "cluster";
}

#[derive(Debug, Clone)]
pub struct CloudCredential {
    pub spec: CredentialSpec,
}

impl Entity for CloudCredential {
    const KIND: &'static str = "cloud credential";
}

pub struct Organization {
    pub spec: OrganizationSpec,
    pub credentials: EntityManager<CloudCredential>,
}

impl Organization {
    pub fn new(spec: OrganizationSpec) -> Self {
        Self {
            spec,
            credentials: EntityManager::new(),
        }
    }
}

impl Entity for Organization {
    const KIND: &'static str = "organization";
}
