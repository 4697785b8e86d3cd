use crate::cancel::CancelToken;
use crate::clock::{Clock, SystemClock};
use crate::lifecycle::validate_transition;
use crate::predicates::{app_ready, resources_reclaimed, volumes_healthy};
use crate::validate::{ValidationOutcome, ValidationRequest, ValidationStatus, Validator};
use crate::CoreError;
use plumb_driver::{
    builtin_registry, lookup_provisioner, ClusterStateProvider, DriverError, DriverRegistry,
    InitOptions, MockCluster, ProvisionerAdapter, StorageNode, WorkloadScheduler,
};
use plumb_schema::{AppSpec, ClusterSpec, HarnessConfig, ProvisionerType, StorageProvisioner};
use plumb_store::{
    App, AppState, CloudCredential, Cluster, EntityManager, Organization, Shared,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLockReadGuard, RwLockWriteGuard};
use std::thread;
use tracing::{debug, info, warn};

fn read<E>(shared: &Shared<E>) -> RwLockReadGuard<'_, E> {
    shared.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<E>(shared: &Shared<E>) -> RwLockWriteGuard<'_, E> {
    shared.write().unwrap_or_else(PoisonError::into_inner)
}

/// Result of one app scenario: deploy, validate volumes and readiness,
/// tear down, validate cleanup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioReport {
    pub app: String,
    pub driver: String,
    pub storage_provisioner: StorageProvisioner,
    pub status: ValidationStatus,
    pub state: AppState,
    pub outcomes: Vec<ValidationOutcome>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.status == ValidationStatus::Succeeded
    }

    /// First validation that did not succeed.
    pub fn failure(&self) -> Option<&ValidationOutcome> {
        self.outcomes.iter().find(|o| !o.is_success())
    }

    fn settle_status(&mut self) {
        if let Some(status) = self.failure().map(|o| o.status) {
            self.status = status;
        }
    }
}

/// Scenario orchestration over one cluster.
///
/// Owns the entity managers for the run, a read-only driver registry, and
/// the provider capabilities. `Harness` is `Sync`; scenarios for different
/// apps may run concurrently via [`run_parallel`](Self::run_parallel).
pub struct Harness {
    config: HarnessConfig,
    registry: Arc<DriverRegistry>,
    provider: Arc<dyn ClusterStateProvider>,
    scheduler: Arc<dyn WorkloadScheduler>,
    clock: Arc<dyn Clock>,
    clusters: EntityManager<Cluster>,
    organizations: EntityManager<Organization>,
}

impl Harness {
    pub fn new(
        config: HarnessConfig,
        mut registry: DriverRegistry,
        provider: Arc<dyn ClusterStateProvider>,
        scheduler: Arc<dyn WorkloadScheduler>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        registry.set_default_provisioner(config.driver.default_provisioner.clone());
        let driver = registry.resolve_id(&config.driver.name)?;
        info!(
            "harness using volume driver {driver} ({} registered)",
            registry.len()
        );

        let harness = Self {
            config,
            registry: Arc::new(registry),
            provider,
            scheduler,
            clock: Arc::new(SystemClock::new()),
            clusters: EntityManager::new(),
            organizations: EntityManager::new(),
        };
        harness.register_entities();
        Ok(harness)
    }

    /// Harness over an in-memory cluster shaped by the config's `[cluster]`
    /// section, with every built-in driver registered.
    pub fn simulated(config: HarnessConfig) -> Result<(Self, Arc<MockCluster>), CoreError> {
        let cluster = Arc::new(
            MockCluster::new()
                .with_settle_polls(config.cluster.settle_polls)
                .with_reclaim_polls(config.cluster.reclaim_polls),
        );
        for (i, ip) in config.cluster.storage_nodes.iter().enumerate() {
            cluster.add_storage_node(StorageNode {
                id: format!("node-{i}"),
                mgmt_ip: ip.clone(),
                online: true,
            });
        }
        let harness = Self::new(
            config,
            builtin_registry()?,
            cluster.clone(),
            cluster.clone(),
        )?;
        Ok((harness, cluster))
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn register_entities(&self) {
        for org in &self.config.organizations {
            self.organizations
                .set(org.id.clone(), Organization::new(org.clone()));
        }
        for cred in &self.config.credentials {
            // config validation guarantees the organization exists
            if let Some(org) = self.organizations.get(&cred.organization) {
                read(&org)
                    .credentials
                    .set(cred.name.clone(), CloudCredential { spec: cred.clone() });
            }
        }

        let cluster = self.cluster();
        let cluster = read(&cluster);
        for spec in &self.config.apps {
            let ns = cluster.namespace(&spec.namespace);
            read(&ns).apps.set(spec.name.clone(), App::new(spec.clone()));
        }
        debug!(
            "registered {} organizations, {} credentials, {} apps",
            self.organizations.len(),
            self.config.credentials.len(),
            self.config.apps.len()
        );
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    pub fn clusters(&self) -> &EntityManager<Cluster> {
        &self.clusters
    }

    pub fn organizations(&self) -> &EntityManager<Organization> {
        &self.organizations
    }

    /// The cluster under test, registered on first use.
    pub fn cluster(&self) -> Shared<Cluster> {
        let name = &self.config.cluster.name;
        self.clusters
            .get_or_create_default(name, || Cluster::new(ClusterSpec::new(name.as_str())))
    }

    /// App entity for `spec`, registered on first use.
    pub fn app(&self, spec: &AppSpec) -> Shared<App> {
        let cluster = self.cluster();
        let ns = read(&cluster).namespace(&spec.namespace);
        let app = read(&ns)
            .apps
            .get_or_create_default(&spec.name, || App::new(spec.clone()));
        app
    }

    pub fn credential(&self, organization: &str, name: &str) -> Result<Shared<CloudCredential>, CoreError> {
        let org = self.organizations.require(organization)?;
        let credential = read(&org).credentials.require(name)?;
        Ok(credential)
    }

    pub fn validator(&self) -> Validator {
        Validator::new(Arc::clone(&self.provider))
            .with_clock(Arc::clone(&self.clock))
            .with_policy(self.config.validation.unclassified_errors)
    }

    fn requested_provisioner<'a>(&'a self, app: &'a AppSpec) -> &'a str {
        app.provisioner
            .as_deref()
            .or(self.config.driver.provisioner.as_deref())
            .unwrap_or(self.config.driver.name.as_str())
    }

    /// Resolve, copy, and initialize the adapter serving `app`.
    pub fn adapter_for(&self, app: &AppSpec) -> Result<Box<dyn ProvisionerAdapter>, CoreError> {
        let requested = self.requested_provisioner(app);
        let mut adapter = self.registry.checkout(requested)?;

        let table = adapter.provisioners();
        let supported = |p: &&ProvisionerType| lookup_provisioner(table, p).is_some();
        let provisioner = Some(ProvisionerType::new(requested))
            .filter(|p| supported(&p))
            .or_else(|| self.registry.default_provisioner().filter(supported).cloned());

        let driver = &self.config.driver;
        let mut options = InitOptions::new(Arc::clone(&self.provider)).with_scheduler(&driver.scheduler);
        options.provisioner = provisioner;
        options.credentials.clone_from(&driver.credentials);
        options.storage_classes.clone_from(&driver.storage_classes);

        adapter.init(&options)?;
        Ok(adapter)
    }

    fn initialized_provisioner(adapter: &dyn ProvisionerAdapter) -> Result<StorageProvisioner, CoreError> {
        adapter
            .storage_provisioner()
            .cloned()
            .ok_or_else(|| DriverError::NotInitialized(adapter.name().to_owned()).into())
    }

    pub fn validate_volumes(
        &self,
        adapter: &dyn ProvisionerAdapter,
        app: &AppSpec,
        cancel: &CancelToken,
    ) -> Result<ValidationOutcome, CoreError> {
        let provisioner = Self::initialized_provisioner(adapter)?;
        let request = ValidationRequest::from_window("volumes", &self.config.validation.volumes)
            .with_subject(app.key())
            .with_options(app.volume_options.clone());
        Ok(self.validator().validate(
            &request,
            cancel,
            volumes_healthy(provisioner, app.namespace.clone(), app.claims.clone()),
        ))
    }

    pub fn validate_app_ready(&self, app: &AppSpec, cancel: &CancelToken) -> ValidationOutcome {
        let request = ValidationRequest::from_window("app_ready", &self.config.validation.app_ready)
            .with_subject(app.key());
        self.validator().validate(
            &request,
            cancel,
            app_ready(app.namespace.clone(), app.name.clone(), app.replicas),
        )
    }

    pub fn validate_cleanup(
        &self,
        adapter: &dyn ProvisionerAdapter,
        cancel: &CancelToken,
    ) -> ValidationOutcome {
        let request = ValidationRequest::from_window("cleanup", &self.config.validation.cleanup)
            .with_subject(adapter.name());
        self.validator()
            .validate(&request, cancel, resources_reclaimed(adapter))
    }

    fn transition(app: &Shared<App>, to: AppState) -> Result<(), CoreError> {
        let mut app = write(app);
        validate_transition(app.state, to)?;
        debug!("{}: {} -> {to}", app.spec.key(), app.state);
        app.state = to;
        Ok(())
    }

    /// Deploy, validate and tear down. The app entity only moves to
    /// `Scheduled` once the deploy went through.
    fn exercise(
        &self,
        spec: &AppSpec,
        adapter: &dyn ProvisionerAdapter,
        provisioner: &StorageProvisioner,
        app: &Shared<App>,
        report: &mut ScenarioReport,
        cancel: &CancelToken,
    ) -> Result<(), CoreError> {
        let key = spec.key();
        info!("scheduling {key} on {provisioner}");
        self.scheduler.deploy(spec, provisioner)?;
        Self::transition(app, AppState::Scheduled)?;

        let volumes = self.validate_volumes(adapter, spec, cancel)?;
        let volumes_ok = volumes.is_success();
        report.outcomes.push(volumes);
        if volumes_ok {
            let ready = self.validate_app_ready(spec, cancel);
            if ready.is_success() {
                Self::transition(app, AppState::Ready)?;
            }
            report.outcomes.push(ready);
        }
        report.settle_status();

        info!("tearing down {key}");
        self.scheduler.destroy(spec)?;
        Self::transition(app, AppState::Destroyed)?;

        if report.passed() {
            report.outcomes.push(self.validate_cleanup(adapter, cancel));
            report.settle_status();
        }
        Ok(())
    }

    /// Tombstone the app entity so a later run starts from `Defined`.
    fn retire(&self, spec: &AppSpec) {
        let cluster = self.cluster();
        let ns = read(&cluster).namespace(&spec.namespace);
        read(&ns).apps.remove(&spec.name);
    }

    /// Run the full scenario for one app. Validation failures are reported
    /// in the returned [`ScenarioReport`]; errors are reserved for setup,
    /// scheduling, and lifecycle problems. An aborted scenario still tears
    /// down whatever it deployed and retires the app entity.
    pub fn run_scenario(
        &self,
        spec: &AppSpec,
        cancel: &CancelToken,
    ) -> Result<ScenarioReport, CoreError> {
        let key = spec.key();
        let adapter = self.adapter_for(spec)?;
        let provisioner = Self::initialized_provisioner(adapter.as_ref())?;
        let app = self.app(spec);

        let mut report = ScenarioReport {
            app: key.clone(),
            driver: adapter.name().to_owned(),
            storage_provisioner: provisioner.clone(),
            status: ValidationStatus::Succeeded,
            state: read(&app).state,
            outcomes: Vec::new(),
        };
        if cancel.is_cancelled() {
            info!("skipping {key}: run cancelled");
            report.status = ValidationStatus::Cancelled;
            return Ok(report);
        }

        validate_transition(read(&app).state, AppState::Scheduled)?;
        if let Err(err) = self.exercise(spec, adapter.as_ref(), &provisioner, &app, &mut report, cancel) {
            warn!("scenario {key} aborted: {err}");
            let state = read(&app).state;
            if matches!(state, AppState::Scheduled | AppState::Ready) {
                if let Err(teardown) = self.scheduler.destroy(spec) {
                    warn!("teardown of {key} after abort failed: {teardown}");
                }
            }
            self.retire(spec);
            return Err(err);
        }
        self.retire(spec);
        report.state = AppState::Destroyed;

        if report.passed() {
            info!("scenario {key} passed");
        } else {
            warn!("scenario {key} {}", report.status);
        }
        Ok(report)
    }

    /// Every configured app, one after another.
    pub fn run_all(&self, cancel: &CancelToken) -> Vec<Result<ScenarioReport, CoreError>> {
        self.run_parallel(&self.config.apps, 1, cancel)
    }

    /// Run scenarios on up to `workers` threads pulling from a shared queue.
    /// Results are returned in the order of `apps`.
    pub fn run_parallel(
        &self,
        apps: &[AppSpec],
        workers: usize,
        cancel: &CancelToken,
    ) -> Vec<Result<ScenarioReport, CoreError>> {
        let workers = workers.clamp(1, apps.len().max(1));
        let next = AtomicUsize::new(0);
        let results: Mutex<Vec<Option<Result<ScenarioReport, CoreError>>>> =
            Mutex::new(apps.iter().map(|_| None).collect());

        thread::scope(|scope| {
            for worker in 0..workers {
                let (next, results) = (&next, &results);
                scope.spawn(move || loop {
                    let i = next.fetch_add(1, Ordering::SeqCst);
                    let Some(spec) = apps.get(i) else {
                        break;
                    };
                    debug!(worker, app = %spec.key(), "picked up scenario");
                    let result = self.run_scenario(spec, cancel);
                    results.lock().unwrap_or_else(PoisonError::into_inner)[i] = Some(result);
                });
            }
        });

        results
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .flatten()
            .collect()
    }
}
