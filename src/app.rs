use std::{path::Path, sync::Arc};

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    connectivity::{Connectivity, ConnectivityMonitor, ConnectivityProbe},
    db::{Database, KeyValueStore},
    location::{LocationProvider, LocationResolver, StaticLocationProvider},
    models::Coordinates,
    permission::{NoPromptPlatform, PermissionGate, PermissionProvider},
    queue::ReportQueue,
    reconcile::{ReconciliationEngine, TriggerSources},
    reporter::Reporter,
    settings::Settings,
    submission::{HttpSubmitter, ReportSubmitter},
};

pub const DATABASE_FILE: &str = "resqforce.sqlite3";
pub const SETTINGS_FILE: &str = "settings.json";

/// External systems the queue engine talks to.
pub struct Collaborators {
    pub store: Arc<dyn KeyValueStore>,
    pub location: Arc<dyn LocationProvider>,
    pub permissions: Arc<dyn PermissionProvider>,
    pub submitter: Arc<dyn ReportSubmitter>,
}

impl Collaborators {
    /// Production wiring: SQLite store, HTTP submitter, desktop permissions.
    pub fn open(data_dir: &Path, settings: &Settings, position: Option<Coordinates>) -> Result<Self> {
        let database = Database::new(data_dir.join(DATABASE_FILE))?;
        let submitter = HttpSubmitter::new(&settings.api_base_url, settings.request_timeout())?;

        Ok(Self {
            store: Arc::new(database),
            location: Arc::new(StaticLocationProvider::new(position)),
            permissions: Arc::new(NoPromptPlatform),
            submitter: Arc::new(submitter),
        })
    }
}

pub struct AppState {
    pub settings: Settings,
    pub queue: ReportQueue,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub gate: Arc<PermissionGate>,
    pub engine: Arc<ReconciliationEngine>,
    pub reporter: Reporter,
}

impl AppState {
    pub fn new(settings: Settings, collaborators: Collaborators, initially_online: bool) -> Self {
        let queue = ReportQueue::new(collaborators.store, &settings.queue_key);
        let connectivity = Arc::new(ConnectivityMonitor::new(initially_online));
        let location = Arc::new(LocationResolver::new(collaborators.location));
        let gate = Arc::new(PermissionGate::new(collaborators.permissions));

        let engine = ReconciliationEngine::new(
            queue.clone(),
            location.clone(),
            collaborators.submitter.clone(),
            connectivity.clone(),
        )
        .with_location_options(settings.background_location)
        .with_submit_timeout(settings.request_timeout());

        let reporter = Reporter::new(
            queue.clone(),
            location,
            collaborators.submitter,
            connectivity.clone(),
            settings.fallback_position,
        )
        .with_location_options(settings.interactive_location);

        Self {
            settings,
            queue,
            connectivity,
            gate,
            engine: Arc::new(engine),
            reporter,
        }
    }

    pub fn connectivity(&self) -> Arc<dyn Connectivity> {
        self.connectivity.clone()
    }

    /// Kicks off the one-time permission check and the gated trigger sources.
    pub fn start_background(&self, cancel_token: CancellationToken) -> TriggerSources {
        let gate = self.gate.clone();
        tokio::spawn(async move {
            gate.ensure_location_permission_checked().await;
        });

        TriggerSources::spawn(
            self.engine.clone(),
            self.gate.clone(),
            self.connectivity(),
            cancel_token,
        )
    }

    pub fn spawn_probe(&self, cancel_token: CancellationToken) -> Result<JoinHandle<()>> {
        let probe = ConnectivityProbe::new(
            &self.settings.api_base_url,
            self.settings.probe_interval(),
            self.settings.request_timeout(),
        )?;
        Ok(probe.spawn(self.connectivity.clone(), cancel_token))
    }
}
