#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::time::Instant;

use resqforce_lib::{
    connectivity::ConnectivityMonitor,
    db::{KeyValueStore, MemoryStore},
    error::{LocationFailure, PermissionError, SubmissionFailure},
    location::{LocationOptions, LocationProvider, LocationResolver},
    models::{Category, Coordinates, LocationAccuracy, QueuedReport, ReportDraft, Severity},
    permission::{PermissionProvider, PermissionState},
    queue::{ReportQueue, QUEUE_KEY},
    reconcile::ReconciliationEngine,
    submission::ReportSubmitter,
};

/// Report whose description is `label`, submitted `offset_secs` after a fixed epoch.
pub fn report(label: &str, offset_secs: i64, accuracy: LocationAccuracy) -> QueuedReport {
    QueuedReport::new(
        ReportDraft {
            description: label.to_string(),
            category: Category::Flood,
            severity: Severity::High,
        },
        Coordinates::new(20.5937, 78.9629),
        accuracy,
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap() + chrono::Duration::seconds(offset_secs),
    )
}

pub fn labels(reports: &[QueuedReport]) -> Vec<String> {
    reports.iter().map(|r| r.description.clone()).collect()
}

/// Submitter that fails reports by description and records every attempt.
#[derive(Default)]
pub struct ScriptedSubmitter {
    failing: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    delay: Duration,
    calls: Mutex<Vec<(String, Instant)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSubmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn fail(&self, label: &str) {
        self.failing.lock().unwrap().insert(label.to_string());
    }

    pub fn hang(&self, label: &str) {
        self.hanging.lock().unwrap().insert(label.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(label, _)| label.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn first_call_at(&self) -> Option<Instant> {
        self.calls.lock().unwrap().first().map(|(_, at)| *at)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportSubmitter for ScriptedSubmitter {
    async fn submit(&self, report: &QueuedReport) -> Result<(), SubmissionFailure> {
        self.calls
            .lock()
            .unwrap()
            .push((report.description.clone(), Instant::now()));
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        let hangs = self.hanging.lock().unwrap().contains(&report.description);
        if hangs {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(&report.description) {
            Err(SubmissionFailure::Rejected {
                status: 500,
                body: "Failed to report emergency".into(),
            })
        } else {
            Ok(())
        }
    }
}

/// Location provider returning a fixed result after an optional delay.
pub struct FakeLocation {
    result: Result<Coordinates, LocationFailure>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeLocation {
    pub fn fix(latitude: f64, longitude: f64) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(Coordinates::new(latitude, longitude)),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(cause: LocationFailure) -> Arc<Self> {
        Arc::new(Self {
            result: Err(cause),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationProvider for FakeLocation {
    async fn current_position(
        &self,
        _opts: &LocationOptions,
    ) -> Result<Coordinates, LocationFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.result.clone()
    }
}

/// Mobile-style permissions whose check takes `delay` to resolve.
pub struct SlowPermissions {
    pub delay: Duration,
}

#[async_trait]
impl PermissionProvider for SlowPermissions {
    fn requires_prompt(&self) -> bool {
        true
    }

    async fn check(&self) -> Result<PermissionState, PermissionError> {
        tokio::time::sleep(self.delay).await;
        Ok(PermissionState::Prompt)
    }

    async fn request(&self) -> Result<PermissionState, PermissionError> {
        Ok(PermissionState::Granted)
    }
}

/// Store whose writes always fail; reads and removals go to memory.
#[derive(Default)]
pub struct ReadOnlyStore {
    inner: MemoryStore,
}

impl ReadOnlyStore {
    pub fn with_value(key: &str, value: impl Into<String>) -> Self {
        Self {
            inner: MemoryStore::with_value(key, value),
        }
    }
}

#[async_trait]
impl KeyValueStore for ReadOnlyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, _key: &str, _value: String) -> Result<()> {
        Err(anyhow!("quota exceeded"))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }
}

pub struct Harness {
    pub store: Arc<dyn KeyValueStore>,
    pub queue: ReportQueue,
    pub submitter: Arc<ScriptedSubmitter>,
    pub location: Arc<FakeLocation>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub engine: Arc<ReconciliationEngine>,
}

impl Harness {
    pub fn new(submitter: Arc<ScriptedSubmitter>, location: Arc<FakeLocation>) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), submitter, location)
    }

    pub fn with_store(
        store: Arc<dyn KeyValueStore>,
        submitter: Arc<ScriptedSubmitter>,
        location: Arc<FakeLocation>,
    ) -> Self {
        let queue = ReportQueue::new(store.clone(), QUEUE_KEY);
        let connectivity = Arc::new(ConnectivityMonitor::new(true));
        let engine = ReconciliationEngine::new(
            queue.clone(),
            Arc::new(LocationResolver::new(location.clone())),
            submitter.clone(),
            connectivity.clone(),
        );

        Self {
            store,
            queue,
            submitter,
            location,
            connectivity,
            engine: Arc::new(engine),
        }
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        let engine = Arc::try_unwrap(self.engine)
            .ok()
            .expect("engine is not shared yet");
        self.engine = Arc::new(engine.with_submit_timeout(timeout));
        self
    }

    pub async fn seed(&self, reports: &[QueuedReport]) {
        for report in reports {
            self.queue.enqueue(report.clone()).await.unwrap();
        }
    }

    pub async fn raw_queue(&self) -> Option<String> {
        self.store.get(QUEUE_KEY).await.unwrap()
    }
}

/// Yields to the runtime until `condition` holds or the attempts run out.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
