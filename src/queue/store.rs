use std::{collections::HashSet, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    db::KeyValueStore,
    error::QueueError,
    models::{QueuedReport, ReportKey},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_warn};

/// Key the queue has always been stored under.
pub const QUEUE_KEY: &str = "queuedEmergencyReports";

#[derive(Debug, Default)]
pub struct LoadedQueue {
    pub reports: Vec<QueuedReport>,
    /// A malformed value was found and removed; `reports` is empty.
    pub discarded_corrupt: bool,
}

/// Ordered list of reports waiting to be delivered, persisted as one JSON
/// array under a single key.
#[derive(Clone)]
pub struct ReportQueue {
    store: Arc<dyn KeyValueStore>,
    key: Arc<str>,
    // Serializes read-modify-write cycles issued from this process.
    write_lock: Arc<Mutex<()>>,
}

impl ReportQueue {
    pub fn new(store: Arc<dyn KeyValueStore>, key: &str) -> Self {
        Self {
            store,
            key: Arc::from(key),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Absent value reads as empty. A malformed value is removed and reads
    /// as empty.
    pub async fn load(&self) -> Result<LoadedQueue, QueueError> {
        let raw = self
            .store
            .get(&self.key)
            .await
            .map_err(QueueError::Read)?;

        let Some(raw) = raw else {
            return Ok(LoadedQueue::default());
        };

        match serde_json::from_str::<Vec<QueuedReport>>(&raw) {
            Ok(mut reports) => {
                reports.iter_mut().for_each(QueuedReport::backfill_id);
                Ok(LoadedQueue {
                    reports,
                    discarded_corrupt: false,
                })
            }
            Err(err) => {
                let corrupt = QueueError::Corrupt(err);
                log_warn!("{corrupt}; discarding stored value");
                if let Err(remove_err) = self.store.remove(&self.key).await {
                    log_error!("failed to discard corrupt queue: {remove_err:#}");
                }
                Ok(LoadedQueue {
                    reports: Vec::new(),
                    discarded_corrupt: true,
                })
            }
        }
    }

    pub async fn pending(&self) -> Result<Vec<QueuedReport>, QueueError> {
        Ok(self.load().await?.reports)
    }

    /// Appends one report and returns the new queue length.
    pub async fn enqueue(&self, report: QueuedReport) -> Result<usize, QueueError> {
        let _guard = self.write_lock.lock().await;

        let mut reports = self.load().await?.reports;
        reports.push(report);
        self.write(&reports).await?;

        log_debug!("queued report; {} pending", reports.len());
        Ok(reports.len())
    }

    /// Overwrites the queue with the reports a pass failed to deliver.
    ///
    /// Entries that showed up in storage after `batch` was loaded are kept
    /// behind `failed` so an enqueue racing the pass is not lost.
    pub async fn persist_remaining(
        &self,
        batch: &HashSet<ReportKey>,
        failed: Vec<QueuedReport>,
    ) -> Result<usize, QueueError> {
        let _guard = self.write_lock.lock().await;

        let mut remaining = failed;
        match self.load().await {
            Ok(current) => {
                let arrived: Vec<QueuedReport> = current
                    .reports
                    .into_iter()
                    .filter(|report| !batch.contains(&report.key()))
                    .collect();
                if !arrived.is_empty() {
                    log_debug!("keeping {} report(s) queued during the pass", arrived.len());
                }
                remaining.extend(arrived);
            }
            Err(err) => log_warn!("could not re-read queue before persisting: {err}"),
        }

        self.write(&remaining).await?;
        Ok(remaining.len())
    }

    /// Drops every pending report and returns how many there were.
    pub async fn clear(&self) -> Result<usize, QueueError> {
        let _guard = self.write_lock.lock().await;

        let count = self.load().await?.reports.len();
        self.store
            .remove(&self.key)
            .await
            .map_err(QueueError::Write)?;
        Ok(count)
    }

    async fn write(&self, reports: &[QueuedReport]) -> Result<(), QueueError> {
        let serialized = serde_json::to_string(reports).map_err(QueueError::Encode)?;
        self.store
            .set(&self.key, serialized)
            .await
            .map_err(QueueError::Write)
    }
}
