use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::future::join_all;

use crate::{
    connectivity::Connectivity,
    error::{QueueError, SubmissionFailure},
    location::{LocationOptions, LocationResolver},
    models::{QueuedReport, ReportKey},
    queue::ReportQueue,
    submission::ReportSubmitter,
};

use super::state::{PassOutcome, PassSummary, SkipReason, TriggerSource};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

type Delivery = (ReportKey, Result<(), SubmissionFailure>);

/// Clears the in-flight flag when a pass ends, including by panic.
struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlight<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drains the offline queue: refresh location, send everything, keep what failed.
///
/// Only one pass runs at a time. Triggers that land while a pass is in flight
/// collapse into a single follow-up pass.
pub struct ReconciliationEngine {
    queue: ReportQueue,
    location: Arc<LocationResolver>,
    submitter: Arc<dyn ReportSubmitter>,
    connectivity: Arc<dyn Connectivity>,
    location_options: LocationOptions,
    submit_timeout: Duration,
    running: AtomicBool,
    rerun_requested: AtomicBool,
}

impl ReconciliationEngine {
    pub fn new(
        queue: ReportQueue,
        location: Arc<LocationResolver>,
        submitter: Arc<dyn ReportSubmitter>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            queue,
            location,
            submitter,
            connectivity,
            location_options: LocationOptions::background(),
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            running: AtomicBool::new(false),
            rerun_requested: AtomicBool::new(false),
        }
    }

    pub fn with_location_options(mut self, options: LocationOptions) -> Self {
        self.location_options = options;
        self
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Entry point for every trigger source.
    pub async fn trigger(&self, source: TriggerSource) -> Result<PassOutcome, QueueError> {
        let Some(mut in_flight) = InFlight::try_acquire(&self.running) else {
            self.rerun_requested.store(true, Ordering::SeqCst);
            log_debug!("[Queue] pass in flight; {source} trigger folded into a follow-up pass");
            return Ok(PassOutcome::Coalesced);
        };

        let mut source = source;
        loop {
            self.rerun_requested.store(false, Ordering::SeqCst);
            let result = self.run_pass(source).await;

            if !self.rerun_requested.load(Ordering::SeqCst) {
                drop(in_flight);
                // A trigger may have landed between the check and the release.
                if !self.rerun_requested.load(Ordering::SeqCst) {
                    return result;
                }
                match InFlight::try_acquire(&self.running) {
                    Some(reacquired) => in_flight = reacquired,
                    None => return result,
                }
            }

            if let Err(err) = &result {
                log_error!("[Queue] {source} pass failed before follow-up: {err}");
            }
            source = TriggerSource::FollowUp;
        }
    }

    async fn run_pass(&self, source: TriggerSource) -> Result<PassOutcome, QueueError> {
        log_debug!("[Queue] {source} pass: checking network status");
        if !self.connectivity.is_online() {
            log_info!("[Queue] Still offline, skipping");
            return Ok(PassOutcome::Skipped {
                reason: SkipReason::Offline,
            });
        }

        let loaded = self.queue.load().await?;
        if loaded.discarded_corrupt {
            return Ok(PassOutcome::Skipped {
                reason: SkipReason::CorruptQueue,
            });
        }
        if loaded.reports.is_empty() {
            log_debug!("[Queue] No reports to process");
            return Ok(PassOutcome::Skipped {
                reason: SkipReason::EmptyQueue,
            });
        }

        let mut batch = loaded.reports;
        log_info!(
            "[Queue] Network online. Processing {} report(s) ({source})",
            batch.len()
        );

        let location_refreshed = self.refresh_locations(&mut batch).await;
        let batch_keys: HashSet<ReportKey> = batch.iter().map(QueuedReport::key).collect();

        let failed_keys: HashSet<ReportKey> = self
            .dispatch(&batch)
            .await
            .into_iter()
            .filter_map(|(key, result)| result.err().map(|_| key))
            .collect();

        let attempted = batch.len();
        let failed: Vec<QueuedReport> = batch
            .into_iter()
            .filter(|report| failed_keys.contains(&report.key()))
            .collect();
        let retained = failed.len();
        let sent = attempted - retained;

        let persisted = match self.queue.persist_remaining(&batch_keys, failed).await {
            Ok(pending) => {
                if sent > 0 {
                    log_info!("[Queue] {sent} report(s) sent successfully");
                }
                if retained > 0 {
                    log_warn!("[Queue] {retained} report(s) remain queued due to errors");
                }
                log_debug!("[Queue] {pending} report(s) pending after pass");
                true
            }
            Err(err) => {
                log_error!("[Queue] {err}; next pass will re-read storage");
                false
            }
        };

        Ok(PassOutcome::Completed(PassSummary {
            attempted,
            sent,
            retained,
            location_refreshed,
            persisted,
        }))
    }

    /// One shared fix applied to the whole batch. Failure leaves the batch as is.
    async fn refresh_locations(&self, batch: &mut [QueuedReport]) -> bool {
        match self.location.current_location(&self.location_options).await {
            Ok(position) => {
                for report in batch.iter_mut() {
                    report.apply_refreshed_location(position);
                }
                log_info!(
                    "[Queue] Updated queued reports with fresh location ({:.5}, {:.5})",
                    position.latitude,
                    position.longitude
                );
                true
            }
            Err(err) => {
                log_warn!("[Queue] {err}; proceeding with stored locations");
                false
            }
        }
    }

    /// Sends every report concurrently and waits for all of them to settle.
    async fn dispatch(&self, batch: &[QueuedReport]) -> Vec<Delivery> {
        let attempts = batch.iter().map(|report| async move {
            let result =
                match tokio::time::timeout(self.submit_timeout, self.submitter.submit(report))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(SubmissionFailure::Timeout),
                };

            match &result {
                Ok(()) => log_debug!("[Queue] Sent report {}", report.submitted_at),
                Err(err) => log_warn!("[Queue] Failed to send report {}: {err}", report.submitted_at),
            }
            (report.key(), result)
        });

        join_all(attempts).await
    }
}
