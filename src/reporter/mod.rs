use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;

use crate::{
    connectivity::Connectivity,
    location::{LocationOptions, LocationResolver},
    models::{Coordinates, LocationAccuracy, QueuedReport, ReportDraft},
    queue::ReportQueue,
    submission::ReportSubmitter,
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Progress of the interactive submit action, as shown to the person waiting on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SubmissionStatus {
    Idle,
    Locating,
    Sending,
    Sent,
    QueuedOffline,
    Failed { reason: String },
}

impl SubmissionStatus {
    pub fn message(&self) -> String {
        match self {
            SubmissionStatus::Idle => String::new(),
            SubmissionStatus::Locating => "Getting location...".into(),
            SubmissionStatus::Sending => "Sending report...".into(),
            SubmissionStatus::Sent => "Emergency reported successfully!".into(),
            SubmissionStatus::QueuedOffline => {
                "Offline. Report queued and will send when online.".into()
            }
            SubmissionStatus::Failed { reason } => reason.clone(),
        }
    }
}

/// Interactive submission path: locate, then send directly or queue for later.
pub struct Reporter {
    queue: ReportQueue,
    location: Arc<LocationResolver>,
    submitter: Arc<dyn ReportSubmitter>,
    connectivity: Arc<dyn Connectivity>,
    location_options: LocationOptions,
    fallback_position: Coordinates,
    status_tx: watch::Sender<SubmissionStatus>,
}

impl Reporter {
    pub fn new(
        queue: ReportQueue,
        location: Arc<LocationResolver>,
        submitter: Arc<dyn ReportSubmitter>,
        connectivity: Arc<dyn Connectivity>,
        fallback_position: Coordinates,
    ) -> Self {
        let (status_tx, _) = watch::channel(SubmissionStatus::Idle);
        Self {
            queue,
            location,
            submitter,
            connectivity,
            location_options: LocationOptions::interactive(),
            fallback_position,
            status_tx,
        }
    }

    pub fn with_location_options(mut self, options: LocationOptions) -> Self {
        self.location_options = options;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmissionStatus> {
        self.status_tx.subscribe()
    }

    pub async fn submit(&self, draft: ReportDraft) -> SubmissionStatus {
        self.publish(SubmissionStatus::Locating);

        let located = self.location.current_location(&self.location_options).await;
        let submitted_at = Utc::now();
        let online = self.connectivity.is_online();

        let status = match located {
            Ok(position) => {
                let report =
                    QueuedReport::new(draft, position, LocationAccuracy::None, submitted_at);
                if online {
                    self.send_now(report).await
                } else {
                    self.queue_offline(report).await
                }
            }
            Err(err) if !online => {
                log_warn!("{err} while offline; queuing with placeholder location");
                let report = QueuedReport::new(
                    draft,
                    self.fallback_position,
                    LocationAccuracy::Low,
                    submitted_at,
                );
                self.queue_offline(report).await
            }
            Err(err) => SubmissionStatus::Failed {
                reason: format!(
                    "Could not get location: {}. Enable location access & try again.",
                    err.cause
                ),
            },
        };

        self.publish(status.clone());
        status
    }

    async fn send_now(&self, report: QueuedReport) -> SubmissionStatus {
        self.publish(SubmissionStatus::Sending);
        match self.submitter.submit(&report).await {
            Ok(()) => {
                log_info!("Report {} sent", report.submitted_at);
                SubmissionStatus::Sent
            }
            Err(err) => {
                log_error!("Failed to report emergency online: {err}");
                SubmissionStatus::Failed {
                    reason: "Failed to send report. Check connection or try again.".into(),
                }
            }
        }
    }

    async fn queue_offline(&self, report: QueuedReport) -> SubmissionStatus {
        match self.queue.enqueue(report).await {
            Ok(pending) => {
                log_info!("Report queued offline; {pending} pending");
                SubmissionStatus::QueuedOffline
            }
            Err(err) => {
                log_error!("Failed to queue report locally: {err}");
                SubmissionStatus::Failed {
                    reason: "Offline. Could not save report locally.".into(),
                }
            }
        }
    }

    fn publish(&self, status: SubmissionStatus) {
        self.status_tx.send_replace(status);
    }
}
