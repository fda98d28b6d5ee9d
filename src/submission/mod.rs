use async_trait::async_trait;

use crate::{error::SubmissionFailure, models::QueuedReport};

mod http;

pub use http::HttpSubmitter;

/// Transport that delivers one report to the remote service.
///
/// Not idempotent: a failure reported after the server already stored the
/// report leads to a duplicate on retry.
#[async_trait]
pub trait ReportSubmitter: Send + Sync {
    async fn submit(&self, report: &QueuedReport) -> Result<(), SubmissionFailure>;
}
