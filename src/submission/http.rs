use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::{error::SubmissionFailure, models::QueuedReport};

use super::ReportSubmitter;

const MAX_ERROR_BODY_CHARS: usize = 200;

pub struct HttpSubmitter {
    client: Client,
    endpoint: String,
}

impl HttpSubmitter {
    const REPORT_PATH: &'static str = "/api/report_emergency";

    pub fn new(api_base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: Self::endpoint_for(api_base_url),
        })
    }

    fn endpoint_for(api_base_url: &str) -> String {
        format!("{}{}", api_base_url.trim_end_matches('/'), Self::REPORT_PATH)
    }
}

#[async_trait]
impl ReportSubmitter for HttpSubmitter {
    async fn submit(&self, report: &QueuedReport) -> Result<(), SubmissionFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&report.to_payload())
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    SubmissionFailure::Timeout
                } else {
                    SubmissionFailure::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SubmissionFailure::Rejected {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_ignores_trailing_slash() {
        assert_eq!(
            HttpSubmitter::endpoint_for("https://example.org/"),
            "https://example.org/api/report_emergency"
        );
        assert_eq!(
            HttpSubmitter::endpoint_for("http://localhost:5000"),
            "http://localhost:5000/api/report_emergency"
        );
    }
}
