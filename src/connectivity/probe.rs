use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::ConnectivityMonitor;

const ENABLE_LOGS: bool = false;

use crate::{log_debug, log_info};

/// Polls the API root and feeds the result into a [`ConnectivityMonitor`].
///
/// Any HTTP response counts as online; only transport errors count as offline.
pub struct ConnectivityProbe {
    client: Client,
    url: String,
    interval: Duration,
}

impl ConnectivityProbe {
    pub fn new(api_base_url: &str, interval: Duration, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build connectivity probe client")?;

        Ok(Self {
            client,
            url: format!("{}/api", api_base_url.trim_end_matches('/')),
            interval,
        })
    }

    pub async fn probe_once(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                log_debug!("probe {} -> {}", self.url, response.status());
                true
            }
            Err(err) => {
                log_debug!("probe {} failed: {err}", self.url);
                false
            }
        }
    }

    pub fn spawn(
        self,
        monitor: Arc<ConnectivityMonitor>,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let online = self.probe_once().await;
                        monitor.set_online(online);
                    }
                    _ = cancel_token.cancelled() => {
                        log_info!("connectivity probe shutting down");
                        break;
                    }
                }
            }
        })
    }
}
