use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::{
    error::{LocationFailure, LocationUnavailable},
    models::Coordinates,
};

mod provider;

pub use provider::{LocationProvider, StaticLocationProvider};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocationOptions {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    /// 0 forces a fresh fix.
    pub max_cache_age_ms: u64,
}

impl LocationOptions {
    /// Used while a person waits on the submit action.
    pub fn interactive() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: 15_000,
            max_cache_age_ms: 0,
        }
    }

    /// Used by reconciliation; failure only means the stored coordinates are kept.
    pub fn background() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: 10_000,
            max_cache_age_ms: 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn max_cache_age(&self) -> Duration {
        Duration::from_millis(self.max_cache_age_ms)
    }
}

/// Best-effort position lookup with a hard timeout.
///
/// Every failure mode collapses into [`LocationUnavailable`]; choosing a
/// fallback position is the caller's job.
pub struct LocationResolver {
    provider: Arc<dyn LocationProvider>,
    last_fix: Mutex<Option<(Instant, Coordinates)>>,
}

impl LocationResolver {
    pub fn new(provider: Arc<dyn LocationProvider>) -> Self {
        Self {
            provider,
            last_fix: Mutex::new(None),
        }
    }

    pub async fn current_location(
        &self,
        opts: &LocationOptions,
    ) -> Result<Coordinates, LocationUnavailable> {
        if let Some(cached) = self.cached_fix(opts.max_cache_age()) {
            return Ok(cached);
        }

        let timeout = opts.timeout();
        match tokio::time::timeout(timeout, self.provider.current_position(opts)).await {
            Ok(Ok(position)) => {
                *self.lock_last_fix() = Some((Instant::now(), position));
                Ok(position)
            }
            Ok(Err(cause)) => Err(cause.into()),
            Err(_) => Err(LocationFailure::Timeout(timeout).into()),
        }
    }

    fn cached_fix(&self, max_age: Duration) -> Option<Coordinates> {
        if max_age.is_zero() {
            return None;
        }

        let last_fix = *self.lock_last_fix();
        last_fix
            .filter(|(taken_at, _)| taken_at.elapsed() <= max_age)
            .map(|(_, position)| position)
    }

    fn lock_last_fix(&self) -> std::sync::MutexGuard<'_, Option<(Instant, Coordinates)>> {
        match self.last_fix.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
