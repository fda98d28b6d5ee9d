use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, OnceCell};

mod provider;

pub use provider::{NoPromptPlatform, PermissionProvider, PermissionState};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// How the one-time permission check ended. Every variant counts as "checked".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GateOutcome {
    NotRequired,
    AlreadyGranted,
    Granted,
    Denied,
    Errored,
}

/// One-shot checkpoint that background reconciliation waits on, so it never
/// races an unresolved location-permission prompt.
pub struct PermissionGate {
    provider: Arc<dyn PermissionProvider>,
    once: OnceCell<GateOutcome>,
    checked_tx: watch::Sender<Option<GateOutcome>>,
}

impl PermissionGate {
    pub fn new(provider: Arc<dyn PermissionProvider>) -> Self {
        let (checked_tx, _) = watch::channel(None);
        Self {
            provider,
            once: OnceCell::new(),
            checked_tx,
        }
    }

    /// Runs the permission check the first time it is called and fires the
    /// "checked" signal. Never fails; later calls return the first outcome.
    pub async fn ensure_location_permission_checked(&self) -> GateOutcome {
        let outcome = *self.once.get_or_init(|| self.run_check()).await;

        self.checked_tx.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(outcome);
                true
            } else {
                false
            }
        });

        outcome
    }

    /// Resolves once [`Self::ensure_location_permission_checked`] has completed.
    pub async fn wait_checked(&self) -> GateOutcome {
        let mut rx = self.checked_tx.subscribe();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(slot) => *slot,
            Err(_) => None,
        };
        outcome.unwrap_or(GateOutcome::Errored)
    }

    pub fn is_checked(&self) -> bool {
        self.checked_tx.borrow().is_some()
    }

    async fn run_check(&self) -> GateOutcome {
        if !self.provider.requires_prompt() {
            log_info!("Location permission prompt not required on this platform");
            return GateOutcome::NotRequired;
        }

        let outcome = match self.provider.check().await {
            Ok(PermissionState::Granted) => GateOutcome::AlreadyGranted,
            Ok(state) => {
                log_info!("Location permission is {state:?}; requesting");
                match self.provider.request().await {
                    Ok(PermissionState::Granted) => GateOutcome::Granted,
                    Ok(_) => {
                        log_warn!("Location permission denied");
                        GateOutcome::Denied
                    }
                    Err(err) => {
                        log_error!("{err}");
                        GateOutcome::Errored
                    }
                }
            }
            Err(err) => {
                log_error!("{err}");
                GateOutcome::Errored
            }
        };

        log_info!("Permission check finished ({outcome:?}); queue processing unlocked");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PermissionError;
    use async_trait::async_trait;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    struct ScriptedPermissions {
        check: Result<PermissionState, &'static str>,
        request: Result<PermissionState, &'static str>,
        requests: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedPermissions {
        fn new(
            check: Result<PermissionState, &'static str>,
            request: Result<PermissionState, &'static str>,
        ) -> Arc<Self> {
            Arc::new(Self {
                check,
                request,
                requests: AtomicUsize::new(0),
                delay: Duration::ZERO,
            })
        }
    }

    #[async_trait]
    impl PermissionProvider for ScriptedPermissions {
        fn requires_prompt(&self) -> bool {
            true
        }

        async fn check(&self) -> Result<PermissionState, PermissionError> {
            tokio::time::sleep(self.delay).await;
            self.check.map_err(|e| PermissionError::Query(e.into()))
        }

        async fn request(&self) -> Result<PermissionState, PermissionError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.request.map_err(|e| PermissionError::Request(e.into()))
        }
    }

    #[tokio::test]
    async fn desktop_completes_immediately() {
        let gate = PermissionGate::new(Arc::new(NoPromptPlatform));
        assert!(!gate.is_checked());
        assert_eq!(
            gate.ensure_location_permission_checked().await,
            GateOutcome::NotRequired
        );
        assert!(gate.is_checked());
    }

    #[tokio::test]
    async fn granted_permission_skips_the_prompt() {
        let provider = ScriptedPermissions::new(Ok(PermissionState::Granted), Ok(PermissionState::Granted));
        let gate = PermissionGate::new(provider.clone());

        assert_eq!(
            gate.ensure_location_permission_checked().await,
            GateOutcome::AlreadyGranted
        );
        assert_eq!(provider.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn errors_and_denials_still_mark_checked() {
        let denied = PermissionGate::new(ScriptedPermissions::new(
            Ok(PermissionState::Prompt),
            Ok(PermissionState::Denied),
        ));
        assert_eq!(
            denied.ensure_location_permission_checked().await,
            GateOutcome::Denied
        );
        assert!(denied.is_checked());

        let broken = PermissionGate::new(ScriptedPermissions::new(
            Err("bridge unavailable"),
            Ok(PermissionState::Granted),
        ));
        assert_eq!(
            broken.ensure_location_permission_checked().await,
            GateOutcome::Errored
        );
        assert_eq!(broken.wait_checked().await, GateOutcome::Errored);
    }

    #[tokio::test]
    async fn check_runs_once_per_gate() {
        let provider = ScriptedPermissions::new(Ok(PermissionState::Prompt), Ok(PermissionState::Granted));
        let gate = PermissionGate::new(provider.clone());

        let (a, b) = tokio::join!(
            gate.ensure_location_permission_checked(),
            gate.ensure_location_permission_checked()
        );
        gate.ensure_location_permission_checked().await;

        assert_eq!(a, GateOutcome::Granted);
        assert_eq!(b, GateOutcome::Granted);
        assert_eq!(provider.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_block_until_the_check_finishes() {
        let provider = Arc::new(ScriptedPermissions {
            check: Ok(PermissionState::Granted),
            request: Ok(PermissionState::Granted),
            requests: AtomicUsize::new(0),
            delay: Duration::from_millis(500),
        });
        let gate = Arc::new(PermissionGate::new(provider));

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.wait_checked().await;
                tokio::time::Instant::now()
            })
        };

        let started = tokio::time::Instant::now();
        gate.ensure_location_permission_checked().await;
        let released_at = waiter.await.unwrap();
        assert!(released_at - started >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn late_waiters_get_the_recorded_outcome() {
        let gate = PermissionGate::new(ScriptedPermissions::new(
            Ok(PermissionState::Prompt),
            Ok(PermissionState::Granted),
        ));
        gate.ensure_location_permission_checked().await;

        assert_eq!(gate.wait_checked().await, GateOutcome::Granted);
        assert_eq!(gate.wait_checked().await, GateOutcome::Granted);
    }
}
