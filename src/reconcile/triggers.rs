use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{connectivity::Connectivity, permission::PermissionGate};

use super::{
    engine::ReconciliationEngine,
    state::{PassOutcome, TriggerSource},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Runs one pass on its own task so an error or panic inside it is logged
/// instead of tearing down the caller.
pub async fn run_guarded(
    engine: Arc<ReconciliationEngine>,
    source: TriggerSource,
) -> Option<PassOutcome> {
    let task = tokio::spawn(async move { engine.trigger(source).await });

    match task.await {
        Ok(Ok(outcome)) => {
            log_debug!("[Queue] {source} pass finished: {outcome:?}");
            Some(outcome)
        }
        Ok(Err(err)) => {
            log_error!("[Queue] Error processing queue ({source}): {err}");
            None
        }
        Err(join_err) => {
            log_error!("[Queue] {source} pass aborted: {join_err}");
            None
        }
    }
}

/// The initial startup run and the "became online" listener. Both wait for
/// the permission gate before their first pass.
pub struct TriggerSources {
    handles: Vec<JoinHandle<()>>,
    cancel_token: CancellationToken,
}

impl TriggerSources {
    pub fn spawn(
        engine: Arc<ReconciliationEngine>,
        gate: Arc<PermissionGate>,
        connectivity: Arc<dyn Connectivity>,
        cancel_token: CancellationToken,
    ) -> Self {
        let startup = tokio::spawn(startup_check(
            engine.clone(),
            gate.clone(),
            cancel_token.clone(),
        ));
        let reconnect = tokio::spawn(reconnect_listener(
            engine,
            gate,
            connectivity,
            cancel_token.clone(),
        ));

        Self {
            handles: vec![startup, reconnect],
            cancel_token,
        }
    }

    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        for handle in self.handles {
            if let Err(err) = handle.await {
                log_error!("trigger task failed to join: {err}");
            }
        }
    }
}

async fn startup_check(
    engine: Arc<ReconciliationEngine>,
    gate: Arc<PermissionGate>,
    cancel_token: CancellationToken,
) {
    log_debug!("[Queue] Waiting for permission check...");
    tokio::select! {
        _ = gate.wait_checked() => {}
        _ = cancel_token.cancelled() => return,
    }

    log_info!("[Queue] Performing initial queue check (post-permission)");
    run_guarded(engine, TriggerSource::Startup).await;
}

async fn reconnect_listener(
    engine: Arc<ReconciliationEngine>,
    gate: Arc<PermissionGate>,
    connectivity: Arc<dyn Connectivity>,
    cancel_token: CancellationToken,
) {
    tokio::select! {
        _ = gate.wait_checked() => {}
        _ = cancel_token.cancelled() => return,
    }

    let mut online_rx = connectivity.subscribe();
    let mut was_online = *online_rx.borrow_and_update();

    loop {
        tokio::select! {
            changed = online_rx.changed() => {
                if changed.is_err() {
                    log_debug!("connectivity feed closed; reconnect listener exiting");
                    break;
                }
                let online = *online_rx.borrow_and_update();
                if online && !was_online {
                    log_info!("[Queue] Came online, triggering queue processing");
                    // Keep listening while the pass runs; the engine folds
                    // overlapping reconnects into a follow-up pass.
                    tokio::spawn(run_guarded(engine.clone(), TriggerSource::Reconnect));
                }
                was_online = online;
            }
            _ = cancel_token.cancelled() => {
                log_debug!("reconnect listener shutting down");
                break;
            }
        }
    }
}
