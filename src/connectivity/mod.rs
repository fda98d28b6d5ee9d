use tokio::sync::watch;

mod probe;

pub use probe::ConnectivityProbe;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Device network state: a point-in-time query plus a change feed.
///
/// A `false -> true` change on the receiver is a "became online" event.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;

    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Holds the latest known network state and fans changes out to subscribers.
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        Self { tx }
    }

    /// Publishes a new state. Repeating the current state wakes nobody.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            if online {
                log_info!("Network is back online");
            } else {
                log_info!("Network went offline");
            }
        }
    }
}

impl Connectivity for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
