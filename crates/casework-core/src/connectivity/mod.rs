//! Connectivity monitoring.
//!
//! The monitor only relays what the platform layer reports; it performs no
//! probing of its own. Engines receive it as `Arc<dyn ConnectivityMonitor>` so
//! tests can drive online/offline transitions deterministically.

use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
}

impl NetworkStatus {
    pub const fn from_online(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

/// An edge between two connectivity states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: NetworkStatus,
    pub to: NetworkStatus,
}

impl Transition {
    /// Offline → online.
    pub fn is_reconnect(self) -> bool {
        self.from == NetworkStatus::Offline && self.to == NetworkStatus::Online
    }
}

/// Source of truth for "is connectivity available right now".
pub trait ConnectivityMonitor: Send + Sync {
    fn status(&self) -> NetworkStatus;

    fn is_online(&self) -> bool {
        self.status() == NetworkStatus::Online
    }

    /// Watch channel carrying every reported status.
    fn subscribe(&self) -> watch::Receiver<NetworkStatus>;
}

/// Monitor fed by an external reachability signal.
#[derive(Debug)]
pub struct SignalConnectivity {
    tx: watch::Sender<NetworkStatus>,
}

impl SignalConnectivity {
    pub fn new(initial: NetworkStatus) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn online() -> Self {
        Self::new(NetworkStatus::Online)
    }

    pub fn offline() -> Self {
        Self::new(NetworkStatus::Offline)
    }

    /// Report the current platform status. Returns whether it was a transition.
    pub fn set_status(&self, status: NetworkStatus) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });

        if changed {
            match status {
                NetworkStatus::Online => tracing::info!("Network: online"),
                NetworkStatus::Offline => tracing::warn!("Network: offline"),
            }
        }
        changed
    }

    pub fn set_online(&self, online: bool) -> bool {
        self.set_status(NetworkStatus::from_online(online))
    }
}

impl ConnectivityMonitor for SignalConnectivity {
    fn status(&self) -> NetworkStatus {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.tx.subscribe()
    }
}

/// Handle to a transition callback; delivery stops when cancelled or dropped.
#[derive(Debug)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub const fn is_active(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Invoke `callback` on every transition reported by `monitor`.
///
/// Must be called from within a tokio runtime. Rapid flips may be coalesced:
/// only edges between observed states are delivered.
pub fn on_change<M, F>(monitor: &M, callback: F) -> Subscription
where
    M: ConnectivityMonitor + ?Sized,
    F: Fn(Transition) + Send + 'static,
{
    let mut rx = monitor.subscribe();
    let mut previous = *rx.borrow_and_update();
    let task = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let current = *rx.borrow_and_update();
            if current != previous {
                callback(Transition {
                    from: previous,
                    to: current,
                });
                previous = current;
            }
        }
    });

    Subscription { task: Some(task) }
}
