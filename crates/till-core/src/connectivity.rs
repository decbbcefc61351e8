//! Online/offline signal.
//!
//! The repository and the replayer never consult global state; they are
//! handed a [`Connectivity`] and ask it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::gateway::RemoteGateway;

/// Answers "are we online now?" and notifies on change.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;

    /// Receiver that observes every online/offline transition
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Manually driven connectivity signal
#[derive(Debug, Clone)]
pub struct ConnectivitySignal {
    sender: Arc<watch::Sender<bool>>,
}

impl ConnectivitySignal {
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Update the state; subscribers are only woken on an actual change.
    pub fn set_online(&self, online: bool) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            if online {
                tracing::info!("Connectivity restored");
            } else {
                tracing::warn!("Connectivity lost; working offline");
            }
        }
    }
}

impl Connectivity for ConnectivitySignal {
    fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Derives connectivity from whether the backend answers.
pub struct ConnectivityMonitor {
    gateway: Arc<dyn RemoteGateway>,
    signal: ConnectivitySignal,
}

impl ConnectivityMonitor {
    pub const fn new(gateway: Arc<dyn RemoteGateway>, signal: ConnectivitySignal) -> Self {
        Self { gateway, signal }
    }

    /// Probe once and publish the result.
    pub async fn check(&self) -> bool {
        let online = match self.gateway.probe().await {
            Ok(()) => true,
            Err(error) => {
                tracing::debug!(%error, "Backend probe failed");
                false
            }
        };
        self.signal.set_online(online);
        online
    }

    /// Probe on a fixed interval until the task is aborted.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.check().await;
            }
        })
    }
}
