use std::{sync::Arc, time::Duration};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::debug;

use crate::{
    backend::{BackendError, SquareBackend},
    config::ClientSettings,
    session::SessionEvent,
};

/// Periodically checks whether the backend answers and reports each result
/// to the session. It never reads or writes coordinator state itself.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    backend: Arc<dyn SquareBackend>,
    interval: Duration,
    timeout: Duration,
}

impl ConnectivityMonitor {
    pub fn new(backend: Arc<dyn SquareBackend>, interval: Duration, timeout: Duration) -> Self {
        Self {
            backend,
            interval,
            timeout,
        }
    }

    pub fn from_settings(backend: Arc<dyn SquareBackend>, settings: &ClientSettings) -> Self {
        Self::new(backend, settings.ping_interval(), settings.probe_timeout())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// A probe that outlives the timeout is cancelled and counts as a failure.
    pub async fn probe_once(&self) -> Result<(), BackendError> {
        match time::timeout(self.timeout, self.backend.probe()).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.timeout)),
        }
    }

    /// Probes right away and then once per interval until the session side of
    /// the channel is gone or the returned task is aborted.
    pub fn spawn(self, events: mpsc::Sender<SessionEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reachable = match self.probe_once().await {
                    Ok(()) => true,
                    Err(error) => {
                        debug!(%error, "probe failed");
                        false
                    }
                };
                if events
                    .send(SessionEvent::ProbeCompleted { reachable })
                    .await
                    .is_err()
                {
                    debug!("session closed; stopping connectivity monitor");
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/monitor_tests.rs"]
mod tests;
