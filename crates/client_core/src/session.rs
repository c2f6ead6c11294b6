use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    backend::SquareBackend,
    config::ClientSettings,
    monitor::ConnectivityMonitor,
    sync::{
        AddOutcome, ConnectivityTransition, SyncCoordinator, SyncEvent, SyncReport, SyncSnapshot,
    },
};

const SESSION_QUEUE_CAPACITY: usize = 64;

/// Work items for the session task. Everything that touches the coordinator
/// goes through this queue, one item at a time.
pub enum SessionEvent {
    ProbeCompleted { reachable: bool },
    AddSquare { reply: oneshot::Sender<AddOutcome> },
    Reconcile { reply: oneshot::Sender<Option<SyncReport>> },
    Reset { reply: oneshot::Sender<bool> },
    Reload { reply: oneshot::Sender<bool> },
    Snapshot { reply: oneshot::Sender<SyncSnapshot> },
    Shutdown,
}

pub struct SessionHandle {
    events: mpsc::Sender<SessionEvent>,
    updates: broadcast::Sender<SyncEvent>,
    session_task: Option<JoinHandle<()>>,
    monitor_task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn spawn(backend: Arc<dyn SquareBackend>, settings: &ClientSettings) -> Self {
        let monitor = ConnectivityMonitor::from_settings(Arc::clone(&backend), settings);
        Self::spawn_with(SyncCoordinator::new(backend), monitor)
    }

    pub fn spawn_with(coordinator: SyncCoordinator, monitor: ConnectivityMonitor) -> Self {
        let (events, queue) = mpsc::channel(SESSION_QUEUE_CAPACITY);
        let updates = coordinator.event_sender();
        let session_task = tokio::spawn(run_session(coordinator, queue));
        let monitor_task = monitor.spawn(events.clone());
        Self {
            events,
            updates,
            session_task: Some(session_task),
            monitor_task: Some(monitor_task),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.updates.subscribe()
    }

    pub async fn add_square(&self) -> Result<AddOutcome> {
        self.request(|reply| SessionEvent::AddSquare { reply }).await
    }

    pub async fn reconcile(&self) -> Result<Option<SyncReport>> {
        self.request(|reply| SessionEvent::Reconcile { reply }).await
    }

    pub async fn reset(&self) -> Result<bool> {
        self.request(|reply| SessionEvent::Reset { reply }).await
    }

    pub async fn reload(&self) -> Result<bool> {
        self.request(|reply| SessionEvent::Reload { reply }).await
    }

    pub async fn snapshot(&self) -> Result<SyncSnapshot> {
        self.request(|reply| SessionEvent::Snapshot { reply }).await
    }

    /// Stops the monitor, lets the session finish the item it is working on,
    /// and waits for it to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(monitor) = self.monitor_task.take() {
            monitor.abort();
        }
        let _ = self.events.send(SessionEvent::Shutdown).await;
        if let Some(session) = self.session_task.take() {
            session.await.context("session task failed")?;
        }
        Ok(())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionEvent,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(make(reply))
            .await
            .map_err(|_| anyhow!("session is closed"))?;
        response.await.context("session dropped the request")
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor_task.take() {
            monitor.abort();
        }
        if let Some(session) = self.session_task.take() {
            session.abort();
        }
    }
}

async fn run_session(mut coordinator: SyncCoordinator, mut queue: mpsc::Receiver<SessionEvent>) {
    coordinator.load().await;

    while let Some(event) = queue.recv().await {
        match event {
            SessionEvent::ProbeCompleted { reachable } => {
                let transition = coordinator.record_probe(reachable);
                if transition == ConnectivityTransition::Connected {
                    flush_after_reconnect(&mut coordinator).await;
                }
            }
            SessionEvent::AddSquare { reply } => {
                let _ = reply.send(coordinator.add_square().await);
            }
            SessionEvent::Reconcile { reply } => {
                let _ = reply.send(coordinator.reconcile().await);
            }
            SessionEvent::Reset { reply } => {
                let _ = reply.send(coordinator.reset().await);
            }
            SessionEvent::Reload { reply } => {
                let was_connected = coordinator.is_connected();
                let loaded = coordinator.load().await;
                if !was_connected && coordinator.is_connected() {
                    flush_after_reconnect(&mut coordinator).await;
                }
                let _ = reply.send(loaded);
            }
            SessionEvent::Snapshot { reply } => {
                let _ = reply.send(coordinator.snapshot());
            }
            SessionEvent::Shutdown => break,
        }
    }
    info!("session ended");
}

/// Runs once per move from disconnected to connected, whichever event caused it.
async fn flush_after_reconnect(coordinator: &mut SyncCoordinator) {
    if coordinator.should_reconcile() {
        debug!("backend reachable again; syncing queued squares");
        coordinator.reconcile().await;
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
