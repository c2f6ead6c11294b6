use std::{collections::BTreeSet, sync::Arc};

use chrono::{DateTime, Utc};
use shared::domain::{Square, SquareId};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    backend::{BackendError, SquareBackend},
    layout::Grid,
    palette::pick_color,
};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    ConnectivityChanged { connected: bool },
    GridReloaded { squares: usize },
    SquareAdded { square: Square, unsynced: bool },
    SyncStarted { pending: usize },
    SyncFinished(SyncReport),
    Reset,
    Warning(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Queued squares the backend accepted, carrying their final ids.
    pub synced: Vec<Square>,
    /// Queued squares that were cleared from the queue without being stored.
    pub dropped: Vec<Square>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A reconciliation was running; nothing was created.
    Skipped,
    Persisted(Square),
    Queued(Square),
    /// The backend already held this id. The square stays on screen.
    Conflict(Square),
    /// The backend could not be reached. The square stays on screen but is not queued.
    Unpersisted(Square),
}

impl AddOutcome {
    pub fn square(&self) -> Option<Square> {
        match self {
            AddOutcome::Skipped => None,
            AddOutcome::Persisted(square)
            | AddOutcome::Queued(square)
            | AddOutcome::Conflict(square)
            | AddOutcome::Unpersisted(square) => Some(*square),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityTransition {
    Unchanged,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquareView {
    pub square: Square,
    pub unsynced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub columns: Vec<Vec<SquareView>>,
    pub connected: bool,
    pub syncing: bool,
    pub pending: usize,
    pub next_id: SquareId,
    pub last_probe_at: Option<DateTime<Utc>>,
}

impl SyncSnapshot {
    pub fn square_count(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }
}

/// Owns the client-side view of the square collection and keeps it in step
/// with the backend.
///
/// Every backend failure is absorbed here and turned into `connected = false`;
/// none of the public operations return an error.
pub struct SyncCoordinator {
    backend: Arc<dyn SquareBackend>,
    grid: Grid,
    next_id: SquareId,
    pending: Vec<Square>,
    connected: bool,
    syncing: bool,
    last_probe_at: Option<DateTime<Utc>>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncCoordinator {
    pub fn new(backend: Arc<dyn SquareBackend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            grid: Grid::new(),
            next_id: SquareId::FIRST,
            pending: Vec::new(),
            connected: true,
            syncing: false,
            last_probe_at: None,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<SyncEvent> {
        self.events.clone()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn pending(&self) -> &[Square] {
        &self.pending
    }

    pub fn next_id(&self) -> SquareId {
        self.next_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing
    }

    pub fn should_reconcile(&self) -> bool {
        self.connected && !self.syncing && !self.pending.is_empty()
    }

    /// Replaces the grid with the backend's squares. Returns whether the
    /// backend answered; on failure the current state is kept.
    pub async fn load(&mut self) -> bool {
        let mut fetched = match self.backend.list_squares().await {
            Ok(squares) => squares,
            Err(error) => {
                warn!(%error, "failed to load squares");
                self.set_connected(false);
                return false;
            }
        };
        fetched.retain(|square| {
            let valid = square.id.is_valid();
            if !valid {
                warn!(square_id = square.id.0, "ignoring square with out-of-range id");
            }
            valid
        });
        fetched.sort_by_key(|square| square.id);

        self.next_id = fetched
            .last()
            .map_or(SquareId::FIRST, |square| square.id.next());
        let mut grid = Grid::layout_all(fetched);
        let mut used: BTreeSet<SquareId> = grid.ids().collect();

        for queued in &mut self.pending {
            if used.contains(&queued.id) {
                let fresh = first_unused(&used, self.next_id);
                debug!(from = queued.id.0, to = fresh.0, "renumbered queued square on load");
                queued.id = fresh;
            }
            used.insert(queued.id);
            grid.push(*queued);
        }

        self.grid = grid;
        info!(
            squares = self.grid.len(),
            pending = self.pending.len(),
            "grid loaded"
        );
        self.emit(SyncEvent::GridReloaded {
            squares: self.grid.len(),
        });
        self.set_connected(true);
        true
    }

    pub async fn add_square(&mut self) -> AddOutcome {
        if self.syncing {
            debug!("add ignored while syncing");
            return AddOutcome::Skipped;
        }
        if self.connected && !self.pending.is_empty() {
            self.reconcile().await;
        }

        let last_color = self.latest_square().map(|square| square.color);
        let used = self.used_ids();
        let floor = used
            .last()
            .map_or(self.next_id, |max| self.next_id.max(max.next()));
        let id = first_unused(&used, floor);
        let square = Square::new(id, pick_color(last_color));
        self.next_id = id.next();

        let outcome = if self.connected {
            match self.backend.create_square(square).await {
                Ok(_) => {
                    info!(square_id = id.0, color = %square.color, "square persisted");
                    AddOutcome::Persisted(square)
                }
                Err(error) if error.is_conflict() => {
                    warn!(square_id = id.0, %error, "backend already holds this square id");
                    AddOutcome::Conflict(square)
                }
                Err(error) => {
                    warn!(square_id = id.0, %error, "failed to persist square");
                    self.emit(SyncEvent::Warning(format!(
                        "square {id} was not saved: {error}"
                    )));
                    self.set_connected(false);
                    AddOutcome::Unpersisted(square)
                }
            }
        } else {
            info!(square_id = id.0, color = %square.color, "square queued while offline");
            self.pending.push(square);
            AddOutcome::Queued(square)
        };

        self.grid.push(square);
        self.emit(SyncEvent::SquareAdded {
            square,
            unsynced: matches!(outcome, AddOutcome::Queued(_)),
        });
        outcome
    }

    /// Renumbers every queued square past the ids already in use and sends
    /// them to the backend in queue order. The queue is emptied whether or not
    /// the sends succeed. Returns `None` when a reconciliation is already
    /// running.
    pub async fn reconcile(&mut self) -> Option<SyncReport> {
        if self.syncing {
            return None;
        }
        self.syncing = true;
        let queued = std::mem::take(&mut self.pending);
        self.emit(SyncEvent::SyncStarted {
            pending: queued.len(),
        });

        let mut used = self.grid.ids().collect::<BTreeSet<_>>();
        let floor = used
            .last()
            .map_or(self.next_id, |max| self.next_id.max(max.next()));
        let mut cursor = floor;
        let mut renumbered = Vec::with_capacity(queued.len());
        for square in queued {
            let id = first_unused(&used, cursor);
            if !self.grid.renumber(square.id, id) {
                self.grid.push(Square::new(id, square.color));
            }
            used.insert(id);
            cursor = id.next();
            if square.id != id {
                debug!(from = square.id.0, to = id.0, "renumbered queued square");
            }
            renumbered.push(Square::new(id, square.color));
        }
        if let Some(last) = renumbered.last() {
            self.next_id = self.next_id.max(last.id.next());
        }

        let mut report = SyncReport::default();
        let mut reachable = None;
        let mut remaining = renumbered.into_iter();
        while let Some(square) = remaining.next() {
            match self.backend.create_square(square).await {
                Ok(_) => {
                    reachable = Some(reachable.unwrap_or(true));
                    report.synced.push(square);
                }
                Err(error) if error.is_conflict() => {
                    warn!(square_id = square.id.0, %error, "queued square already stored");
                    reachable = Some(reachable.unwrap_or(true));
                    report.dropped.push(square);
                }
                Err(error @ BackendError::Status { .. }) => {
                    warn!(square_id = square.id.0, %error, "backend rejected queued square");
                    self.emit(SyncEvent::Warning(unsynced_warning(&error)));
                    reachable = Some(false);
                    report.dropped.push(square);
                }
                Err(error) => {
                    warn!(square_id = square.id.0, %error, "sync interrupted");
                    self.emit(SyncEvent::Warning(unsynced_warning(&error)));
                    reachable = Some(false);
                    report.dropped.push(square);
                    report.dropped.extend(remaining.by_ref());
                }
            }
        }

        if let Some(reachable) = reachable {
            self.set_connected(reachable);
        }
        self.syncing = false;
        info!(
            synced = report.synced.len(),
            dropped = report.dropped.len(),
            next_id = self.next_id.0,
            "sync finished"
        );
        self.emit(SyncEvent::SyncFinished(report.clone()));
        Some(report)
    }

    /// Deletes every square on the backend and reloads. Returns whether the
    /// backend accepted the reset.
    pub async fn reset(&mut self) -> bool {
        if let Err(error) = self.backend.reset_squares().await {
            warn!(%error, "failed to reset squares");
            self.set_connected(false);
            return false;
        }

        self.grid = Grid::new();
        self.pending.clear();
        self.next_id = SquareId::FIRST;
        info!("all squares deleted");
        self.emit(SyncEvent::Reset);
        self.set_connected(true);
        self.load().await;
        true
    }

    /// Applies the result of a reachability probe.
    pub fn record_probe(&mut self, reachable: bool) -> ConnectivityTransition {
        self.last_probe_at = Some(Utc::now());
        match (self.connected, reachable) {
            (false, true) => {
                self.set_connected(true);
                ConnectivityTransition::Connected
            }
            (true, false) => {
                self.set_connected(false);
                ConnectivityTransition::Disconnected
            }
            _ => ConnectivityTransition::Unchanged,
        }
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        let unsynced: BTreeSet<SquareId> = self.pending.iter().map(|square| square.id).collect();
        let columns = self
            .grid
            .columns()
            .iter()
            .map(|column| {
                column
                    .iter()
                    .map(|square| SquareView {
                        square: *square,
                        unsynced: unsynced.contains(&square.id),
                    })
                    .collect()
            })
            .collect();
        SyncSnapshot {
            columns,
            connected: self.connected,
            syncing: self.syncing,
            pending: self.pending.len(),
            next_id: self.next_id,
            last_probe_at: self.last_probe_at,
        }
    }

    fn latest_square(&self) -> Option<Square> {
        self.grid
            .squares()
            .chain(self.pending.iter())
            .max_by_key(|square| square.id)
            .copied()
    }

    fn used_ids(&self) -> BTreeSet<SquareId> {
        self.grid
            .ids()
            .chain(self.pending.iter().map(|square| square.id))
            .collect()
    }

    fn set_connected(&mut self, connected: bool) {
        if self.connected != connected {
            info!(connected, "connectivity changed");
            self.connected = connected;
            self.emit(SyncEvent::ConnectivityChanged { connected });
        }
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }
}

fn first_unused(used: &BTreeSet<SquareId>, from: SquareId) -> SquareId {
    let mut id = from;
    while used.contains(&id) {
        id = id.next();
    }
    id
}

fn unsynced_warning(error: &BackendError) -> String {
    format!("queued squares could not be saved: {error}")
}

#[cfg(test)]
#[path = "tests/sync_tests.rs"]
mod tests;
