use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use shared::domain::{Color, Square, SquareId};

use crate::backend::{BackendError, SquareBackend};

#[derive(Default)]
struct FakeState {
    stored: Vec<Square>,
    offline: bool,
    creates_before_failure: Option<usize>,
    probe_delay: Option<Duration>,
    probes: usize,
    create_attempts: usize,
}

/// In-memory backend with switches for the failure modes the client handles.
#[derive(Default)]
pub(crate) struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with_squares(ids: &[i64]) -> Arc<Self> {
        let backend = Self::new();
        for &id in ids {
            backend.insert(square(id, Color::Red));
        }
        backend
    }

    /// Writes directly into storage, as another client would.
    pub(crate) fn insert(&self, square: Square) {
        self.lock().stored.push(square);
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.lock().offline = !online;
    }

    /// Lets `successes` creates through, then answers every create with a 500.
    pub(crate) fn fail_creates_after(&self, successes: usize) {
        self.lock().creates_before_failure = Some(successes);
    }

    pub(crate) fn set_probe_delay(&self, delay: Duration) {
        self.lock().probe_delay = Some(delay);
    }

    pub(crate) fn stored_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.lock().stored.iter().map(|s| s.id.0).collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn create_attempts(&self) -> usize {
        self.lock().create_attempts
    }

    pub(crate) fn probes(&self) -> usize {
        self.lock().probes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake backend lock")
    }

    fn check_online(&self) -> Result<(), BackendError> {
        if self.lock().offline {
            return Err(BackendError::Transport("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SquareBackend for FakeBackend {
    async fn list_squares(&self) -> Result<Vec<Square>, BackendError> {
        self.check_online()?;
        Ok(self.lock().stored.clone())
    }

    async fn create_square(&self, square: Square) -> Result<Square, BackendError> {
        self.check_online()?;
        let mut state = self.lock();
        state.create_attempts += 1;
        if let Some(remaining) = state.creates_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(BackendError::Status {
                    status: 500,
                    message: "disk full".into(),
                });
            }
            *remaining -= 1;
        }
        if state.stored.iter().any(|stored| stored.id == square.id) {
            return Err(BackendError::Conflict { id: square.id });
        }
        state.stored.push(square);
        Ok(square)
    }

    async fn reset_squares(&self) -> Result<(), BackendError> {
        self.check_online()?;
        self.lock().stored.clear();
        Ok(())
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let delay = {
            let mut state = self.lock();
            state.probes += 1;
            state.probe_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_online()
    }
}

pub(crate) fn square(id: i64, color: Color) -> Square {
    Square::new(SquareId(id), color)
}

pub(crate) fn column_ids(columns: &[Vec<Square>]) -> Vec<Vec<i64>> {
    columns
        .iter()
        .map(|column| column.iter().map(|s| s.id.0).collect())
        .collect()
}
