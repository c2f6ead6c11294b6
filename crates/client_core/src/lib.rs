//! Client side of the square grid: layout, color choice, backend access and
//! the offline queue that is flushed once the backend is reachable again.

pub mod backend;
pub mod config;
pub mod layout;
pub mod monitor;
pub mod palette;
pub mod session;
pub mod sync;

pub use backend::{BackendError, HttpSquareBackend, SquareBackend};
pub use config::ClientSettings;
pub use layout::Grid;
pub use monitor::ConnectivityMonitor;
pub use session::{SessionEvent, SessionHandle};
pub use sync::{
    AddOutcome, ConnectivityTransition, SquareView, SyncCoordinator, SyncEvent, SyncReport,
    SyncSnapshot,
};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
