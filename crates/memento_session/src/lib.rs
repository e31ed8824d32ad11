//! Async collaborators around the core model: persistence, debounced
//! autosave, export and the tokio loops that drive them.

pub mod autosave;
pub mod clock;
pub mod driver;
pub mod error;
pub mod export;
pub mod store;

pub use autosave::{AutosaveCoordinator, SaveStatus};
pub use clock::MonotonicClock;
pub use driver::{lock, shared, spawn_autosave, spawn_playback, PlaybackCommand, SharedEditor};
pub use error::{Result, SessionError};
pub use export::{ExportController, ExportOutcome, ExportRequest, ExportState};
pub use store::{JsonDirStore, MemoryStore, ProjectStore};
