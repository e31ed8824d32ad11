//! Photo slideshow model: timeline, edits with undo, transition catalog and
//! math, and the time-driven playback engine.

pub mod catalog;
pub mod config;
pub mod editing;
pub mod editor;
pub mod entitlement;
pub mod error;
pub mod history;
pub mod playback;
pub mod snapshot;
pub mod timeline;
pub mod transition;
pub mod types;

pub use editor::{EditOutcome, Editor, GateReason, Missing};
pub use error::{CoreError, Result};
pub use snapshot::ProjectSnapshot;
pub use timeline::Timeline;
pub use types::*;
