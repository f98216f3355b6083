//! Session history of command suggestions.
//!
//! # Module Structure
//!
//! - [`store`] - append-only history log with key-value persistence
//! - [`stats`] - statistics derived from the log
//! - [`snapshot`] - validated JSON snapshot format

mod snapshot;
mod stats;
mod store;


pub use snapshot::{parse_snapshot, render_snapshot};
pub use stats::{Statistics, recompute};
pub use store::HistoryStore;
