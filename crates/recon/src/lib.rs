//! `autoreply-recon`: sheet-driven auto-reply reconciliation engine.
//!
//! Pure engine crate: reads rows through a [`RowStore`], sends through a
//! [`Notifier`], records completion back into the store. No network or
//! CLI dependencies; concrete stores and transports live in sibling crates.

pub mod classify;
pub mod column;
pub mod engine;
pub mod error;
pub mod model;
pub mod notify;
pub mod schema;
pub mod service;
pub mod store;

pub use classify::classify;
pub use engine::{plan, run};
pub use error::{ReconError, SendError, StoreError};
pub use model::{BatchResult, EligibilityStatus, Record, RowOutcome, RowResult, Schema};
pub use notify::{Message, Notifier, RecordingNotifier, Template};
pub use schema::{resolve, FieldNames};
pub use service::{AutoReply, ExecuteReport, Preview};
pub use store::{MemoryStore, RowStore, Snapshot};
