//! Google Sheets client, shared by the CLI and the HTTP server.
//!
//! This crate owns the Sheets wire contract: spreadsheet metadata lookup,
//! bulk value reads and single-range writes. Blocking reqwest, no Tokio.

mod client;
mod store;

pub use client::{SheetsClient, SheetsError, DEFAULT_API_BASE};
pub use store::SheetStore;
