//! # Scholar Sync
//!
//! Client-side sync engine for an academic paper search and library
//! service: run aggregated searches, filter and page through the results,
//! check which papers are already saved, and bulk-import them into the
//! library in fixed-size chunks.
//!
//! ## Architecture
//!
//! - [`models`]: Wire types (papers, search responses, library entries)
//! - [`client`]: The [`client::LibraryApi`] trait, its HTTP implementation and a mock
//! - [`store`]: Application state, derived views and selection
//! - [`sync`]: The [`sync::SyncEngine`] orchestrating searches, reconciliation and ingestion
//! - [`config`]: Configuration management
//! - [`ui`]: Terminal output helpers for the CLI

pub mod client;
pub mod config;
pub mod models;
pub mod store;
pub mod sync;
pub mod ui;

// Re-export commonly used types
pub use client::{ApiError, HttpLibraryClient, LibraryApi};
pub use models::Paper;
pub use store::Store;
pub use sync::{SyncEngine, SyncError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
