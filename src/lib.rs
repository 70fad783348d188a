//! # EmberKV
//!
//! An in-memory key-value engine with crash-recoverable disk persistence,
//! served over the Redis wire protocol (RESP):
//! - Append-only value logs addressed by `(offset, length)` frames
//! - Replayable index journals that rebuild the in-memory index on startup
//! - Lazy expiration checked at access time
//! - Single-writer/multi-reader concurrency model
//! - Scalar, list and hash data kinds with strict type exclusivity
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 TCP Server (RESP, worker pool)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │               Engine (command dispatch, recovery)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!      ┌────────────────┼────────────────┐
//!      ▼                ▼                ▼
//! ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │ Scalar   │    │  List    │    │  Hash    │   Typed Stores
//! │ Store    │    │  Store   │    │  Store   │
//! └────┬─────┘    └────┬─────┘    └────┬─────┘
//!      └───────────────┼───────────────┘
//!                      ▼
//!        ┌───────────────────────────┐
//!        │ Base Ops (exists / expiry │
//!        │   / type check / gate)    │
//!        └─────────────┬─────────────┘
//!                      ▼
//!        ┌───────────────────────────┐
//!        │ Keyspace: per-kind LogPair │
//!        │  ┌──────────┐ ┌─────────┐ │
//!        │  │ ValueLog │ │IndexLog │ │
//!        │  │ (frames) │ │(journal)│ │
//!        │  └──────────┘ └─────────┘ │
//!        └───────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod clock;

pub mod vlog;
pub mod index;
pub mod keyspace;
pub mod base;
pub mod store;
pub mod engine;

pub mod protocol;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{EmberError, Result};
pub use config::Config;
pub use engine::{Engine, RecoveryReport};
pub use index::Kind;
pub use store::{HashStore, ListStore, ScalarStore, Ttl};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of EmberKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
