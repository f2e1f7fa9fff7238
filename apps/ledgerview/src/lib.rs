//! # Ledgerview
//!
//! Live account views over an append-only ledger event log.
//!
//! This crate is the async half of the workspace. `ledgerview-core` decides
//! what a view contains; this crate fetches, schedules and patches:
//!
//! - `source`: the `LogSource` trait and the in-memory ledger
//! - `scanner`: narrow-then-full candidate discovery
//! - `resolver`: bounded concurrent point queries
//! - `reconciler`: live subscription lifecycle
//! - `controller`: `LiveView`, the refresh/live/optimistic surface
//! - `config`, `api`: TOML configuration and the HTTP surface

pub mod api;
pub mod config;
pub mod controller;
pub mod reconciler;
pub mod resolver;
pub mod scanner;
pub mod source;

pub use config::{Config, ServerConfig, ViewConfig};
pub use controller::LiveView;
pub use reconciler::{LiveReconciler, LiveSignal, ReconcilerState};
pub use resolver::StateResolver;
pub use scanner::{ScanOutcome, WindowedScanner};
pub use source::{EventFeed, Fixture, FixtureStep, LogSource, MemoryLedger, SourceError};
