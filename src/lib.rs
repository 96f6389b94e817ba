//! Core library surface for the divan search engine: phrase matching over a
//! ganjoor-style verse database, run as cancelable background tasks.
//!
//! The `bin` target is a thin command line over the same pieces.
pub mod config;
pub mod db;
pub mod models;
pub mod search;
pub mod tasks;

/// Settings the binary and embedders load once at startup.
pub use config::{ConfigError, Settings};

/// Query scoping used when building search parameters.
pub use db::{SearchScope, TITLE_SENTINEL};

pub use models::{Poem, Poet, SearchMatch, SearchResults, Verse};

/// Task layer entry points.
pub use tasks::{
    SearchParameters, Task, TaskContext, TaskError, TaskEvent, TaskHandle, TaskKind, TaskManager,
    TaskOutcome, UpdateCheckParameters, UpdateCheckReport,
};
