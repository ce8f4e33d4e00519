//! Tandem - a dependency-aware concurrent work scheduler.
//!
//! Features are loaded into a dependency graph and handed out to concurrent
//! workers in priority order, never before their prerequisites pass. Skipped
//! features go to the back of the queue along with an impact report on what
//! waits for them, and a pause gate lets in-flight work drain cleanly.
//!
//! The [`scheduler::Scheduler`] facade is the entry point for library use; the
//! [`cli`] module drives it from the `tandem` binary against a `.tandem/`
//! repository.

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod gate;
pub mod graph;
pub mod impact;
pub mod ingest;
pub mod scheduler;
pub mod storage;

// Public CLI module (needed by binary)
pub mod cli;

// Command implementations
pub mod commands;

// Repository context and configuration
pub mod app;
pub mod config;
pub mod lock;

// Output formatting
pub mod output;

pub use error::{Error, Result};
pub use scheduler::{Scheduler, SchedulerSettings};
