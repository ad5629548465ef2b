// src/engine/mod.rs

//! Orchestration engine for bdpipe.
//!
//! This module ties together:
//! - the project task graph
//! - the process controller (start/stop/pause/resume of process groups)
//! - the output relay and its observer
//! - the sequential run-all walk
//!
//! [`Engine`] in [`core`] is the control surface; [`scheduler`] adds
//! `run_all`; [`snapshot`] is the read-only status view.

pub mod core;
pub mod scheduler;
pub mod snapshot;

pub use self::core::Engine;
pub use scheduler::RunAllOutcome;
pub use snapshot::TaskSnapshot;
