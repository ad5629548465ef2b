// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] resolves a task's [`CommandSpec`](command::CommandSpec) into
//!   the shell command line dispatched at start time.
//! - [`stage_commands`] provides the per-stage commands a project is built
//!   with.
//! - [`process`] launches tasks as process groups and delivers
//!   stop/pause/resume signals.
//! - [`relay`] captures combined output and forwards it to a
//!   [`TaskObserver`](relay::TaskObserver).

pub mod command;
pub mod process;
pub mod relay;
pub mod stage_commands;

pub use command::{CommandSpec, EncodeProfiles, ProfileKind};
pub use process::ProcessController;
pub use relay::{OutputRelay, TaskObserver, TracingObserver};
pub use stage_commands::{ShellStageCommands, StageCommands};
