// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::{StageKind, TaskKey, TaskStatus};

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The task's prerequisites are not all `completed`; its status is left
    /// untouched.
    #[error("prerequisites not met for {key}: waiting on {}", join_stages(missing))]
    Precondition { key: TaskKey, missing: Vec<StageKind> },

    /// The process could not be spawned; the task is now `failed`.
    #[error("failed to launch {key}: {message}")]
    Launch { key: TaskKey, message: String },

    #[error("cannot {action} {key} while it is {from}")]
    InvalidTransition {
        key: TaskKey,
        from: TaskStatus,
        action: &'static str,
    },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskKey),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn join_stages(stages: &[StageKind]) -> String {
    stages
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipelineError>;
