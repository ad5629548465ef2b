// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::{EpisodeId, StageKind};

/// Command-line arguments for `bdpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "bdpipe",
    version,
    about = "Drive the per-episode encode pipeline with resumable stages.",
    long_about = None
)]
pub struct CliArgs {
    /// Project root containing the `E<nn>` episode directories.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Path to the config file (TOML).
    ///
    /// Default: `Bdpipe.toml` inside the project root; a missing default file
    /// means "all defaults".
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override one encode profile option, e.g. `normal.crf=18`.
    ///
    /// May be given multiple times.
    #[arg(long = "param", value_name = "PROFILE.KEY=VALUE")]
    pub params: Vec<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BDPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Print every task with its status and elapsed time.
    Status,
    /// Print tasks, prerequisites and resolved commands; execute nothing.
    Plan,
    /// Start every pending task in priority order, one at a time.
    Run,
    /// Start a single task and follow it until it finishes.
    Start {
        #[arg(long)]
        episode: EpisodeId,
        /// Stage name, e.g. `video` or `hardsub_chs_merge`.
        #[arg(long)]
        stage: StageKind,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
