// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod types;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, CliCommand};
use crate::config::loader::load_for_project;
use crate::config::model::ProjectConfig;
use crate::config::validate::validate_profile;
use crate::dag::task::lock_task;
use crate::engine::{Engine, RunAllOutcome, TaskSnapshot};
use crate::exec::command::{parse_param_override, ProfileKind};
use crate::exec::relay::TracingObserver;
use crate::types::{TaskKey, TaskStatus};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and `--param` overrides
/// - the project graph and engine
/// - the output drain loop
/// - Ctrl-C handling (stop every active task)
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_for_project(&args.root, args.config.as_deref())
        .with_context(|| format!("loading config for {}", args.root.display()))?;
    apply_param_overrides(&mut cfg, &args.params)?;

    let engine = Arc::new(Engine::open(&args.root, &cfg, Arc::new(TracingObserver))?);

    match args.command {
        CliCommand::Status => {
            print_status(&engine.snapshot());
            Ok(())
        }
        CliCommand::Plan => {
            print_plan(&engine)?;
            Ok(())
        }
        CliCommand::Run => {
            let drain = engine.spawn_drain_loop();
            spawn_ctrl_c_handler(Arc::clone(&engine));

            let outcome = engine.run_all().await;
            engine.flush_output().await;
            drain.abort();
            print_status(&engine.snapshot());

            match outcome? {
                RunAllOutcome::Finished { started } => {
                    info!(started, "all runnable tasks completed");
                    Ok(())
                }
                RunAllOutcome::Halted { task, exit_code } => {
                    report_failure(&engine, task);
                    match exit_code {
                        Some(code) => bail!("run halted: {task} failed with exit code {code}"),
                        None => bail!("run halted: {task} could not be launched"),
                    }
                }
                RunAllOutcome::Interrupted { task } => bail!("run interrupted while {task} was running"),
            }
        }
        CliCommand::Start { episode, stage } => {
            let key = TaskKey::new(episode, stage);
            let drain = engine.spawn_drain_loop();
            spawn_ctrl_c_handler(Arc::clone(&engine));

            engine.start(episode, stage)?;
            let status = engine.wait_until_settled(key).await?;
            engine.flush_output().await;
            drain.abort();

            if status != TaskStatus::Completed {
                report_failure(&engine, key);
                bail!("{key} ended {status}");
            }
            info!(task = %key, %status, "task finished");
            Ok(())
        }
    }
}

/// Apply `PROFILE.KEY=VALUE` overrides on top of the loaded profiles.
fn apply_param_overrides(cfg: &mut ProjectConfig, params: &[String]) -> Result<()> {
    for param in params {
        let (kind, key, value) = parse_param_override(param)?;
        let profile = match kind {
            ProfileKind::Normal => &mut cfg.profiles.normal,
            ProfileKind::Hardsub => &mut cfg.profiles.hardsub,
        };
        debug!(profile = %kind, option = %key, value = %value, "profile override");
        profile.insert(key, value);
        validate_profile(&kind.to_string(), profile)?;
    }
    Ok(())
}

fn spawn_ctrl_c_handler(engine: Arc<Engine>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        warn!("Ctrl-C received; stopping active tasks");
        engine.stop_all().await;
    });
}

fn report_failure(engine: &Engine, key: TaskKey) {
    let Ok(task) = engine.project().task(key) else {
        return;
    };
    let t = lock_task(task);
    if let Some(err) = t.last_error() {
        eprintln!("{key}: {err}");
    }
    let tail = t.output().len().saturating_sub(20);
    for line in &t.output()[tail..] {
        eprintln!("  | {line}");
    }
}

fn print_status(snapshot: &[TaskSnapshot]) {
    println!("{:<4} {:<20} {:<10} {:>9}", "EP", "STAGE", "STATUS", "DURATION");
    for snap in snapshot {
        let code = match snap.exit_code {
            Some(code) if code != 0 => format!("  (exit {code})"),
            _ => String::new(),
        };
        println!(
            "E{:02}  {:<20} {:<10} {:>9}{code}",
            snap.episode,
            snap.stage.to_string(),
            snap.status.to_string(),
            snap.duration_label(),
        );
    }
}

/// Print tasks, their prerequisites and the command each would run now.
fn print_plan(engine: &Engine) -> Result<()> {
    let project = engine.project();
    println!("bdpipe plan");
    println!("  root = {}", project.root().display());
    println!("  episodes = {:?}", project.episodes());
    println!(
        "  languages = {}",
        project
            .languages()
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();

    for key in project.ordered_keys() {
        let status = project.status(key)?;
        println!("  - {key} [{status}]");
        let deps = project.graph().prerequisites_of(key.stage);
        if !deps.is_empty() {
            let deps: Vec<String> = deps.iter().map(|s| s.to_string()).collect();
            println!("      after: {}", deps.join(", "));
        }
        if !status.is_terminal() {
            println!("      cmd: {}", project.resolve_command(key)?);
        }
    }

    debug!("plan complete (no execution)");
    Ok(())
}
