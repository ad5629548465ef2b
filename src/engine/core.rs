// src/engine/core.rs

//! The control surface: every outward command is keyed by (episode, stage)
//! and goes through [`Engine`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::model::{OptionValue, ProfileOptions, ProjectConfig};
use crate::dag::project::Project;
use crate::dag::task::{lock_task, SharedTask};
use crate::engine::snapshot::TaskSnapshot;
use crate::errors::{PipelineError, Result};
use crate::exec::command::ProfileKind;
use crate::exec::process::ProcessController;
use crate::exec::relay::{OutputRelay, TaskObserver};
use crate::exec::stage_commands::ShellStageCommands;
use crate::fs::RealFileSystem;
use crate::types::{EpisodeId, StageKind, TaskKey, TaskStatus};

/// Owns the project, the process controller and the output relay.
#[derive(Debug)]
pub struct Engine {
    project: Project,
    controller: ProcessController,
    relay: Arc<OutputRelay>,
    poll_interval: Duration,
    drain_interval: Duration,
}

impl Engine {
    pub fn new(project: Project, config: &ProjectConfig, observer: Arc<dyn TaskObserver>) -> Self {
        Self {
            project,
            controller: ProcessController::from_runtime(&config.runtime),
            relay: Arc::new(OutputRelay::new(observer)),
            poll_interval: config.runtime.poll_interval(),
            drain_interval: config.runtime.drain_interval(),
        }
    }

    /// Build the project for `root` on the real filesystem with the standard
    /// stage commands.
    pub fn open(
        root: &Path,
        config: &ProjectConfig,
        observer: Arc<dyn TaskObserver>,
    ) -> Result<Self> {
        let project = Project::build(
            root,
            config,
            Arc::new(RealFileSystem),
            &ShellStageCommands,
        )?;
        Ok(Self::new(project, config, observer))
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run the shared drain loop in the background.
    pub fn spawn_drain_loop(&self) -> JoinHandle<()> {
        self.relay.spawn_drain_loop(self.drain_interval)
    }

    /// One synchronous drain pass (also reaps exited processes).
    pub fn drain_output(&self) {
        self.relay.drain_once();
    }

    /// Start one task.
    ///
    /// Fails with `InvalidTransition` unless the task is pending, failed or
    /// stopped, and with `Precondition` (status untouched) unless every
    /// prerequisite of the same episode is completed. The command is resolved
    /// from the profiles as they are now.
    pub fn start(&self, episode: EpisodeId, stage: StageKind) -> Result<()> {
        let key = TaskKey::new(episode, stage);
        let task = self.project.task(key)?;

        let status = lock_task(task).status();
        if !status.is_startable() {
            return Err(PipelineError::InvalidTransition {
                key,
                from: status,
                action: "start",
            });
        }

        let missing = self.project.unmet_prerequisites(key)?;
        if !missing.is_empty() {
            debug!(task = %key, ?missing, "start refused: prerequisites not completed");
            return Err(PipelineError::Precondition { key, missing });
        }

        let command = self.project.resolve_command(key)?;
        if let Some(stdout) = self.controller.launch(task, command)? {
            self.relay.attach(task, stdout);
        }
        Ok(())
    }

    /// Stop one task. Stopping a task that is not running is a no-op.
    pub async fn stop(&self, episode: EpisodeId, stage: StageKind) -> Result<()> {
        let key = TaskKey::new(episode, stage);
        let task = self.project.task(key)?;
        self.controller.stop(task).await;
        self.relay.close(key);
        Ok(())
    }

    /// Returns `false` if the process group had already exited.
    pub fn pause(&self, episode: EpisodeId, stage: StageKind) -> Result<bool> {
        let task = self.project.task(TaskKey::new(episode, stage))?;
        self.controller.pause(task)
    }

    pub fn resume(&self, episode: EpisodeId, stage: StageKind) -> Result<bool> {
        let task = self.project.task(TaskKey::new(episode, stage))?;
        self.controller.resume(task)
    }

    /// Stop every running or paused task, concurrently.
    pub async fn stop_all(&self) -> usize {
        let active = self.active_tasks();
        if active.is_empty() {
            return 0;
        }
        info!(count = active.len(), "stopping all active tasks");

        let mut set = JoinSet::new();
        for (_, task) in &active {
            let controller = self.controller.clone();
            let task = Arc::clone(task);
            set.spawn(async move { controller.stop(&task).await });
        }
        while let Some(joined) = set.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "stop task panicked");
            }
        }
        for (key, _) in &active {
            self.relay.close(*key);
        }
        active.len()
    }

    /// Pause every running task. Returns how many were paused.
    pub fn pause_all(&self) -> usize {
        self.active_tasks()
            .iter()
            .filter(|(_, task)| matches!(self.controller.pause(task), Ok(true)))
            .count()
    }

    /// Poll until `key` is neither running nor paused.
    pub async fn wait_until_settled(&self, key: TaskKey) -> Result<TaskStatus> {
        let task = self.project.task(key)?;
        loop {
            self.relay.drain_once();
            let status = lock_task(task).status();
            if !status.is_active() {
                return Ok(status);
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Block until the relay has delivered every line and completion it is
    /// still tracking.
    pub async fn flush_output(&self) {
        while !self.relay.is_idle() {
            self.relay.drain_once();
            sleep(self.drain_interval).await;
        }
    }

    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        let now = Local::now();
        self.project
            .tasks()
            .iter()
            .map(|task| TaskSnapshot::capture(&lock_task(task), now))
            .collect()
    }

    /// Everything the task has printed so far, across all of its runs.
    pub fn output(&self, key: TaskKey) -> Result<Vec<String>> {
        Ok(lock_task(self.project.task(key)?).output().to_vec())
    }

    pub fn profile(&self, kind: ProfileKind) -> ProfileOptions {
        self.project.profile(kind)
    }

    /// Edit an encode profile. Only affects tasks started afterwards.
    pub fn set_profile_option(
        &self,
        kind: ProfileKind,
        key: &str,
        value: OptionValue,
    ) -> Result<()> {
        self.project.set_profile_option(kind, key, value)
    }

    /// Drop an option from a profile. Required options cannot be removed.
    pub fn remove_profile_option(&self, kind: ProfileKind, key: &str) -> Result<()> {
        self.project.remove_profile_option(kind, key)
    }

    pub fn reset_profile(&self, kind: ProfileKind) {
        self.project.reset_profile(kind);
    }

    /// Re-check completion artifacts of pending tasks.
    pub fn refresh(&self) -> usize {
        self.project.refresh()
    }

    fn active_tasks(&self) -> Vec<(TaskKey, SharedTask)> {
        self.project
            .tasks()
            .iter()
            .filter_map(|task| {
                let t = lock_task(task);
                t.status().is_active().then(|| (t.key(), Arc::clone(task)))
            })
            .collect()
    }
}
