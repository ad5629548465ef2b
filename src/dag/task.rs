// src/dag/task.rs

//! One stage instance and its lifecycle.
//!
//! A [`Task`] is shared as `Arc<Mutex<Task>>` between the controlling code,
//! the output relay and the run-all walk. Every status change goes through
//! [`Task::transition`] under that lock; the lock is never held across an
//! `.await`.

use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local, TimeDelta};
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::errors::{PipelineError, Result};
use crate::exec::command::CommandSpec;
use crate::types::{StageKind, TaskKey, TaskStatus};

pub type SharedTask = Arc<Mutex<Task>>;

/// Lock a task, recovering the guard if another holder panicked.
pub fn lock_task(task: &SharedTask) -> MutexGuard<'_, Task> {
    task.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A live process group owned by exactly one task.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pgid: i32,
}

impl ProcessHandle {
    pub fn new(child: Child, pgid: i32) -> Self {
        Self { child, pgid }
    }

    pub fn pgid(&self) -> i32 {
        self.pgid
    }
}

#[derive(Debug)]
pub struct Task {
    key: TaskKey,
    command: CommandSpec,
    prerequisites: Vec<StageKind>,
    work_dir: PathBuf,
    status: TaskStatus,
    started_at: Option<DateTime<Local>>,
    ended_at: Option<DateTime<Local>>,
    /// Append-only across restarts.
    output: Vec<String>,
    paused: bool,
    exit_code: Option<i32>,
    last_error: Option<String>,
    /// Command line of the most recent start, frozen at dispatch.
    dispatched: Option<String>,
    stop_requested: bool,
    process: Option<ProcessHandle>,
}

impl Task {
    pub fn new(
        key: TaskKey,
        command: CommandSpec,
        prerequisites: Vec<StageKind>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            key,
            command,
            prerequisites,
            work_dir: work_dir.into(),
            status: TaskStatus::Pending,
            started_at: None,
            ended_at: None,
            output: Vec::new(),
            paused: false,
            exit_code: None,
            last_error: None,
            dispatched: None,
            stop_requested: false,
            process: None,
        }
    }

    pub fn key(&self) -> TaskKey {
        self.key
    }

    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    pub fn prerequisites(&self) -> &[StageKind] {
        &self.prerequisites
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Local>> {
        self.ended_at
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dispatched_command(&self) -> Option<&str> {
        self.dispatched.as_deref()
    }

    pub fn pgid(&self) -> Option<i32> {
        self.process.as_ref().map(ProcessHandle::pgid)
    }

    pub fn has_process(&self) -> bool {
        self.process.is_some()
    }

    /// Elapsed wall-clock time: end - start, or now - start while active.
    pub fn elapsed(&self, now: DateTime<Local>) -> Option<TimeDelta> {
        let start = self.started_at?;
        Some(self.ended_at.unwrap_or(now) - start)
    }

    /// Move to `to`, keeping timestamps consistent with the new status.
    ///
    /// The end time is set exactly when the status is terminal. Entering
    /// `running` from `pending` records a fresh start time; resuming from
    /// `paused` keeps the original one.
    pub fn transition(&mut self, to: TaskStatus, action: &'static str) -> Result<()> {
        let from = self.status;
        if !from.can_transition(to) {
            return Err(PipelineError::InvalidTransition {
                key: self.key,
                from,
                action,
            });
        }

        let now = Local::now();
        match to {
            TaskStatus::Pending => self.ended_at = None,
            TaskStatus::Running if from == TaskStatus::Pending => {
                self.started_at = Some(now);
                self.ended_at = None;
            }
            _ if to.is_terminal() => self.ended_at = Some(now),
            _ => {}
        }
        self.paused = to == TaskStatus::Paused;
        self.status = to;

        debug!(task = %self.key, %from, %to, "task transition");
        Ok(())
    }

    /// Resume shortcut: a fresh task whose artifact already exists becomes
    /// `completed` with start == end, without running anything.
    ///
    /// Only applies to `pending`; in particular a `stopped` task is never
    /// considered done by this check.
    pub fn mark_already_done(&mut self, now: DateTime<Local>) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.started_at = Some(now);
        self.ended_at = Some(now);
        true
    }

    /// Enter `running` for a new run: failed/stopped tasks pass through
    /// `pending` first. Per-run fields are reset; output is kept.
    pub fn begin_run(&mut self, command: String) -> Result<()> {
        if !self.status.is_startable() {
            return Err(PipelineError::InvalidTransition {
                key: self.key,
                from: self.status,
                action: "start",
            });
        }
        if self.status != TaskStatus::Pending {
            self.transition(TaskStatus::Pending, "start")?;
        }
        self.transition(TaskStatus::Running, "start")?;
        self.exit_code = None;
        self.last_error = None;
        self.stop_requested = false;
        self.dispatched = Some(command);
        Ok(())
    }

    pub fn attach_process(&mut self, handle: ProcessHandle) {
        self.process = Some(handle);
    }

    /// The process never existed; the run ends `failed` with `message`.
    pub fn launch_failed(&mut self, message: String) -> Result<()> {
        self.last_error = Some(message);
        self.transition(TaskStatus::Failed, "launch")
    }

    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn push_output(&mut self, line: String) {
        self.output.push(line);
    }

    /// Check the owned process without blocking.
    ///
    /// On exit the handle is released first, then the task settles:
    /// `stopped` if a stop was requested, else `completed` on exit code 0 and
    /// `failed` otherwise. Returns the new status if the process was reaped.
    pub fn try_reap(&mut self) -> Option<TaskStatus> {
        let handle = self.process.as_mut()?;
        let exit = match handle.child.try_wait() {
            Ok(Some(exit)) => exit,
            Ok(None) => return None,
            Err(err) => {
                warn!(task = %self.key, error = %err, "failed to poll task process");
                return None;
            }
        };

        self.process = None;
        let code = exit.code().or_else(|| exit.signal().map(|sig| 128 + sig));
        self.exit_code = code;

        let to = if self.stop_requested {
            TaskStatus::Stopped
        } else if exit.success() {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };

        if self.status.is_active() {
            if let Err(err) = self.transition(to, "reap") {
                warn!(task = %self.key, error = %err, "unexpected status after exit");
                return None;
            }
        }

        info!(
            episode = self.key.episode,
            stage = %self.key.stage,
            exit_code = ?code,
            status = %self.status,
            "task process exited"
        );
        Some(self.status)
    }

    /// Settle an active task as `stopped` once its process is gone.
    pub fn finish_stopped(&mut self) {
        if self.status.is_active() && self.process.is_none() {
            // Active -> stopped is always a valid edge.
            let _ = self.transition(TaskStatus::Stopped, "stop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StageKind;

    fn task() -> Task {
        Task::new(
            TaskKey::new(1, StageKind::Video),
            CommandSpec::shell("true"),
            Vec::new(),
            "/tmp",
        )
    }

    #[test]
    fn end_time_tracks_terminal_status() {
        let mut t = task();
        assert!(t.ended_at().is_none());

        t.begin_run("true".into()).unwrap();
        assert_eq!(t.status(), TaskStatus::Running);
        assert!(t.started_at().is_some());
        assert!(t.ended_at().is_none());

        t.transition(TaskStatus::Paused, "pause").unwrap();
        assert!(t.is_paused());
        assert!(t.ended_at().is_none());

        t.transition(TaskStatus::Failed, "reap").unwrap();
        assert!(t.ended_at().is_some());
        assert!(!t.is_paused());

        t.begin_run("true".into()).unwrap();
        assert!(t.ended_at().is_none());
    }

    #[test]
    fn resume_keeps_start_time() {
        let mut t = task();
        t.begin_run("true".into()).unwrap();
        let started = t.started_at();
        t.transition(TaskStatus::Paused, "pause").unwrap();
        t.transition(TaskStatus::Running, "resume").unwrap();
        assert_eq!(t.started_at(), started);
    }

    #[test]
    fn already_done_only_from_pending() {
        let now = Local::now();
        let mut t = task();
        assert!(t.mark_already_done(now));
        assert_eq!(t.status(), TaskStatus::Completed);
        assert_eq!(t.started_at(), t.ended_at());

        let mut stopped = task();
        stopped.begin_run("sleep 10".into()).unwrap();
        stopped.transition(TaskStatus::Stopped, "stop").unwrap();
        assert!(!stopped.mark_already_done(now));
        assert_eq!(stopped.status(), TaskStatus::Stopped);
    }

    #[test]
    fn completed_cannot_start_again() {
        let mut t = task();
        t.mark_already_done(Local::now());
        let err = t.begin_run("true".into()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidTransition { from: TaskStatus::Completed, .. }
        ));
        assert_eq!(t.status(), TaskStatus::Completed);
    }

    #[test]
    fn launch_failure_keeps_message() {
        let mut t = task();
        t.begin_run("missing-tool".into()).unwrap();
        t.launch_failed("No such file or directory".into()).unwrap();
        assert_eq!(t.status(), TaskStatus::Failed);
        assert_eq!(t.last_error(), Some("No such file or directory"));
        assert!(t.ended_at().is_some());
    }
}
