// src/exec/process.rs

//! OS process-group control for tasks.
//!
//! Every command runs as `sh -c` in a new process group, so one signal reaches
//! every process of a shell pipeline (`vspipe | x265`, `a && b`). Standard
//! error is folded into standard output inside the shell.

use std::process::Stdio;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::{ChildStdout, Command};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::model::RuntimeSection;
use crate::dag::task::{lock_task, ProcessHandle, SharedTask};
use crate::errors::{PipelineError, Result};
use crate::types::{TaskKey, TaskStatus};

/// How often `stop` re-checks whether the group has exited.
const STOP_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct ProcessController {
    grace: Duration,
}

impl ProcessController {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    pub fn from_runtime(runtime: &RuntimeSection) -> Self {
        Self::new(runtime.stop_grace())
    }

    /// Start `command` for `task` as the leader of a new process group.
    ///
    /// The task must be startable (`pending`, `failed` or `stopped`).
    /// Prerequisites are the caller's concern. A spawn error leaves the task
    /// `failed` and is returned as [`PipelineError::Launch`].
    pub fn launch(&self, task: &SharedTask, command: String) -> Result<Option<ChildStdout>> {
        let mut t = lock_task(task);
        let key = t.key();
        t.begin_run(command.clone())?;

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(format!("exec 2>&1\n{command}"))
            .current_dir(t.work_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .process_group(0)
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                let message = format!("spawning `sh` in {}: {err}", t.work_dir().display());
                warn!(task = %key, error = %message, "task failed to launch");
                t.launch_failed(message.clone())?;
                return Err(PipelineError::Launch { key, message });
            }
        };

        let stdout = child.stdout.take();
        let Some(pid) = child.id() else {
            // Already reaped by the runtime; nothing left to signal.
            let message = "process exited before it could be tracked".to_string();
            t.launch_failed(message.clone())?;
            return Err(PipelineError::Launch { key, message });
        };
        let pgid = pid as i32;
        t.attach_process(ProcessHandle::new(child, pgid));

        info!(
            episode = key.episode,
            stage = %key.stage,
            pid = pgid,
            cmd = %command,
            "started task process"
        );
        Ok(stdout)
    }

    /// Stop the task's process group: terminate, wait up to the grace period,
    /// then kill. Ends `stopped` with an end time.
    ///
    /// A task without a live process is left as it is, so repeated stops are
    /// harmless.
    pub async fn stop(&self, task: &SharedTask) {
        let (key, pgid, paused) = {
            let mut t = lock_task(task);
            // An exit the drain loop has not reaped yet settles on its own code.
            t.try_reap();
            if !t.status().is_active() {
                debug!(task = %t.key(), status = %t.status(), "stop: nothing running");
                return;
            }
            t.request_stop();
            (t.key(), t.pgid(), t.is_paused())
        };

        if let Some(pgid) = pgid {
            info!(task = %key, pgid, "stopping task process group");
            signal_group(key, pgid, Signal::SIGTERM);
            if paused {
                // A stopped group only acts on SIGTERM once continued.
                signal_group(key, pgid, Signal::SIGCONT);
            }

            if !wait_for_exit(task, Some(self.grace)).await {
                warn!(
                    task = %key,
                    pgid,
                    grace_secs = self.grace.as_secs_f64(),
                    "task ignored SIGTERM; killing process group"
                );
                signal_group(key, pgid, Signal::SIGKILL);
                wait_for_exit(task, None).await;
            }
        }

        lock_task(task).finish_stopped();
    }

    /// Suspend a running task's process group. Returns `false` if the group
    /// was already gone, in which case the status is unchanged.
    pub fn pause(&self, task: &SharedTask) -> Result<bool> {
        self.toggle(task, TaskStatus::Running, TaskStatus::Paused, Signal::SIGSTOP, "pause")
    }

    /// Continue a paused task's process group.
    pub fn resume(&self, task: &SharedTask) -> Result<bool> {
        self.toggle(task, TaskStatus::Paused, TaskStatus::Running, Signal::SIGCONT, "resume")
    }

    fn toggle(
        &self,
        task: &SharedTask,
        from: TaskStatus,
        to: TaskStatus,
        signal: Signal,
        action: &'static str,
    ) -> Result<bool> {
        let mut t = lock_task(task);
        let key = t.key();
        if t.status() != from {
            return Err(PipelineError::InvalidTransition {
                key,
                from: t.status(),
                action,
            });
        }
        let Some(pgid) = t.pgid() else {
            return Ok(false);
        };
        if !signal_group(key, pgid, signal) {
            return Ok(false);
        }
        t.transition(to, action)?;
        info!(task = %key, pgid, "task {}", to);
        Ok(true)
    }
}

/// Send `signal` to the group. A group that is already gone is not an error.
fn signal_group(key: TaskKey, pgid: i32, signal: Signal) -> bool {
    match killpg(Pid::from_raw(pgid), signal) {
        Ok(()) => true,
        Err(Errno::ESRCH) => {
            debug!(task = %key, pgid, ?signal, "process group already gone");
            false
        }
        Err(err) => {
            warn!(task = %key, pgid, ?signal, error = %err, "signal delivery failed");
            false
        }
    }
}

/// Poll until the task's process has been reaped. Returns `false` if
/// `limit` passes first.
async fn wait_for_exit(task: &SharedTask, limit: Option<Duration>) -> bool {
    let deadline = limit.map(|d| Instant::now() + d);
    loop {
        {
            let mut t = lock_task(task);
            t.try_reap();
            if !t.has_process() {
                return true;
            }
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return false;
        }
        sleep(STOP_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::dag::task::Task;
    use crate::exec::command::CommandSpec;
    use crate::types::StageKind;

    #[tokio::test]
    async fn pausing_a_vanished_group_reports_no_transition() {
        let mut child = Command::new("true").process_group(0).spawn().unwrap();
        let pid = child.id().unwrap() as i32;
        child.wait().await.unwrap();

        let mut task = Task::new(
            TaskKey::new(1, StageKind::Audio),
            CommandSpec::shell("true"),
            Vec::new(),
            ".",
        );
        task.begin_run("true".into()).unwrap();
        task.attach_process(ProcessHandle::new(child, pid));
        let task: SharedTask = Arc::new(Mutex::new(task));

        let controller = ProcessController::new(Duration::from_secs(1));
        assert!(!controller.pause(&task).unwrap());
        assert_eq!(lock_task(&task).status(), TaskStatus::Running);
    }
}
