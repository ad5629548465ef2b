// src/engine/scheduler.rs

//! Sequential run-all walk.
//!
//! Tasks are visited in project order (episode ascending, then stage
//! priority). A `pending` task whose prerequisites are completed is started
//! and polled until it settles; everything else is skipped. The walk halts on
//! the first failure.
//!
//! The walk does not lock out manual starts: starting a task by hand while a
//! walk is running is allowed, and if both race for the same task the second
//! start is refused with `InvalidTransition`.

use tracing::{debug, info, warn};

use crate::dag::task::lock_task;
use crate::engine::core::Engine;
use crate::errors::{PipelineError, Result};
use crate::types::{TaskKey, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunAllOutcome {
    /// Every task was visited; `started` were run by this walk.
    Finished { started: usize },
    /// A task failed (non-zero exit, or it could not be launched).
    Halted { task: TaskKey, exit_code: Option<i32> },
    /// A task started by the walk was stopped.
    Interrupted { task: TaskKey },
}

impl Engine {
    pub async fn run_all(&self) -> Result<RunAllOutcome> {
        let mut started = 0usize;

        for key in self.project().ordered_keys() {
            let status = self.project().status(key)?;
            if status != TaskStatus::Pending {
                debug!(task = %key, %status, "run-all: skipping");
                continue;
            }
            let missing = self.project().unmet_prerequisites(key)?;
            if !missing.is_empty() {
                debug!(task = %key, ?missing, "run-all: prerequisites not completed; skipping");
                continue;
            }

            info!(episode = key.episode, stage = %key.stage, "run-all: starting");
            match self.start(key.episode, key.stage) {
                Ok(()) => started += 1,
                Err(PipelineError::Launch { .. }) => {
                    return Ok(RunAllOutcome::Halted {
                        task: key,
                        exit_code: None,
                    });
                }
                // Someone else started it first.
                Err(PipelineError::InvalidTransition { .. }) => continue,
                Err(err) => return Err(err),
            }

            match self.wait_until_settled(key).await? {
                TaskStatus::Completed => {}
                TaskStatus::Stopped => {
                    warn!(task = %key, "run-all interrupted");
                    return Ok(RunAllOutcome::Interrupted { task: key });
                }
                status => {
                    let exit_code = lock_task(self.project().task(key)?).exit_code();
                    warn!(task = %key, %status, exit_code = ?exit_code, "run-all halted");
                    return Ok(RunAllOutcome::Halted {
                        task: key,
                        exit_code,
                    });
                }
            }
        }

        info!(started, "run-all finished");
        Ok(RunAllOutcome::Finished { started })
    }
}
