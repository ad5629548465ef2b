// src/engine/snapshot.rs

use chrono::{DateTime, Local, TimeDelta};

use crate::dag::task::Task;
use crate::types::{EpisodeId, StageKind, TaskKey, TaskStatus};

/// Point-in-time view of one task for status displays.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub episode: EpisodeId,
    pub stage: StageKind,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Local>>,
    pub ended_at: Option<DateTime<Local>>,
    pub elapsed: Option<TimeDelta>,
    pub exit_code: Option<i32>,
    pub last_error: Option<String>,
}

impl TaskSnapshot {
    pub fn capture(task: &Task, now: DateTime<Local>) -> Self {
        let key = task.key();
        Self {
            episode: key.episode,
            stage: key.stage,
            status: task.status(),
            started_at: task.started_at(),
            ended_at: task.ended_at(),
            elapsed: task.elapsed(now),
            exit_code: task.exit_code(),
            last_error: task.last_error().map(str::to_string),
        }
    }

    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.episode, self.stage)
    }

    /// `-` before the first start, `Running` while active, else `H:MM:SS`.
    pub fn duration_label(&self) -> String {
        if self.status.is_active() {
            return "Running".to_string();
        }
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => format_hms(end - start),
            _ => "-".to_string(),
        }
    }
}

pub fn format_hms(delta: TimeDelta) -> String {
    let secs = delta.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
