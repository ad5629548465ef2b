use std::sync::Mutex;

use bdpipe::exec::TaskObserver;
use bdpipe::types::{TaskKey, TaskStatus};

/// Something the relay reported, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Line(TaskKey, String),
    Finished(TaskKey, TaskStatus, Option<i32>),
}

/// Observer that records every callback.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Observed> {
        self.events.lock().unwrap().clone()
    }

    /// Lines delivered for `key`, in order.
    pub fn lines_for(&self, key: TaskKey) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Observed::Line(k, line) if k == key => Some(line),
                _ => None,
            })
            .collect()
    }

    pub fn finished(&self) -> Vec<(TaskKey, TaskStatus)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Observed::Finished(k, status, _) => Some((k, status)),
                _ => None,
            })
            .collect()
    }
}

impl TaskObserver for RecordingObserver {
    fn on_output(&self, key: TaskKey, line: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Observed::Line(key, line.to_string()));
    }

    fn on_finished(&self, key: TaskKey, status: TaskStatus, exit_code: Option<i32>) {
        self.events
            .lock()
            .unwrap()
            .push(Observed::Finished(key, status, exit_code));
    }
}
