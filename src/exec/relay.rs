// src/exec/relay.rs

//! Captured output: per-task reader tasks feeding one shared drain loop.
//!
//! Each running task gets a reader that splits its combined output into
//! lines and pushes them onto an unbounded channel, so a slow observer never
//! blocks a reader. The drain loop empties every channel on a fixed interval,
//! appends the lines to the task and forwards them to the [`TaskObserver`].
//! The drain also reaps exited processes, which is what moves a task to
//! `completed`/`failed`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::ChildStdout;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dag::task::{lock_task, SharedTask};
use crate::types::{TaskKey, TaskStatus};

/// Receives task output and completions. Called from the drain loop, never
/// while a task lock or the relay's task table is held, so an observer may
/// query the relay. It must not drain it.
pub trait TaskObserver: Send + Sync {
    fn on_output(&self, key: TaskKey, line: &str);

    fn on_finished(&self, key: TaskKey, status: TaskStatus, exit_code: Option<i32>);
}

/// Default observer: output lines go to the `bdpipe::output` target.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver;

impl TaskObserver for TracingObserver {
    fn on_output(&self, key: TaskKey, line: &str) {
        info!(target: "bdpipe::output", task = %key, "{line}");
    }

    fn on_finished(&self, key: TaskKey, status: TaskStatus, exit_code: Option<i32>) {
        match status {
            TaskStatus::Failed => warn!(
                episode = key.episode,
                stage = %key.stage,
                exit_code = ?exit_code,
                "task failed"
            ),
            _ => info!(
                episode = key.episode,
                stage = %key.stage,
                exit_code = ?exit_code,
                %status,
                "task finished"
            ),
        }
    }
}

enum Delivery {
    Line(TaskKey, String),
    Finished(TaskKey, TaskStatus, Option<i32>),
}

struct RelayEntry {
    task: SharedTask,
    rx: UnboundedReceiver<String>,
    reader: JoinHandle<()>,
    disconnected: bool,
}

pub struct OutputRelay {
    entries: Mutex<HashMap<TaskKey, RelayEntry>>,
    /// Held while a pass forwards to the observer, so concurrent passes keep
    /// each task's lines in order. `entries` is released before forwarding.
    delivery: Mutex<()>,
    observer: Arc<dyn TaskObserver>,
}

impl std::fmt::Debug for OutputRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputRelay")
            .field("tracked", &self.lock_entries().len())
            .finish_non_exhaustive()
    }
}

impl OutputRelay {
    pub fn new(observer: Arc<dyn TaskObserver>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            delivery: Mutex::new(()),
            observer,
        }
    }

    /// Start relaying `stdout` of a freshly launched task.
    pub fn attach(&self, task: &SharedTask, stdout: ChildStdout) {
        // Whatever a previous run of this task left queued is delivered first.
        self.drain_once();

        let key = lock_task(task).key();
        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_output(key, task.clone(), stdout, tx));

        let previous = self.lock_entries().insert(
            key,
            RelayEntry {
                task: task.clone(),
                rx,
                reader,
                disconnected: false,
            },
        );
        if let Some(mut previous) = previous {
            previous.reader.abort();
            let _delivering = self.lock_delivery();
            while let Ok(line) = previous.rx.try_recv() {
                lock_task(task).push_output(line.clone());
                self.observer.on_output(key, &line);
            }
        }
        debug!(task = %key, "output relay attached");
    }

    /// Stop reading the task's stream. Lines already queued are still
    /// drained.
    pub fn close(&self, key: TaskKey) {
        if let Some(entry) = self.lock_entries().get(&key) {
            entry.reader.abort();
        }
    }

    /// One drain pass over every tracked task.
    ///
    /// Queued lines are appended to the task and forwarded in order; exited
    /// processes are reaped. A task is reported finished and dropped from the
    /// relay once its stream is closed and it is no longer active.
    pub fn drain_once(&self) {
        let _delivering = self.lock_delivery();
        let mut deliveries = Vec::new();
        self.lock_entries().retain(|&key, entry| {
            loop {
                match entry.rx.try_recv() {
                    Ok(line) => {
                        lock_task(&entry.task).push_output(line.clone());
                        deliveries.push(Delivery::Line(key, line));
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        entry.disconnected = true;
                        break;
                    }
                }
            }

            let (status, exit_code) = {
                let mut t = lock_task(&entry.task);
                t.try_reap();
                (t.status(), t.exit_code())
            };

            if status.is_active() {
                return true;
            }
            if !entry.disconnected && !entry.reader.is_finished() {
                return true;
            }
            // The reader may have queued its last lines after the pass above.
            while let Ok(line) = entry.rx.try_recv() {
                lock_task(&entry.task).push_output(line.clone());
                deliveries.push(Delivery::Line(key, line));
            }
            deliveries.push(Delivery::Finished(key, status, exit_code));
            false
        });

        for delivery in deliveries {
            match delivery {
                Delivery::Line(key, line) => self.observer.on_output(key, &line),
                Delivery::Finished(key, status, exit_code) => {
                    self.observer.on_finished(key, status, exit_code)
                }
            }
        }
    }

    /// Whether any task is still being relayed.
    pub fn is_idle(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// Drain on a fixed interval until the returned handle is aborted.
    pub fn spawn_drain_loop(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let relay = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                relay.drain_once();
            }
        })
    }

    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<TaskKey, RelayEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn read_output(
    key: TaskKey,
    task: SharedTask,
    mut stdout: ChildStdout,
    tx: UnboundedSender<String>,
) {
    let mut buf = [0u8; 8192];
    let mut pending = Vec::new();

    loop {
        let n = match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                warn!(task = %key, error = %err, "reading task output failed");
                break;
            }
        };
        pending.extend_from_slice(&buf[..n]);
        for line in take_lines(&mut pending) {
            if tx.send(line).is_err() {
                return;
            }
        }
        if lock_task(&task).status() == TaskStatus::Stopped {
            break;
        }
    }

    if let Some(line) = clean_line(&pending) {
        let _ = tx.send(line);
    }
    debug!(task = %key, "output reader finished");
}

/// Remove every complete line from `pending`. Both `\n` and `\r` end a line
/// (encoders redraw progress with bare carriage returns).
fn take_lines(pending: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = pending.iter().position(|&b| b == b'\n' || b == b'\r') {
        let raw: Vec<u8> = pending.drain(..=pos).collect();
        if let Some(line) = clean_line(&raw[..pos]) {
            lines.push(line);
        }
    }
    lines
}

/// Blank lines are dropped.
fn clean_line(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end();
    (!line.trim().is_empty()).then(|| line.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::{OnceLock, Weak};

    use super::*;
    use crate::dag::task::Task;
    use crate::exec::command::CommandSpec;
    use crate::exec::process::ProcessController;
    use crate::types::StageKind;

    /// Asks the relay whether it is idle from inside every callback.
    #[derive(Default)]
    struct QueryingObserver {
        relay: OnceLock<Weak<OutputRelay>>,
        idle_seen: Mutex<Vec<bool>>,
    }

    impl QueryingObserver {
        fn query(&self) {
            if let Some(relay) = self.relay.get().and_then(Weak::upgrade) {
                self.idle_seen.lock().unwrap().push(relay.is_idle());
            }
        }
    }

    impl TaskObserver for QueryingObserver {
        fn on_output(&self, _key: TaskKey, _line: &str) {
            self.query();
        }

        fn on_finished(&self, _key: TaskKey, _status: TaskStatus, _exit_code: Option<i32>) {
            self.query();
        }
    }

    #[tokio::test]
    async fn observer_may_query_the_relay() {
        let observer = Arc::new(QueryingObserver::default());
        let relay = Arc::new(OutputRelay::new(observer.clone()));
        observer.relay.set(Arc::downgrade(&relay)).unwrap();

        let task: SharedTask = Arc::new(Mutex::new(Task::new(
            TaskKey::new(1, StageKind::Audio),
            CommandSpec::shell("echo hi"),
            Vec::new(),
            ".",
        )));
        let stdout = ProcessController::new(Duration::from_secs(1))
            .launch(&task, "echo hi".into())
            .unwrap()
            .unwrap();
        relay.attach(&task, stdout);

        tokio::time::timeout(Duration::from_secs(10), async {
            while !relay.is_idle() {
                relay.drain_once();
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(lock_task(&task).output(), &["hi".to_string()]);
        // One line plus the finish; the task is untracked by the time it is
        // reported finished.
        let seen = observer.idle_seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert!(seen[1]);
    }

    #[test]
    fn splits_on_newlines_and_carriage_returns() {
        let mut pending = b"frame 1\rframe 2\r\nencoded 2 frames\npartial".to_vec();
        let lines = take_lines(&mut pending);
        assert_eq!(lines, vec!["frame 1", "frame 2", "encoded 2 frames"]);
        assert_eq!(pending, b"partial");
    }

    #[test]
    fn blank_lines_are_dropped() {
        let mut pending = b"\n\n   \nok  \n".to_vec();
        assert_eq!(take_lines(&mut pending), vec!["ok"]);
        assert!(pending.is_empty());
        assert_eq!(clean_line(b"  "), None);
    }
}
