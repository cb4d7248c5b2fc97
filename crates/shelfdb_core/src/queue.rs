//! Ordered, single-consumer asynchronous action queue.
//!
//! Tasks run one at a time on a dedicated worker thread, strictly in the
//! order they were enqueued. Enqueueing never waits for the work itself.
//!
//! # Usage
//!
//! ```rust
//! use shelfdb_core::{ActionQueue, TaskStatus};
//!
//! let queue = ActionQueue::start("example").unwrap();
//! let handle = queue.enqueue(|| Ok(())).unwrap();
//! assert!(matches!(handle.wait(), TaskStatus::Succeeded));
//! queue.stop();
//! ```

use crate::error::{CoreError, CoreResult};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

type Task = Box<dyn FnOnce() -> CoreResult<()> + Send + 'static>;

/// Outcome of a queued task.
#[derive(Debug, Clone)]
pub enum TaskStatus {
    /// The task has not finished yet.
    Pending,
    /// The task ran and returned `Ok`.
    Succeeded,
    /// The task returned an error or panicked.
    Failed(Arc<CoreError>),
}

impl TaskStatus {
    /// Returns true unless the task is still pending.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns the error of a failed task.
    #[must_use]
    pub fn error(&self) -> Option<&CoreError> {
        match self {
            Self::Failed(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct TaskCell {
    status: Mutex<TaskStatus>,
    done: Condvar,
}

/// Completion handle of one queued task.
///
/// Handles are cheap to clone; every clone observes the same outcome.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    cell: Arc<TaskCell>,
}

impl TaskHandle {
    fn new() -> Self {
        Self {
            cell: Arc::new(TaskCell {
                status: Mutex::new(TaskStatus::Pending),
                done: Condvar::new(),
            }),
        }
    }

    fn complete(&self, status: TaskStatus) {
        *self.cell.status.lock() = status;
        self.cell.done.notify_all();
    }

    /// Returns the current status without waiting.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.cell.status.lock().clone()
    }

    /// Returns true once the task has run.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cell.status.lock().is_finished()
    }

    /// Blocks until the task has run and returns its outcome.
    pub fn wait(&self) -> TaskStatus {
        let mut status = self.cell.status.lock();
        while !status.is_finished() {
            self.cell.done.wait(&mut status);
        }
        status.clone()
    }

    /// Waits up to `timeout` for the task. Returns `None` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<TaskStatus> {
        let mut status = self.cell.status.lock();
        if !status.is_finished() {
            // Spurious wakeups only shorten the wait; callers poll again.
            self.cell.done.wait_for(&mut status, timeout);
        }
        status.is_finished().then(|| status.clone())
    }
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time counters of an [`ActionQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    /// Tasks accepted by `enqueue`.
    pub enqueued: u64,
    /// Tasks that returned `Ok`.
    pub succeeded: u64,
    /// Tasks that returned an error or panicked.
    pub failed: u64,
}

impl QueueStats {
    /// Returns the number of accepted tasks that have not run yet.
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.enqueued
            .saturating_sub(self.succeeded)
            .saturating_sub(self.failed)
    }
}

/// An ordered task runner with one dedicated worker thread.
///
/// # Ordering
///
/// Tasks execute in the order `enqueue` accepted them, across all
/// submitting threads. A failing task is recorded on its [`TaskHandle`]
/// and the worker moves on to the next one.
///
/// # Shutdown
///
/// [`ActionQueue::stop`] rejects further work, waits for the backlog to
/// drain and joins the worker. Dropping the queue does the same.
pub struct ActionQueue {
    name: String,
    sender: Mutex<Option<Sender<(Task, TaskHandle)>>>,
    most_recent: Mutex<Option<TaskHandle>>,
    counters: Arc<Counters>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ActionQueue {
    /// Starts a queue and its worker thread.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the worker thread cannot be spawned.
    pub fn start(name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        let (tx, rx) = mpsc::channel();
        let counters = Arc::new(Counters::default());

        let worker_name = name.clone();
        let worker_counters = Arc::clone(&counters);
        let worker = thread::Builder::new()
            .name(format!("shelfdb-queue-{name}"))
            .spawn(move || worker_loop(&worker_name, rx, &worker_counters))?;

        info!(queue = %name, "action queue started");
        Ok(Self {
            name,
            sender: Mutex::new(Some(tx)),
            most_recent: Mutex::new(None),
            counters,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Returns the queue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a task to the backlog.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::QueueClosed`] once [`ActionQueue::stop`] has
    /// been called; the task is not enqueued.
    pub fn enqueue<F>(&self, task: F) -> CoreResult<TaskHandle>
    where
        F: FnOnce() -> CoreResult<()> + Send + 'static,
    {
        let sender = self.sender.lock();
        let Some(tx) = sender.as_ref() else {
            return Err(CoreError::queue_closed(&self.name));
        };

        let handle = TaskHandle::new();
        tx.send((Box::new(task), handle.clone()))
            .map_err(|_| CoreError::queue_closed(&self.name))?;
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        *self.most_recent.lock() = Some(handle.clone());
        Ok(handle)
    }

    /// Returns the handle of the most recently enqueued task.
    ///
    /// Because tasks run in order, once this handle finishes every task
    /// enqueued before it has finished too.
    pub fn most_recent_task(&self) -> Option<TaskHandle> {
        self.most_recent.lock().clone()
    }

    /// Returns the queue counters.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Returns true once the queue no longer accepts work.
    pub fn is_stopped(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Stops accepting work, drains the backlog and joins the worker.
    ///
    /// Every caller returns only after the backlog has drained, including
    /// concurrent and repeated calls.
    pub fn stop(&self) {
        // Dropping the only sender lets the worker exit once the channel is empty.
        drop(self.sender.lock().take());

        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return;
        };
        if handle.join().is_err() {
            warn!(queue = %self.name, "action queue worker exited abnormally");
        }
        drop(worker);

        let stats = self.stats();
        info!(
            queue = %self.name,
            succeeded = stats.succeeded,
            failed = stats.failed,
            "action queue stopped"
        );
    }
}

impl Drop for ActionQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ActionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionQueue")
            .field("name", &self.name)
            .field("stopped", &self.is_stopped())
            .field("stats", &self.stats())
            .finish()
    }
}

fn worker_loop(name: &str, rx: Receiver<(Task, TaskHandle)>, counters: &Counters) {
    for (task, handle) in rx {
        let status = match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(Ok(())) => {
                counters.succeeded.fetch_add(1, Ordering::Relaxed);
                debug!(queue = %name, "task succeeded");
                TaskStatus::Succeeded
            }
            Ok(Err(err)) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(queue = %name, error = %err, "task failed");
                TaskStatus::Failed(Arc::new(err))
            }
            Err(payload) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                let message = panic_message(payload.as_ref());
                warn!(queue = %name, panic = %message, "task panicked");
                TaskStatus::Failed(Arc::new(CoreError::TaskPanicked { message }))
            }
        };
        handle.complete(status);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn runs_tasks_in_order() {
        let queue = ActionQueue::start("order").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let seen = Arc::clone(&seen);
            queue
                .enqueue(move || {
                    seen.lock().push(i);
                    Ok(())
                })
                .unwrap();
        }
        queue.stop();

        assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn failure_is_recorded_and_worker_continues() {
        let queue = ActionQueue::start("failures").unwrap();

        let failed = queue
            .enqueue(|| Err(CoreError::invalid_operation("boom")))
            .unwrap();
        let after = queue.enqueue(|| Ok(())).unwrap();

        assert!(matches!(after.wait(), TaskStatus::Succeeded));
        let status = failed.wait();
        assert!(status.error().unwrap().to_string().contains("boom"));

        let stats = queue.stats();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.pending(), 0);
    }

    #[test]
    fn panic_is_recorded_as_failure() {
        let queue = ActionQueue::start("panics").unwrap();
        let handle = queue.enqueue(|| panic!("kaboom")).unwrap();

        match handle.wait() {
            TaskStatus::Failed(err) => {
                assert!(matches!(&*err, CoreError::TaskPanicked { message } if message == "kaboom"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(matches!(queue.enqueue(|| Ok(())).unwrap().wait(), TaskStatus::Succeeded));
    }

    #[test]
    fn most_recent_task_tracks_latest_submission() {
        let queue = ActionQueue::start("recent").unwrap();
        assert!(queue.most_recent_task().is_none());

        queue.enqueue(|| Ok(())).unwrap();
        let last = queue
            .enqueue(|| Err(CoreError::invalid_operation("last")))
            .unwrap();

        let recent = queue.most_recent_task().unwrap();
        assert!(recent.wait().error().is_some());
        assert!(last.is_finished());
    }

    #[test]
    fn enqueue_after_stop_is_rejected() {
        let queue = ActionQueue::start("closed").unwrap();
        queue.stop();

        assert!(queue.is_stopped());
        let result = queue.enqueue(|| Ok(()));
        assert!(matches!(result, Err(CoreError::QueueClosed { queue }) if queue == "closed"));
        assert_eq!(queue.stats().enqueued, 0);
    }

    #[test]
    fn stop_drains_backlog() {
        let queue = ActionQueue::start("drain").unwrap();
        let (gate_tx, gate_rx) = channel::<()>();

        let blocked = queue
            .enqueue(move || {
                gate_rx.recv().ok();
                Ok(())
            })
            .unwrap();
        let behind = queue.enqueue(|| Ok(())).unwrap();
        assert!(!behind.is_finished());

        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            gate_tx.send(()).unwrap();
        });
        queue.stop();
        releaser.join().unwrap();

        assert!(blocked.is_finished());
        assert!(behind.is_finished());
    }

    #[test]
    fn stop_is_idempotent() {
        let queue = ActionQueue::start("twice").unwrap();
        queue.stop();
        queue.stop();
        assert!(queue.is_stopped());
    }

    #[test]
    fn wait_timeout_on_pending_task() {
        let queue = ActionQueue::start("timeout").unwrap();
        let (gate_tx, gate_rx) = channel::<()>();
        let handle = queue
            .enqueue(move || {
                gate_rx.recv().ok();
                Ok(())
            })
            .unwrap();

        assert!(handle.wait_timeout(Duration::from_millis(10)).is_none());
        assert!(matches!(handle.status(), TaskStatus::Pending));

        gate_tx.send(()).unwrap();
        assert!(matches!(handle.wait(), TaskStatus::Succeeded));
    }

    #[test]
    fn concurrent_submitters() {
        let queue = Arc::new(ActionQueue::start("many").unwrap());
        let count = Arc::new(AtomicU64::new(0));
        let mut handles = Vec::new();

        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            let count = Arc::clone(&count);
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    let count = Arc::clone(&count);
                    queue
                        .enqueue(move || {
                            count.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        queue.stop();

        assert_eq!(count.load(Ordering::SeqCst), 200);
        assert_eq!(queue.stats().succeeded, 200);
    }

    #[test]
    fn concurrent_stop_waits_for_drain() {
        let queue = Arc::new(ActionQueue::start("stop-race").unwrap());
        let (gate_tx, gate_rx) = channel::<()>();
        queue
            .enqueue(move || {
                gate_rx.recv().ok();
                Ok(())
            })
            .unwrap();
        let behind = queue.enqueue(|| Ok(())).unwrap();

        let stoppers: Vec<_> = (0..2)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let behind = behind.clone();
                thread::spawn(move || {
                    queue.stop();
                    behind.is_finished()
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        gate_tx.send(()).unwrap();
        for stopper in stoppers {
            assert!(stopper.join().unwrap());
        }
    }
}
