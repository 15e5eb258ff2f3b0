//! Delayed and periodic task execution on a dedicated thread.
//!
//! Pending tasks live in a map keyed by `(due, sequence)`, so tasks fire
//! chronologically and tasks due at the same instant fire in the order they
//! were scheduled. The worker thread runs a current-thread Tokio runtime and
//! sleeps until the earliest due time, or until a newly scheduled task wakes
//! it up.
//!
//! Each callback runs while holding the manager-wide sync lock. A periodic
//! task is re-queued at `previous_due + period` after each run, so a thread
//! that fell behind runs every missed tick back to back before the schedule
//! moves into the future.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{SyncSender, sync_channel};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use hcisim_core::error::Result;
use hcisim_core::task::AsyncTaskId;

use crate::lock;

pub(crate) type TaskCallback = Box<dyn FnMut() + Send + 'static>;

/// Stand-in due time for delays too large to represent.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Name of the task-manager worker thread.
pub const THREAD_NAME: &str = "hcisim-task-manager";

struct Task {
    id: AsyncTaskId,
    period: Option<Duration>,
    callback: TaskCallback,
}

/// The task currently running on the worker thread.
struct Executing {
    id: AsyncTaskId,
    periodic: bool,
    cancelled: bool,
    /// Cancellers blocked until the callback returns.
    waiters: Vec<SyncSender<()>>,
}

#[derive(Default)]
struct Queue {
    pending: BTreeMap<(Instant, u64), Task>,
    index: HashMap<AsyncTaskId, (Instant, u64)>,
    executing: Option<Executing>,
    next_seq: u64,
}

impl Queue {
    fn insert(&mut self, due: Instant, task: Task) {
        let key = (due, self.next_seq);
        self.next_seq += 1;
        self.index.insert(task.id, key);
        self.pending.insert(key, task);
    }

    fn pop_due(&mut self, now: Instant) -> Option<(Instant, Task)> {
        let (&(due, seq), _) = self.pending.first_key_value()?;
        if due > now {
            return None;
        }
        let task = self.pending.remove(&(due, seq))?;
        self.index.remove(&task.id);
        Some((due, task))
    }

    fn next_due(&self) -> Option<Instant> {
        self.pending.first_key_value().map(|(&(due, _), _)| due)
    }
}

struct Shared {
    queue: Mutex<Queue>,
    wakeup: Notify,
    sync_lock: Arc<Mutex<()>>,
    shutdown: CancellationToken,
}

pub(crate) struct TaskManager {
    shared: Arc<Shared>,
    next_id: AtomicU64,
    thread_id: ThreadId,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl TaskManager {
    pub(crate) fn start(sync_lock: Arc<Mutex<()>>) -> Result<TaskManager> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            wakeup: Notify::new(),
            sync_lock,
            shutdown: CancellationToken::new(),
        });

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        let worker = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || runtime.block_on(run(worker)))?;

        Ok(TaskManager {
            shared,
            next_id: AtomicU64::new(1),
            thread_id: thread.thread().id(),
            thread: Mutex::new(Some(thread)),
        })
    }

    pub(crate) fn schedule(
        &self,
        delay: Duration,
        period: Option<Duration>,
        callback: TaskCallback,
    ) -> AsyncTaskId {
        if self.shared.shutdown.is_cancelled() {
            warn!("task scheduled after shutdown; dropping it");
            return AsyncTaskId::INVALID;
        }
        let id = AsyncTaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let now = Instant::now();
        let due = now.checked_add(delay).unwrap_or(now + FAR_FUTURE);
        lock(&self.shared.queue).insert(
            due,
            Task {
                id,
                period,
                callback,
            },
        );
        trace!(task_id = %id, delay_ms = delay.as_millis() as u64, "task scheduled");
        self.shared.wakeup.notify_one();
        id
    }

    pub(crate) fn cancel(&self, id: AsyncTaskId) -> bool {
        let ack = {
            let mut queue = lock(&self.shared.queue);
            if let Some(key) = queue.index.remove(&id) {
                queue.pending.remove(&key);
                debug!(task_id = %id, "pending task cancelled");
                return true;
            }
            let on_worker = thread::current().id() == self.thread_id;
            match queue.executing.as_mut() {
                Some(running) if running.id == id => {
                    running.cancelled = true;
                    let prevented = running.periodic;
                    if on_worker {
                        return prevented;
                    }
                    let (tx, rx) = sync_channel(1);
                    running.waiters.push(tx);
                    (rx, prevented)
                }
                _ => return false,
            }
        };

        let (rx, prevented) = ack;
        // Sender is dropped without a message if the worker goes away.
        let _ = rx.recv();
        debug!(task_id = %id, "running task cancelled");
        prevented
    }

    /// Stop the worker thread and drop every pending task.
    pub(crate) fn shutdown(&self) {
        self.shared.shutdown.cancel();
        let handle = lock(&self.thread).take();
        if let Some(handle) = handle {
            if thread::current().id() != self.thread_id && handle.join().is_err() {
                warn!("task-manager thread panicked");
            }
        }
        // Dropped outside the queue lock: callbacks may own handles whose
        // destructors schedule or cancel tasks.
        let dropped = {
            let mut queue = lock(&self.shared.queue);
            queue.index.clear();
            std::mem::take(&mut queue.pending)
        };
        drop(dropped);
    }
}

async fn run(shared: Arc<Shared>) {
    debug!("task manager started");
    loop {
        let next_due = run_due_tasks(&shared);
        let sleep = async {
            match next_due {
                Some(due) => tokio::time::sleep_until(tokio::time::Instant::from_std(due)).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => break,
            _ = shared.wakeup.notified() => {}
            _ = sleep => {}
        }
    }
    debug!("task manager stopped");
}

/// Run every task that is due, one at a time. Returns the next due time.
fn run_due_tasks(shared: &Shared) -> Option<Instant> {
    loop {
        if shared.shutdown.is_cancelled() {
            return None;
        }
        let _sync = lock(&shared.sync_lock);
        let (due, mut task) = {
            let mut queue = lock(&shared.queue);
            match queue.pop_due(Instant::now()) {
                Some(entry) => {
                    queue.executing = Some(Executing {
                        id: entry.1.id,
                        periodic: entry.1.period.is_some(),
                        cancelled: false,
                        waiters: Vec::new(),
                    });
                    entry
                }
                None => return queue.next_due(),
            }
        };

        trace!(task_id = %task.id, "running task");
        (task.callback)();

        let mut queue = lock(&shared.queue);
        let running = queue.executing.take();
        let cancelled = running.as_ref().is_some_and(|r| r.cancelled);
        if let Some(period) = task.period {
            if !cancelled {
                queue.insert(due + period, task);
            }
        }
        drop(queue);
        for waiter in running.into_iter().flat_map(|r| r.waiters) {
            let _ = waiter.send(());
        }
    }
}
