//! The [`AsyncManager`] facade.

use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use hcisim_core::error::Result;
use hcisim_core::task::AsyncTaskId;

use crate::fd_watcher::FdWatcher;
use crate::lock;
use crate::task_manager::TaskManager;

/// Runs file-descriptor callbacks and scheduled tasks on two worker threads.
///
/// Every callback, whether triggered by readability or by a timer, runs
/// while holding one manager-wide lock. [`AsyncManager::synchronize`] takes
/// the same lock, so code outside the workers can touch state shared with
/// callbacks without racing them. The lock is not reentrant: calling
/// `synchronize` from inside a callback deadlocks.
///
/// # Example
///
/// ```
/// use std::sync::mpsc;
/// use std::time::Duration;
/// use hcisim_async::AsyncManager;
///
/// let manager = AsyncManager::new().unwrap();
/// let (tx, rx) = mpsc::channel();
/// manager.exec_async(Duration::from_millis(5), move || tx.send(42).unwrap());
/// assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
/// ```
pub struct AsyncManager {
    sync_lock: Arc<Mutex<()>>,
    fd_watcher: FdWatcher,
    task_manager: TaskManager,
    shut_down: AtomicBool,
}

impl AsyncManager {
    /// Start the FD-watcher and task-manager threads.
    pub fn new() -> Result<AsyncManager> {
        let sync_lock = Arc::new(Mutex::new(()));
        let fd_watcher = FdWatcher::start(Arc::clone(&sync_lock))?;
        let task_manager = match TaskManager::start(Arc::clone(&sync_lock)) {
            Ok(task_manager) => task_manager,
            Err(e) => {
                fd_watcher.shutdown();
                return Err(e);
            }
        };
        debug!("async manager started");
        Ok(AsyncManager {
            sync_lock,
            fd_watcher,
            task_manager,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Call `on_read_ready` on the FD-watcher thread each time `fd` becomes
    /// readable.
    ///
    /// Fails with [`Error::Watch`](hcisim_core::Error::Watch) if `fd` is
    /// already watched or cannot be polled, and with
    /// [`Error::Shutdown`](hcisim_core::Error::Shutdown) after shutdown.
    pub fn watch_fd_for_non_blocking_reads<F>(&self, fd: RawFd, on_read_ready: F) -> Result<()>
    where
        F: FnMut(RawFd) + Send + 'static,
    {
        self.fd_watcher.watch(fd, Box::new(on_read_ready))
    }

    /// Stop watching `fd`. A no-op if it is not watched.
    ///
    /// Blocks until a callback for `fd` that is running on another thread
    /// has returned. From inside that callback it only unregisters.
    pub fn stop_watching_file_descriptor(&self, fd: RawFd) {
        self.fd_watcher.stop_watching(fd);
    }

    /// Run `callback` once on the task-manager thread after `delay`.
    ///
    /// A zero delay runs the task as soon as possible, after tasks already
    /// due. Returns [`AsyncTaskId::INVALID`] after shutdown.
    pub fn exec_async<F>(&self, delay: Duration, callback: F) -> AsyncTaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let mut callback = Some(callback);
        self.task_manager.schedule(
            delay,
            None,
            Box::new(move || {
                if let Some(callback) = callback.take() {
                    callback();
                }
            }),
        )
    }

    /// Run `callback` after `delay`, then every `period` after that.
    ///
    /// Each run is due one `period` after the previous run was due. If the
    /// task thread falls behind, every missed run happens back to back.
    /// A zero `period` is rejected with [`AsyncTaskId::INVALID`].
    pub fn exec_async_periodically<F>(
        &self,
        delay: Duration,
        period: Duration,
        callback: F,
    ) -> AsyncTaskId
    where
        F: FnMut() + Send + 'static,
    {
        if period.is_zero() {
            warn!("periodic task with zero period rejected");
            return AsyncTaskId::INVALID;
        }
        self.task_manager
            .schedule(delay, Some(period), Box::new(callback))
    }

    /// Cancel a scheduled task.
    ///
    /// Returns `true` if this prevented at least one future run. If the task
    /// is running on another thread, waits for it to return first, so nothing
    /// the callback touches is in use once this returns. Unknown ids and
    /// one-shot tasks that already ran return `false`.
    pub fn cancel_async_task(&self, id: AsyncTaskId) -> bool {
        if !id.is_valid() {
            return false;
        }
        self.task_manager.cancel(id)
    }

    /// Run `critical` while no callback is running.
    pub fn synchronize<R>(&self, critical: impl FnOnce() -> R) -> R {
        let _guard = lock(&self.sync_lock);
        critical()
    }

    /// Stop both worker threads and drop every pending task and watch.
    ///
    /// Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.fd_watcher.shutdown();
        self.task_manager.shutdown();
        debug!("async manager shut down");
    }
}

impl Drop for AsyncManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AsyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncManager")
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    use hcisim_core::Error;

    use crate::thread_names;

    const WAIT: Duration = Duration::from_secs(5);

    // -----------------------------------------------------------------------
    // Task manager
    // -----------------------------------------------------------------------

    #[test]
    fn exec_async_runs_on_task_thread() {
        let manager = AsyncManager::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let id = manager.exec_async(Duration::ZERO, move || {
            tx.send(thread::current().name().map(str::to_owned)).unwrap();
        });
        assert!(id.is_valid());
        let name = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(name.as_deref(), Some(thread_names::TASK_MANAGER));
    }

    #[test]
    fn task_ids_are_unique_and_increasing() {
        let manager = AsyncManager::new().unwrap();
        let a = manager.exec_async(Duration::from_secs(60), || {});
        let b = manager.exec_async(Duration::from_secs(60), || {});
        let c = manager.exec_async_periodically(
            Duration::from_secs(60),
            Duration::from_secs(1),
            || {},
        );
        assert!(a.0 > 0 && a < b && b < c);
    }

    #[test]
    fn equal_due_times_fire_in_scheduling_order() {
        let manager = AsyncManager::new().unwrap();
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        // Hold the task thread so every task below is due before any runs.
        manager.exec_async(Duration::ZERO, move || {
            let _ = gate_rx.recv_timeout(WAIT);
        });
        let (tx, rx) = mpsc::channel();
        for i in 0..100 {
            let tx = tx.clone();
            manager.exec_async(Duration::ZERO, move || tx.send(i).unwrap());
        }
        gate_tx.send(()).unwrap();
        let order: Vec<i32> = (0..100).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        assert_eq!(order, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn different_due_times_fire_chronologically() {
        let manager = AsyncManager::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let late = tx.clone();
        manager.exec_async(Duration::from_millis(60), move || late.send("late").unwrap());
        manager.exec_async(Duration::from_millis(10), move || tx.send("early").unwrap());
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "early");
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "late");
    }

    #[test]
    fn delay_is_honored() {
        let manager = AsyncManager::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let start = Instant::now();
        manager.exec_async(Duration::from_millis(50), move || tx.send(Instant::now()).unwrap());
        let fired = rx.recv_timeout(WAIT).unwrap();
        assert!(fired.duration_since(start) >= Duration::from_millis(50));
    }

    #[test]
    fn cancel_pending_task_prevents_run() {
        let manager = AsyncManager::new().unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let id = manager.exec_async(Duration::from_millis(50), move || {
            flag.store(true, Ordering::SeqCst);
        });
        assert!(manager.cancel_async_task(id));
        assert!(!manager.cancel_async_task(id));
        thread::sleep(Duration::from_millis(120));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn cancel_unknown_or_fired_task_returns_false() {
        let manager = AsyncManager::new().unwrap();
        assert!(!manager.cancel_async_task(AsyncTaskId::INVALID));
        assert!(!manager.cancel_async_task(AsyncTaskId(9999)));

        let (tx, rx) = mpsc::channel();
        let id = manager.exec_async(Duration::ZERO, move || tx.send(()).unwrap());
        rx.recv_timeout(WAIT).unwrap();
        // Give the worker a moment to finish bookkeeping after the send.
        thread::sleep(Duration::from_millis(20));
        assert!(!manager.cancel_async_task(id));
    }

    #[test]
    fn cancelled_tasks_never_run_under_contention() {
        const N: usize = 64;
        const M: usize = 24;

        let manager = Arc::new(AsyncManager::new().unwrap());
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        manager.exec_async(Duration::ZERO, move || {
            let _ = gate_rx.recv_timeout(WAIT);
        });

        let runs: Arc<Vec<AtomicUsize>> = Arc::new((0..N).map(|_| AtomicUsize::new(0)).collect());
        let ids: Vec<AsyncTaskId> = (0..N)
            .map(|i| {
                let manager = Arc::clone(&manager);
                let runs = Arc::clone(&runs);
                thread::spawn(move || {
                    manager.exec_async(Duration::ZERO, move || {
                        runs[i].fetch_add(1, Ordering::SeqCst);
                    })
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();

        let cancellers: Vec<_> = ids[..M]
            .iter()
            .map(|&id| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || manager.cancel_async_task(id))
            })
            .collect();
        for c in cancellers {
            assert!(c.join().unwrap());
        }

        gate_tx.send(()).unwrap();
        let (done_tx, done_rx) = mpsc::channel();
        manager.exec_async(Duration::ZERO, move || done_tx.send(()).unwrap());
        done_rx.recv_timeout(WAIT).unwrap();

        let total: usize = runs.iter().map(|r| r.load(Ordering::SeqCst)).sum();
        assert_eq!(total, N - M);
        for r in &runs[..M] {
            assert_eq!(r.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn racing_cancel_true_means_no_run_after_return() {
        let manager = AsyncManager::new().unwrap();
        let mut prevented = 0;
        let counters: Vec<Arc<AtomicUsize>> =
            (0..200).map(|_| Arc::new(AtomicUsize::new(0))).collect();
        for counter in &counters {
            let c = Arc::clone(counter);
            let id = manager.exec_async(Duration::ZERO, move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
            if manager.cancel_async_task(id) {
                prevented += 1;
                assert_eq!(counter.load(Ordering::SeqCst), 0);
            }
        }
        let (tx, rx) = mpsc::channel();
        manager.exec_async(Duration::ZERO, move || tx.send(()).unwrap());
        rx.recv_timeout(WAIT).unwrap();
        let total: usize = counters.iter().map(|c| c.load(Ordering::SeqCst)).sum();
        assert_eq!(total, counters.len() - prevented);
    }

    #[test]
    fn cancel_waits_for_running_callback() {
        let manager = AsyncManager::new().unwrap();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let (started_tx, started_rx) = mpsc::channel();
        let id = manager.exec_async_periodically(Duration::ZERO, Duration::from_secs(60), move || {
            let _ = started_tx.send(());
            thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::SeqCst);
        });
        started_rx.recv_timeout(WAIT).unwrap();
        assert!(manager.cancel_async_task(id));
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn cancel_running_one_shot_waits_and_returns_false() {
        let manager = AsyncManager::new().unwrap();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let (started_tx, started_rx) = mpsc::channel();
        let id = manager.exec_async(Duration::ZERO, move || {
            started_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::SeqCst);
        });
        started_rx.recv_timeout(WAIT).unwrap();
        assert!(!manager.cancel_async_task(id));
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn periodic_task_cancels_itself_without_blocking() {
        let manager = Arc::new(AsyncManager::new().unwrap());
        let runs = Arc::new(AtomicUsize::new(0));
        let (id_tx, id_rx) = mpsc::channel::<AsyncTaskId>();
        let (result_tx, result_rx) = mpsc::channel();

        let weak = Arc::downgrade(&manager);
        let count = Arc::clone(&runs);
        let id = manager.exec_async_periodically(
            Duration::from_millis(20),
            Duration::from_millis(5),
            move || {
                let n = count.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 3 {
                    let id = id_rx.recv_timeout(WAIT).unwrap();
                    let manager = weak.upgrade().unwrap();
                    result_tx.send(manager.cancel_async_task(id)).unwrap();
                }
            },
        );
        id_tx.send(id).unwrap();

        assert!(result_rx.recv_timeout(WAIT).unwrap());
        thread::sleep(Duration::from_millis(60));
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn periodic_catches_up_every_missed_tick() {
        const PERIOD: Duration = Duration::from_millis(20);
        const MISSED: u32 = 5;

        let manager = AsyncManager::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let id = manager.exec_async_periodically(Duration::ZERO, PERIOD, move || {
            let _ = tx.send(Instant::now());
        });
        let first = rx.recv_timeout(WAIT).unwrap();

        // A stall of MISSED + 1 periods covers at least MISSED + 1 deadlines
        // wherever it starts relative to the tick phase.
        let (stall_tx, stall_rx) = mpsc::channel();
        manager.exec_async(Duration::ZERO, move || {
            thread::sleep(PERIOD * (MISSED + 1) + Duration::from_millis(10));
            stall_tx.send(Instant::now()).unwrap();
        });
        let stall_end = stall_rx.recv_timeout(WAIT).unwrap();
        assert!(stall_end >= first);

        // Count runs landing right after the stall, up to the first regular tick.
        let mut catch_up = 0;
        loop {
            let t = rx.recv_timeout(WAIT).unwrap();
            if t >= stall_end + PERIOD / 2 {
                break;
            }
            if t >= stall_end {
                catch_up += 1;
            }
        }
        assert!(manager.cancel_async_task(id));
        assert!(catch_up >= MISSED as usize, "only {catch_up} catch-up runs");
    }

    #[test]
    fn zero_period_is_rejected() {
        let manager = AsyncManager::new().unwrap();
        let id = manager.exec_async_periodically(Duration::ZERO, Duration::ZERO, || {});
        assert_eq!(id, AsyncTaskId::INVALID);
    }

    #[test]
    fn synchronize_excludes_callbacks() {
        let manager = AsyncManager::new().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let id = manager.exec_async_periodically(Duration::ZERO, Duration::from_millis(1), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(20));
        let (before, after) = manager.synchronize(|| {
            let before = counter.load(Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            (before, counter.load(Ordering::SeqCst))
        });
        assert_eq!(before, after);
        assert!(manager.cancel_async_task(id));
    }

    // -----------------------------------------------------------------------
    // FD watcher
    // -----------------------------------------------------------------------

    fn reader(
        stream: &UnixStream,
        tx: mpsc::Sender<(Vec<u8>, Option<String>)>,
    ) -> impl FnMut(RawFd) + Send + 'static {
        let mut stream = stream.try_clone().unwrap();
        move |_fd| {
            let mut buf = [0u8; 1];
            if let Ok(n) = stream.read(&mut buf) {
                let name = thread::current().name().map(str::to_owned);
                let _ = tx.send((buf[..n].to_vec(), name));
            }
        }
    }

    #[test]
    fn watch_calls_back_on_watcher_thread() {
        let manager = AsyncManager::new().unwrap();
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let fd = ours.as_raw_fd();
        let (tx, rx) = mpsc::channel();
        manager.watch_fd_for_non_blocking_reads(fd, reader(&ours, tx)).unwrap();

        theirs.write_all(&[0x42]).unwrap();
        let (bytes, name) = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(bytes, vec![0x42]);
        assert_eq!(name.as_deref(), Some(thread_names::FD_WATCHER));
    }

    #[test]
    fn buffered_input_is_never_stranded() {
        let manager = AsyncManager::new().unwrap();
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let fd = ours.as_raw_fd();
        let (tx, rx) = mpsc::channel();
        manager.watch_fd_for_non_blocking_reads(fd, reader(&ours, tx)).unwrap();

        // One write, three one-byte reads.
        theirs.write_all(&[1, 2, 3]).unwrap();
        let got: Vec<u8> = (0..3).flat_map(|_| rx.recv_timeout(WAIT).unwrap().0).collect();
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_watch_is_an_error() {
        let manager = AsyncManager::new().unwrap();
        let (ours, _theirs) = UnixStream::pair().unwrap();
        let fd = ours.as_raw_fd();
        manager.watch_fd_for_non_blocking_reads(fd, |_| {}).unwrap();
        match manager.watch_fd_for_non_blocking_reads(fd, |_| {}) {
            Err(Error::Watch(msg)) => assert!(msg.contains("already watched")),
            other => panic!("expected Watch error, got {:?}", other),
        }
    }

    #[test]
    fn watch_of_invalid_fd_is_an_error() {
        let manager = AsyncManager::new().unwrap();
        assert!(matches!(
            manager.watch_fd_for_non_blocking_reads(-1, |_| {}),
            Err(Error::Watch(_))
        ));
    }

    #[test]
    fn stop_watching_silences_callbacks() {
        let manager = AsyncManager::new().unwrap();
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let fd = ours.as_raw_fd();
        let (tx, rx) = mpsc::channel();
        manager.watch_fd_for_non_blocking_reads(fd, reader(&ours, tx)).unwrap();
        theirs.write_all(&[1]).unwrap();
        rx.recv_timeout(WAIT).unwrap();

        manager.stop_watching_file_descriptor(fd);
        manager.stop_watching_file_descriptor(fd);
        theirs.write_all(&[2]).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn stop_watching_unknown_fd_is_noop() {
        let manager = AsyncManager::new().unwrap();
        manager.stop_watching_file_descriptor(12345);
    }

    #[test]
    fn stop_waits_for_running_callback() {
        let manager = AsyncManager::new().unwrap();
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let fd = ours.as_raw_fd();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let (started_tx, started_rx) = mpsc::channel();
        let mut stream = ours.try_clone().unwrap();
        manager
            .watch_fd_for_non_blocking_reads(fd, move |_| {
                let mut buf = [0u8; 1];
                let _ = stream.read(&mut buf);
                let _ = started_tx.send(());
                thread::sleep(Duration::from_millis(100));
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();
        theirs.write_all(&[1]).unwrap();
        started_rx.recv_timeout(WAIT).unwrap();
        manager.stop_watching_file_descriptor(fd);
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn callback_may_stop_its_own_watch() {
        let manager = Arc::new(AsyncManager::new().unwrap());
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        let fd = ours.as_raw_fd();
        let weak = Arc::downgrade(&manager);
        let (tx, rx) = mpsc::channel();
        let mut stream = ours.try_clone().unwrap();
        manager
            .watch_fd_for_non_blocking_reads(fd, move |fd| {
                let mut buf = [0u8; 8];
                let _ = stream.read(&mut buf);
                if let Some(manager) = weak.upgrade() {
                    manager.stop_watching_file_descriptor(fd);
                }
                let _ = tx.send(());
            })
            .unwrap();
        theirs.write_all(&[1]).unwrap();
        rx.recv_timeout(WAIT).unwrap();
        theirs.write_all(&[2]).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        // The fd can be watched again once released.
        manager.watch_fd_for_non_blocking_reads(fd, |_| {}).unwrap();
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    #[test]
    fn shutdown_is_idempotent_and_final() {
        let manager = AsyncManager::new().unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        manager.exec_async(Duration::from_millis(50), move || flag.store(true, Ordering::SeqCst));
        manager.shutdown();
        manager.shutdown();

        assert_eq!(manager.exec_async(Duration::ZERO, || {}), AsyncTaskId::INVALID);
        let (ours, _theirs) = UnixStream::pair().unwrap();
        assert!(matches!(
            manager.watch_fd_for_non_blocking_reads(ours.as_raw_fd(), |_| {}),
            Err(Error::Shutdown)
        ));
        thread::sleep(Duration::from_millis(100));
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(manager.synchronize(|| 7), 7);
    }
}
