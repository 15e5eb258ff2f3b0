//! Readability watching for raw file descriptors on a dedicated thread.
//!
//! The worker thread drives a current-thread Tokio runtime whose reactor
//! polls every watched descriptor. Each watch is one spawned task looping on
//! `AsyncFd::readable()`; the user callback runs once per readiness
//! notification while holding the manager-wide sync lock.
//!
//! Readiness from the reactor is edge-triggered. After each callback the
//! descriptor is polled without blocking, and readiness is only cleared when
//! nothing is left to read, so a callback that consumes one frame out of
//! several buffered ones is simply called again.
//!
//! The watcher registers a duplicate of the caller's descriptor. The reactor
//! registration therefore stays valid until the watch ends, even if the
//! caller closes and reuses its descriptor number in the meantime.

use std::collections::HashMap;
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use hcisim_core::error::{Error, Result};

use crate::lock;

pub(crate) type ReadCallback = Box<dyn FnMut(RawFd) + Send + 'static>;

/// Name of the FD-watcher worker thread.
pub const THREAD_NAME: &str = "hcisim-fd-watcher";

struct Watch {
    generation: u64,
    token: CancellationToken,
    /// Held for the duration of each callback invocation.
    in_callback: Arc<Mutex<()>>,
}

#[derive(Default)]
struct Registry {
    watches: HashMap<RawFd, Watch>,
    next_generation: u64,
}

pub(crate) struct FdWatcher {
    handle: Handle,
    registry: Arc<Mutex<Registry>>,
    sync_lock: Arc<Mutex<()>>,
    shutdown: CancellationToken,
    thread_id: ThreadId,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl FdWatcher {
    pub(crate) fn start(sync_lock: Arc<Mutex<()>>) -> Result<FdWatcher> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()?;
        let handle = runtime.handle().clone();
        let shutdown = CancellationToken::new();

        let stop = shutdown.clone();
        let thread = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || {
                debug!("fd watcher started");
                runtime.block_on(stop.cancelled());
                // Dropping the runtime drops every watch task.
                drop(runtime);
                debug!("fd watcher stopped");
            })?;

        Ok(FdWatcher {
            handle,
            registry: Arc::new(Mutex::new(Registry::default())),
            sync_lock,
            shutdown,
            thread_id: thread.thread().id(),
            thread: Mutex::new(Some(thread)),
        })
    }

    pub(crate) fn watch(&self, fd: RawFd, callback: ReadCallback) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::Shutdown);
        }

        let mut registry = lock(&self.registry);
        if registry.watches.contains_key(&fd) {
            return Err(Error::Watch(format!("fd {fd} is already watched")));
        }

        let watched = duplicate(fd)
            .map_err(|e| Error::Watch(format!("fd {fd} cannot be duplicated: {e}")))?;
        let async_fd = {
            let _runtime = self.handle.enter();
            AsyncFd::with_interest(watched, Interest::READABLE)
                .map_err(|e| Error::Watch(format!("fd {fd} cannot be polled: {e}")))?
        };

        let generation = registry.next_generation;
        registry.next_generation += 1;
        let token = self.shutdown.child_token();
        let in_callback = Arc::new(Mutex::new(()));
        registry.watches.insert(
            fd,
            Watch {
                generation,
                token: token.clone(),
                in_callback: Arc::clone(&in_callback),
            },
        );
        drop(registry);

        self.handle.spawn(watch_loop(WatchTask {
            fd,
            generation,
            async_fd,
            token,
            in_callback,
            sync_lock: Arc::clone(&self.sync_lock),
            registry: Arc::clone(&self.registry),
            callback,
        }));
        debug!(fd, "watching fd");
        Ok(())
    }

    pub(crate) fn stop_watching(&self, fd: RawFd) {
        let removed = lock(&self.registry).watches.remove(&fd);
        let Some(watch) = removed else {
            return;
        };
        watch.token.cancel();
        // On the worker thread no other callback can be running, and waiting
        // on our own callback would deadlock.
        if thread::current().id() != self.thread_id {
            drop(lock(&watch.in_callback));
        }
        debug!(fd, "stopped watching fd");
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.cancel();
        lock(&self.registry).watches.clear();
        let handle = lock(&self.thread).take();
        if let Some(handle) = handle {
            if thread::current().id() != self.thread_id && handle.join().is_err() {
                warn!("fd-watcher thread panicked");
            }
        }
    }
}

/// Our own reference to a watched descriptor.
struct WatchedFd(OwnedFd);

impl AsRawFd for WatchedFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

fn duplicate(fd: RawFd) -> std::io::Result<WatchedFd> {
    if fd < 0 {
        return Err(std::io::Error::from_raw_os_error(libc::EBADF));
    }
    // SAFETY: the borrow only lives for the `dup` call; an fd that is not
    // open makes `try_clone_to_owned` fail with EBADF.
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    Ok(WatchedFd(borrowed.try_clone_to_owned()?))
}

/// Whether `fd` has input (or a hangup) waiting right now.
fn has_pending_input(fd: RawFd) -> bool {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: `pfd` is a valid pollfd for the duration of the call and the
    // timeout of zero never blocks.
    let ready = unsafe { libc::poll(&mut pfd, 1, 0) };
    ready > 0 && pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0
}

struct WatchTask {
    fd: RawFd,
    generation: u64,
    async_fd: AsyncFd<WatchedFd>,
    token: CancellationToken,
    in_callback: Arc<Mutex<()>>,
    sync_lock: Arc<Mutex<()>>,
    registry: Arc<Mutex<Registry>>,
    callback: ReadCallback,
}

async fn watch_loop(mut task: WatchTask) {
    let fd = task.fd;
    loop {
        let mut guard = tokio::select! {
            biased;
            _ = task.token.cancelled() => break,
            ready = task.async_fd.readable() => match ready {
                Ok(guard) => guard,
                Err(e) => {
                    warn!(fd, error = %e, "readiness polling failed; dropping watch");
                    let mut registry = lock(&task.registry);
                    if registry.watches.get(&fd).is_some_and(|w| w.generation == task.generation) {
                        registry.watches.remove(&fd);
                    }
                    break;
                }
            },
        };

        {
            let _sync = lock(&task.sync_lock);
            let _busy = lock(&task.in_callback);
            if task.token.is_cancelled() {
                break;
            }
            (task.callback)(fd);
        }

        if task.token.is_cancelled() {
            break;
        }
        if has_pending_input(guard.get_inner().as_raw_fd()) {
            drop(guard);
            tokio::task::yield_now().await;
        } else {
            guard.clear_ready();
        }
    }
}
