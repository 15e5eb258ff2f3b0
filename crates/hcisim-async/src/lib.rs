//! hcisim-async: the scheduling core of the hcisim controller emulator.
//!
//! [`AsyncManager`] owns exactly two worker threads:
//!
//! - `hcisim-fd-watcher` calls a registered callback whenever a watched file
//!   descriptor becomes readable
//! - `hcisim-task-manager` runs one-shot, delayed, and periodic tasks in due
//!   order, with cancellation that waits for a running callback to finish
//!
//! Callbacks from both threads are serialized by a single lock, which
//! [`AsyncManager::synchronize`] exposes to outside callers.

mod fd_watcher;
mod manager;
mod task_manager;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use hcisim_core::task::AsyncTaskId;
pub use manager::AsyncManager;

/// Names of the two worker threads, as they appear in debuggers and logs.
pub mod thread_names {
    pub use crate::fd_watcher::THREAD_NAME as FD_WATCHER;
    pub use crate::task_manager::THREAD_NAME as TASK_MANAGER;
}

/// Lock a mutex, carrying on if a panicking callback poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
