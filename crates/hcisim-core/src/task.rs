//! Scheduled task identifiers.

use std::fmt;

/// Opaque handle for a task scheduled on the async manager.
///
/// Ids are issued from a monotonically increasing counter and never reused,
/// so a stale id held after its task fired can never cancel an unrelated
/// task. [`AsyncTaskId::INVALID`] is reserved and never issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AsyncTaskId(pub u64);

impl AsyncTaskId {
    pub const INVALID: AsyncTaskId = AsyncTaskId(0);

    pub fn is_valid(self) -> bool {
        self != AsyncTaskId::INVALID
    }
}

impl Default for AsyncTaskId {
    fn default() -> Self {
        AsyncTaskId::INVALID
    }
}

impl fmt::Display for AsyncTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}
