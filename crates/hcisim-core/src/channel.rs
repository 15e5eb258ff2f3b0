//! The seam between the controller and whatever delivers its events.

use std::time::Duration;

use crate::event::EventPacket;
use crate::task::AsyncTaskId;

/// Outbound event path for a controller.
///
/// The HCI transport implements this over its socket; tests substitute a
/// recording implementation. Both methods hand the event to the task
/// manager's queue rather than writing inline, so events posted while
/// handling one command keep their relative order with delayed events
/// scheduled later.
pub trait EventChannel: Send + Sync {
    /// Queue `event` for delivery as soon as possible.
    fn post_event(&self, event: EventPacket) -> AsyncTaskId;

    /// Queue `event` for delivery after `delay`.
    fn post_delayed_event(&self, event: EventPacket, delay: Duration) -> AsyncTaskId;
}
