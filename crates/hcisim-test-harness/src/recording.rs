//! An [`EventChannel`] that records instead of writing to a socket.
//!
//! Controller unit tests hand a [`RecordingChannel`] to the controller and
//! inspect the events it produced, together with the delay each one was
//! posted with. Nothing is ever delivered; the recorded delay is what a
//! real transport would have waited.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use hcisim_core::channel::EventChannel;
use hcisim_core::event::EventPacket;
use hcisim_core::opcode::OpCode;
use hcisim_core::task::AsyncTaskId;

/// One posted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub event: EventPacket,
    /// `Duration::ZERO` for [`EventChannel::post_event`].
    pub delay: Duration,
    pub id: AsyncTaskId,
}

/// Records every posted event in order.
#[derive(Debug)]
pub struct RecordingChannel {
    events: Mutex<Vec<RecordedEvent>>,
    next_id: AtomicU64,
}

impl RecordingChannel {
    pub fn new() -> Self {
        RecordingChannel {
            events: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// A snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.lock().clone()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<RecordedEvent> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn last(&self) -> Option<RecordedEvent> {
        self.lock().last().cloned()
    }

    /// Events that complete or acknowledge `opcode`.
    pub fn responses_to(&self, opcode: OpCode) -> Vec<RecordedEvent> {
        self.lock()
            .iter()
            .filter(|r| r.event.command_opcode() == Some(opcode))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RecordedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: EventPacket, delay: Duration) -> AsyncTaskId {
        let id = AsyncTaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(RecordedEvent { event, delay, id });
        id
    }
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl EventChannel for RecordingChannel {
    fn post_event(&self, event: EventPacket) -> AsyncTaskId {
        self.record(event, Duration::ZERO)
    }

    fn post_delayed_event(&self, event: EventPacket, delay: Duration) -> AsyncTaskId {
        self.record(event, delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcisim_core::opcode;

    #[test]
    fn records_in_order_with_delays() {
        let channel = RecordingChannel::new();
        let a = channel.post_event(EventPacket::command_complete_only_status(opcode::RESET, 0));
        let b = channel.post_delayed_event(
            EventPacket::inquiry_complete(0),
            Duration::from_millis(1280),
        );
        assert!(a.is_valid() && b.is_valid());
        assert_ne!(a, b);

        let events = channel.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].delay, Duration::ZERO);
        assert_eq!(events[1].delay, Duration::from_millis(1280));
        assert_eq!(channel.responses_to(opcode::RESET).len(), 1);
    }

    #[test]
    fn take_drains() {
        let channel = RecordingChannel::new();
        channel.post_event(EventPacket::inquiry_complete(0));
        assert_eq!(channel.take().len(), 1);
        assert!(channel.is_empty());
        assert!(channel.last().is_none());
    }
}
