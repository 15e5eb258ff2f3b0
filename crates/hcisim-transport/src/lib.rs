//! hcisim-transport: the byte-level edges of the controller emulator.
//!
//! # Key types
//!
//! - [`HciTransport`] -- the HCI socket between host and controller
//! - [`TestChannelTransport`] -- the TCP side channel for test drivers
//! - [`packet_stream`] -- blocking frame reads and writes on any byte stream
//!
//! Both transports register their sockets with the shared
//! [`AsyncManager`](hcisim_async::AsyncManager) and deliver inbound work to the
//! task-manager thread.

pub mod hci;
pub mod packet_stream;
pub mod test_channel;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use hci::{CommandHandler, HciTransport};
pub use test_channel::{
    DEFAULT_TEST_CHANNEL_PORT, DirectiveHandler, TestChannelTransport, TestDirective,
    parse_directive,
};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
