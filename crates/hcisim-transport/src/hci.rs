//! The HCI transport: one stream socket between host and controller.
//!
//! [`HciTransport`] owns the controller end of a connected Unix stream
//! socket. Incoming frames are read on the FD-watcher thread and every
//! command is handed to the task manager, so the controller only ever runs
//! on the task-manager thread. Outgoing events are written from the task
//! manager too, which keeps immediate and delayed events in one ordered
//! queue.
//!
//! A framing error or hangup closes the transport for good. The host sees
//! end-of-stream and must reconnect.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hcisim_async::AsyncManager;
//! use hcisim_transport::HciTransport;
//!
//! # fn main() -> hcisim_core::Result<()> {
//! let manager = Arc::new(AsyncManager::new()?);
//! let transport = HciTransport::set_up(Arc::clone(&manager))?;
//! let host = transport.take_host_stream().expect("host end");
//! transport.register_command_handler(|cmd| println!("{}", cmd.opcode()));
//! transport.start()?;
//! # drop(host);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::net::Shutdown;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use hcisim_async::AsyncManager;
use hcisim_core::channel::EventChannel;
use hcisim_core::command::CommandPacket;
use hcisim_core::error::{Error, Result};
use hcisim_core::event::EventPacket;
use hcisim_core::packet::PacketType;
use hcisim_core::task::AsyncTaskId;

use crate::lock;
use crate::packet_stream;

/// Callback invoked on the task-manager thread for every received command.
pub type CommandHandler = Arc<dyn Fn(CommandPacket) + Send + Sync + 'static>;

/// Controller end of the HCI link.
///
/// Cloning is cheap and every clone refers to the same socket.
#[derive(Clone)]
pub struct HciTransport {
    inner: Arc<Inner>,
}

struct Inner {
    manager: Arc<AsyncManager>,
    stream: UnixStream,
    fd: RawFd,
    host: Mutex<Option<UnixStream>>,
    handler: Mutex<Option<CommandHandler>>,
    closed: AtomicBool,
    watching: AtomicBool,
}

impl HciTransport {
    /// Create a connected socket pair and keep the controller end.
    ///
    /// The host end is available once through [`take_host_stream`](Self::take_host_stream).
    pub fn set_up(manager: Arc<AsyncManager>) -> Result<HciTransport> {
        let (controller, host) = UnixStream::pair()
            .map_err(|e| Error::Transport(format!("failed to create socket pair: {}", e)))?;
        Ok(Self::build(manager, controller, Some(host)))
    }

    /// Adopt an already-connected stream, such as one accepted from a
    /// listening Unix socket.
    pub fn from_stream(manager: Arc<AsyncManager>, stream: UnixStream) -> HciTransport {
        Self::build(manager, stream, None)
    }

    fn build(
        manager: Arc<AsyncManager>,
        stream: UnixStream,
        host: Option<UnixStream>,
    ) -> HciTransport {
        let fd = stream.as_raw_fd();
        HciTransport {
            inner: Arc::new(Inner {
                manager,
                stream,
                fd,
                host: Mutex::new(host),
                handler: Mutex::new(None),
                closed: AtomicBool::new(false),
                watching: AtomicBool::new(false),
            }),
        }
    }

    /// Hand out the host end of the socket pair. Returns `None` after the
    /// first call, or when the transport was built with [`from_stream`](Self::from_stream).
    pub fn take_host_stream(&self) -> Option<UnixStream> {
        lock(&self.inner.host).take()
    }

    /// Set the function that receives every command frame.
    ///
    /// Replaces any previous handler. Commands read while no handler is set
    /// are dropped.
    pub fn register_command_handler<F>(&self, handler: F)
    where
        F: Fn(CommandPacket) + Send + Sync + 'static,
    {
        *lock(&self.inner.handler) = Some(Arc::new(handler));
    }

    /// Start reading frames from the socket.
    pub fn start(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionLost);
        }
        if self.inner.watching.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let weak = Arc::downgrade(&self.inner);
        let watched = self
            .inner
            .manager
            .watch_fd_for_non_blocking_reads(self.inner.fd, move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_readable();
                }
            });
        if let Err(e) = watched {
            self.inner.watching.store(false, Ordering::SeqCst);
            return Err(e);
        }
        info!(fd = self.inner.fd, "HCI transport started");
        Ok(())
    }

    /// Stop reading and forget the command handler.
    ///
    /// Events already queued are still written. The socket stays open.
    pub fn stop(&self) {
        self.inner.stop_watching();
        lock(&self.inner.handler).take();
        debug!(fd = self.inner.fd, "HCI transport stopped");
    }

    /// Whether the link has failed or the host hung up.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Queue `event` for writing as soon as the task manager gets to it.
    pub fn post_event_response(&self, event: EventPacket) -> AsyncTaskId {
        self.post_delayed_event_response(event, Duration::ZERO)
    }

    /// Queue `event` for writing after `delay`.
    pub fn post_delayed_event_response(&self, event: EventPacket, delay: Duration) -> AsyncTaskId {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.manager.exec_async(delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.write_event(&event);
            }
        })
    }

    /// Write `event` on the calling thread.
    pub fn send_event(&self, event: &EventPacket) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionLost);
        }
        packet_stream::send_event(event, &mut &self.inner.stream)
    }
}

impl EventChannel for HciTransport {
    fn post_event(&self, event: EventPacket) -> AsyncTaskId {
        self.post_event_response(event)
    }

    fn post_delayed_event(&self, event: EventPacket, delay: Duration) -> AsyncTaskId {
        self.post_delayed_event_response(event, delay)
    }
}

impl fmt::Debug for HciTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HciTransport")
            .field("fd", &self.inner.fd)
            .field("closed", &self.is_closed())
            .field("watching", &self.inner.watching.load(Ordering::SeqCst))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Socket side
// ---------------------------------------------------------------------------

impl Inner {
    /// Read exactly one frame. Runs on the FD-watcher thread.
    fn on_readable(self: &Arc<Self>) {
        let mut reader = &self.stream;
        let result = packet_stream::receive_packet_type(&mut reader).and_then(|packet_type| {
            match packet_type {
                PacketType::Command => {
                    let command = packet_stream::receive_command(&mut reader)?;
                    self.dispatch(command);
                    Ok(())
                }
                PacketType::Acl | PacketType::Sco => {
                    let dropped = packet_stream::skip_data_packet(&mut reader, packet_type)?;
                    warn!(
                        ?packet_type,
                        octets = dropped,
                        "data packets are not supported; dropped"
                    );
                    Ok(())
                }
                PacketType::Event => Err(Error::InvalidPacketType(u8::from(packet_type))),
            }
        });

        match result {
            Ok(()) => {}
            Err(Error::ConnectionLost) => {
                info!(fd = self.fd, "host closed the HCI connection");
                self.close();
            }
            Err(e) => {
                error!(fd = self.fd, error = %e, "HCI stream desynchronized; closing");
                self.close();
            }
        }
    }

    fn dispatch(&self, command: CommandPacket) {
        let handler = lock(&self.handler).clone();
        let Some(handler) = handler else {
            debug!(opcode = %command.opcode(), "no command handler; dropping command");
            return;
        };
        trace!(opcode = %command.opcode(), "queueing command");
        self.manager
            .exec_async(Duration::ZERO, move || handler(command));
    }

    /// Write one event. Runs on the task-manager thread.
    fn write_event(&self, event: &EventPacket) {
        if self.closed.load(Ordering::SeqCst) {
            debug!(event_code = event.event_code(), "transport closed; dropping event");
            return;
        }
        if let Err(e) = packet_stream::send_event(event, &mut &self.stream) {
            warn!(fd = self.fd, error = %e, "failed to write event; closing");
            self.close();
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_watching();
        // Wake the host with end-of-stream.
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    fn stop_watching(&self) {
        if self.watching.swap(false, Ordering::SeqCst) {
            self.manager.stop_watching_file_descriptor(self.fd);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.stop_watching();
    }
}
