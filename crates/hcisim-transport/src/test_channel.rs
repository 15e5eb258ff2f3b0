//! Out-of-band TCP control channel for driving the emulator from tests.
//!
//! A test driver connects to the listener and writes one directive per line:
//!
//! ```text
//! NAME|arg1|arg2
//! ```
//!
//! Each parsed directive is handed to the registered handler on the
//! task-manager thread, the same thread that runs HCI commands, so a
//! directive never races a command. One driver is served at a time; when it
//! disconnects the listener accepts the next one.

use std::fmt;
use std::io::{ErrorKind, Read};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use hcisim_async::AsyncManager;
use hcisim_core::error::{Error, Result};

use crate::lock;

/// Port the test channel listens on unless told otherwise.
pub const DEFAULT_TEST_CHANNEL_PORT: u16 = 6111;

/// A line longer than this without a newline is discarded.
const MAX_LINE_OCTETS: usize = 4096;

/// Callback invoked on the task-manager thread with a directive's name and
/// arguments.
pub type DirectiveHandler = Arc<dyn Fn(String, Vec<String>) + Send + Sync + 'static>;

/// One parsed line from a test driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDirective {
    pub name: String,
    pub args: Vec<String>,
}

/// Parse `NAME|arg1|arg2`. Returns `None` for blank lines.
///
/// Surrounding whitespace (including a trailing `\r`) is trimmed from the
/// line and from each field.
pub fn parse_directive(line: &str) -> Option<TestDirective> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let mut fields = line.split('|').map(str::trim);
    let name = fields.next()?.to_string();
    if name.is_empty() {
        return None;
    }
    Some(TestDirective {
        name,
        args: fields.map(str::to_string).collect(),
    })
}

/// TCP listener plus at most one connected test driver.
#[derive(Clone)]
pub struct TestChannelTransport {
    inner: Arc<Inner>,
}

struct Inner {
    manager: Arc<AsyncManager>,
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: Mutex<Option<DirectiveHandler>>,
    connection: Mutex<Option<Connection>>,
    running: AtomicBool,
}

struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: Vec<u8>,
    /// Set after an over-long line was dropped; input is ignored up to the
    /// next newline.
    discarding: bool,
}

impl TestChannelTransport {
    /// Bind a listener on `127.0.0.1:port`. Port `0` picks a free port.
    pub fn bind(manager: Arc<AsyncManager>, port: u16) -> Result<TestChannelTransport> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).map_err(|e| {
            Error::Transport(format!("failed to bind test channel on port {}: {}", port, e))
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        debug!(%local_addr, "test channel bound");
        Ok(TestChannelTransport {
            inner: Arc::new(Inner {
                manager,
                listener,
                local_addr,
                handler: Mutex::new(None),
                connection: Mutex::new(None),
                running: AtomicBool::new(false),
            }),
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn register_command_handler<F>(&self, handler: F)
    where
        F: Fn(String, Vec<String>) + Send + Sync + 'static,
    {
        *lock(&self.inner.handler) = Some(Arc::new(handler));
    }

    /// Start accepting test drivers.
    pub fn start(&self) -> Result<()> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = self.inner.watch_listener() {
            self.inner.running.store(false, Ordering::SeqCst);
            return Err(e);
        }
        info!(addr = %self.inner.local_addr, "test channel listening");
        Ok(())
    }

    /// Stop accepting, drop the current driver and forget the handler.
    pub fn stop(&self) {
        if self.inner.running.swap(false, Ordering::SeqCst) {
            self.inner.unwatch_all();
        }
        lock(&self.inner.handler).take();
    }
}

impl fmt::Debug for TestChannelTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestChannelTransport")
            .field("local_addr", &self.inner.local_addr)
            .field("running", &self.inner.running.load(Ordering::SeqCst))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Listener and connection callbacks (FD-watcher thread)
// ---------------------------------------------------------------------------

impl Inner {
    fn listener_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }

    fn watch_listener(self: &Arc<Self>) -> Result<()> {
        let weak = Arc::downgrade(self);
        self.manager
            .watch_fd_for_non_blocking_reads(self.listener_fd(), move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_accept();
                }
            })
    }

    fn on_accept(self: &Arc<Self>) {
        let (stream, peer) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return,
            Err(e) => {
                warn!(error = %e, "test channel accept failed");
                return;
            }
        };
        if let Err(e) = stream.set_nonblocking(true) {
            warn!(%peer, error = %e, "cannot configure test driver socket; dropping it");
            return;
        }
        info!(%peer, "test driver connected");

        // One driver at a time: stop accepting until this one leaves.
        self.manager.stop_watching_file_descriptor(self.listener_fd());

        let fd = stream.as_raw_fd();
        *lock(&self.connection) = Some(Connection {
            stream,
            peer,
            buffer: Vec::new(),
            discarding: false,
        });
        let weak = Arc::downgrade(self);
        let watched = self.manager.watch_fd_for_non_blocking_reads(fd, move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.on_connection_readable();
            }
        });
        if let Err(e) = watched {
            warn!(%peer, error = %e, "cannot watch test driver socket; dropping it");
            self.drop_connection();
        }
    }

    fn on_connection_readable(self: &Arc<Self>) {
        let mut directives = Vec::new();
        let hung_up = {
            let mut guard = lock(&self.connection);
            let Some(conn) = guard.as_mut() else {
                return;
            };
            let hung_up = conn.fill();
            conn.take_directives(&mut directives);
            hung_up
        };

        for directive in directives {
            self.dispatch(directive);
        }
        if hung_up {
            self.drop_connection();
        }
    }

    fn dispatch(&self, directive: TestDirective) {
        let handler = lock(&self.handler).clone();
        let Some(handler) = handler else {
            debug!(name = %directive.name, "no test command handler; dropping directive");
            return;
        };
        debug!(name = %directive.name, args = ?directive.args, "test directive received");
        self.manager.exec_async(Duration::ZERO, move || {
            handler(directive.name, directive.args)
        });
    }

    /// Forget the current driver and go back to accepting.
    fn drop_connection(self: &Arc<Self>) {
        let conn = lock(&self.connection).take();
        if let Some(conn) = conn {
            self.manager
                .stop_watching_file_descriptor(conn.stream.as_raw_fd());
            info!(peer = %conn.peer, "test driver disconnected");
        }
        if self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.watch_listener() {
                warn!(error = %e, "cannot resume accepting test drivers");
            }
        }
    }

    fn unwatch_all(&self) {
        self.manager.stop_watching_file_descriptor(self.listener_fd());
        let conn = lock(&self.connection).take();
        if let Some(conn) = conn {
            self.manager
                .stop_watching_file_descriptor(conn.stream.as_raw_fd());
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.unwatch_all();
    }
}

impl Connection {
    /// Read what is available. Returns `true` once the driver has gone.
    fn fill(&mut self) -> bool {
        let mut chunk = [0u8; 512];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return true,
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return false,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(peer = %self.peer, error = %e, "test driver read failed");
                    return true;
                }
            }
        }
    }

    fn take_directives(&mut self, out: &mut Vec<TestDirective>) {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() > MAX_LINE_OCTETS {
                warn!(
                    peer = %self.peer,
                    octets = line.len(),
                    "test directive too long; discarded"
                );
                continue;
            }
            match std::str::from_utf8(&line) {
                Ok(text) => out.extend(parse_directive(text)),
                Err(_) => warn!(peer = %self.peer, "test directive is not UTF-8; ignored"),
            }
        }
        if self.buffer.len() > MAX_LINE_OCTETS {
            if !self.discarding {
                warn!(
                    peer = %self.peer,
                    octets = self.buffer.len(),
                    "test directive too long; discarded"
                );
            }
            self.buffer.clear();
            self.discarding = true;
        }
    }
}
