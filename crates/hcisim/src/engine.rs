//! Engine -- one emulated controller wired to its transports.
//!
//! [`EngineBuilder`] separates configuration from construction. `build()`
//! creates the async manager, the HCI transport, the optional test channel,
//! and the controller, then routes commands and directives to the controller
//! and its events back to the HCI socket.
//!
//! # Example
//!
//! ```no_run
//! use hcisim::{EngineBuilder, Properties};
//!
//! # fn main() -> hcisim::Result<()> {
//! let engine = EngineBuilder::new()
//!     .properties(Properties::default().with_local_name("bench"))
//!     .test_channel_port(0)
//!     .build()?;
//! let host = engine.take_host_stream().expect("host end of the socket pair");
//! println!("test channel on {:?}", engine.test_channel_addr());
//! # drop(host);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use hcisim_async::AsyncManager;
use hcisim_controller::{Controller, Properties, TestCommand};
use hcisim_core::channel::EventChannel;
use hcisim_core::error::Result;
use hcisim_transport::{DEFAULT_TEST_CHANNEL_PORT, HciTransport, TestChannelTransport};

/// Fluent builder for [`Engine`].
///
/// With no configuration the engine uses [`Properties::default`], listens
/// for test drivers on [`DEFAULT_TEST_CHANNEL_PORT`], and posts events
/// without delay.
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    properties: Properties,
    test_channel_port: Option<u16>,
    event_delay: Option<Duration>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        EngineBuilder::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        EngineBuilder {
            properties: Properties::default(),
            test_channel_port: Some(DEFAULT_TEST_CHANNEL_PORT),
            event_delay: None,
        }
    }

    /// Set the controller's capability table.
    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Listen for test drivers on `127.0.0.1:port`. Port `0` picks a free
    /// port; see [`Engine::test_channel_addr`].
    pub fn test_channel_port(mut self, port: u16) -> Self {
        self.test_channel_port = Some(port);
        self
    }

    /// Run without a test channel.
    pub fn without_test_channel(mut self) -> Self {
        self.test_channel_port = None;
        self
    }

    /// Start with every event delayed, as if `SET_EVENT_DELAY` had been
    /// received.
    pub fn event_delay(mut self, delay: Duration) -> Self {
        self.event_delay = Some(delay);
        self
    }

    /// Build an engine on a fresh socket pair. The host end is available
    /// through [`Engine::take_host_stream`].
    pub fn build(self) -> Result<Engine> {
        let manager = Arc::new(AsyncManager::new()?);
        let transport = HciTransport::set_up(Arc::clone(&manager))?;
        self.assemble(manager, transport)
    }

    /// Build an engine serving an already-connected host stream, such as
    /// one accepted from a listening Unix socket.
    pub fn build_with_stream(self, stream: UnixStream) -> Result<Engine> {
        let manager = Arc::new(AsyncManager::new()?);
        let transport = HciTransport::from_stream(Arc::clone(&manager), stream);
        self.assemble(manager, transport)
    }

    fn assemble(self, manager: Arc<AsyncManager>, transport: HciTransport) -> Result<Engine> {
        let channel: Arc<dyn EventChannel> = Arc::new(transport.clone());
        let controller = Controller::new(self.properties, Arc::clone(&manager), channel);
        if let Some(delay) = self.event_delay {
            controller.apply_test_command(TestCommand::SetEventDelay(delay));
        }

        let test_channel = match self.test_channel_port {
            Some(port) => {
                let test_channel = TestChannelTransport::bind(Arc::clone(&manager), port)?;
                let target = controller.clone();
                test_channel
                    .register_command_handler(move |name, args| {
                        target.handle_test_command(&name, &args)
                    });
                Some(test_channel)
            }
            None => None,
        };

        let target = controller.clone();
        transport.register_command_handler(move |command| target.handle_command(command));

        let engine = Engine {
            manager,
            transport,
            test_channel,
            controller,
            shut_down: AtomicBool::new(false),
        };
        // On error, Engine's Drop unwinds whatever did start.
        engine.transport.start()?;
        if let Some(test_channel) = &engine.test_channel {
            test_channel.start()?;
        }
        info!(
            bd_addr = %engine.controller.properties().bd_addr(),
            test_channel = ?engine.test_channel_addr(),
            "controller emulator running"
        );
        Ok(engine)
    }
}

/// A running controller emulator.
///
/// Dropping the engine shuts it down: pending controller tasks are
/// cancelled, both transports stop, and the worker threads are joined.
pub struct Engine {
    manager: Arc<AsyncManager>,
    transport: HciTransport,
    test_channel: Option<TestChannelTransport>,
    controller: Controller,
    shut_down: AtomicBool,
}

impl Engine {
    /// Hand out the host end of the HCI socket pair. `None` after the first
    /// call, or for engines built with [`EngineBuilder::build_with_stream`].
    pub fn take_host_stream(&self) -> Option<UnixStream> {
        self.transport.take_host_stream()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn async_manager(&self) -> &Arc<AsyncManager> {
        &self.manager
    }

    /// Where the test channel is listening, if it is enabled.
    pub fn test_channel_addr(&self) -> Option<SocketAddr> {
        self.test_channel.as_ref().map(TestChannelTransport::local_addr)
    }

    /// `false` once the host has hung up or the HCI link failed.
    pub fn is_host_connected(&self) -> bool {
        !self.transport.is_closed()
    }

    /// Stop everything. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("engine shutting down");
        self.controller.cancel_pending_tasks();
        // Clearing the handlers releases the controller, which holds the
        // transport as its event channel.
        self.transport.stop();
        if let Some(test_channel) = &self.test_channel {
            test_channel.stop();
        }
        self.manager.shutdown();
        info!("controller emulator stopped");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("controller", &self.controller)
            .field("transport", &self.transport)
            .field("test_channel", &self.test_channel)
            .field("shut_down", &self.shut_down.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcisim_controller::TestChannelState;

    #[test]
    fn builder_defaults() {
        let builder = EngineBuilder::new();
        assert_eq!(builder.test_channel_port, Some(DEFAULT_TEST_CHANNEL_PORT));
        assert_eq!(builder.event_delay, None);
    }

    #[test]
    fn build_without_test_channel() {
        let engine = EngineBuilder::new().without_test_channel().build().unwrap();
        assert!(engine.test_channel_addr().is_none());
        assert!(engine.take_host_stream().is_some());
        assert!(engine.take_host_stream().is_none());
        assert!(engine.is_host_connected());
    }

    #[test]
    fn ephemeral_test_channel_port() {
        let engine = EngineBuilder::new().test_channel_port(0).build().unwrap();
        let addr = engine.test_channel_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn initial_event_delay() {
        let engine = EngineBuilder::new()
            .without_test_channel()
            .event_delay(Duration::from_millis(40))
            .build()
            .unwrap();
        assert_eq!(
            engine.controller().test_channel_state(),
            TestChannelState::DelayedResponse
        );
        assert_eq!(engine.controller().event_delay(), Duration::from_millis(40));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let engine = EngineBuilder::new().without_test_channel().build().unwrap();
        engine.shutdown();
        engine.shutdown();
        drop(engine);
    }
}
