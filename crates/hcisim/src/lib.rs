//! # hcisim -- a software Bluetooth controller
//!
//! `hcisim` stands in for a Bluetooth controller on the far side of an HCI
//! socket. A host stack sends H4-framed commands and gets back the events a
//! dual-mode controller would produce, without any radio. A second, textual
//! test channel lets a test driver inject faults (swallowed commands,
//! delayed events) and fake remote devices.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::io::{Read, Write};
//! use hcisim::EngineBuilder;
//!
//! fn main() -> hcisim::Result<()> {
//!     let engine = EngineBuilder::new().without_test_channel().build()?;
//!     let mut host = engine.take_host_stream().expect("host end");
//!
//!     // HCI_Reset
//!     host.write_all(&[0x01, 0x03, 0x0C, 0x00])?;
//!     let mut event = [0u8; 7];
//!     host.read_exact(&mut event)?;
//!     assert_eq!(event, [0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00]);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                 | Purpose                                            |
//! |-----------------------|----------------------------------------------------|
//! | `hcisim-core`         | Packets, opcodes, command decoding, event encoding |
//! | `hcisim-async`        | FD watcher and task manager threads                |
//! | `hcisim-transport`    | HCI socket and TCP test channel                    |
//! | `hcisim-controller`   | Command dispatch and link-layer state machine      |
//! | **`hcisim`**          | This facade crate -- [`Engine`] plus re-exports    |
//!
//! Everything the controller does runs on one task-manager thread: commands
//! read by the FD watcher are queued there, and so are the events the
//! controller posts back.

pub mod engine;

pub use engine::{Engine, EngineBuilder};

pub use hcisim_async::AsyncManager;
pub use hcisim_controller::{
    Controller, FakePeer, InquiryMode, LinkState, Properties, TestChannelState, TestCommand,
};
pub use hcisim_core::{BdAddr, CommandPacket, Error, EventPacket, OpCode, Result};
pub use hcisim_transport::DEFAULT_TEST_CHANNEL_PORT;
