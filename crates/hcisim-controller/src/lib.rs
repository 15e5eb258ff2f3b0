//! hcisim-controller: the emulated Bluetooth controller.
//!
//! # Key types
//!
//! - [`Controller`] -- decodes HCI commands, runs the inquiry and LE scan
//!   state machine, and posts events to an [`EventChannel`](hcisim_core::EventChannel)
//! - [`Properties`] -- the fixed capability table behind every read command
//! - [`TestCommand`] -- fault injection and fake discovery from the test channel
//! - [`FakePeer`] -- a remote device reported during inquiry and LE scanning
//!
//! The controller never touches a socket. The `hcisim` crate wires it to the
//! HCI and test-channel transports.

pub mod controller;
pub mod properties;
pub mod state;
pub mod test_commands;

pub use controller::{Controller, INQUIRY_LENGTH_UNIT, LeScanParameters, MAX_FAKE_PEERS};
pub use properties::Properties;
pub use state::{FakePeer, InquiryMode, LinkState, TestChannelState};
pub use test_commands::{TestCommand, TestCommandError};
