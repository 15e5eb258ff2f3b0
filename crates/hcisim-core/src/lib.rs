//! hcisim-core: HCI framing, command parsing, and event factories.
//!
//! This crate holds everything about the HCI wire format that does not need
//! a thread or a socket: the base frame type, typed command and event
//! frames, opcode constants, and the small set of shared types the other
//! hcisim crates agree on.
//!
//! # Key types
//!
//! - [`Packet`] -- append-only frame with a reconstructed length octet
//! - [`CommandPacket`] / [`Command`] -- a received command, raw and parsed
//! - [`EventPacket`] -- controller-to-host events and their factories
//! - [`EventChannel`] -- where a controller sends the events it builds
//! - [`Error`] / [`Result`] -- error handling

pub mod address;
pub mod channel;
pub mod command;
pub mod error;
pub mod event;
pub mod opcode;
pub mod packet;
pub mod status;
pub mod task;

pub use address::{BdAddr, ParseBdAddrError};
pub use channel::EventChannel;
pub use command::{Command, CommandPacket, ParseError};
pub use error::{Error, Result};
pub use event::{
    EventPacket, InquiryResult, InquiryResultBuilder, InquiryResultShape, LeAdvertisingReport,
};
pub use opcode::OpCode;
pub use packet::{MAX_PAYLOAD_OCTETS, Packet, PacketType};
pub use task::AsyncTaskId;
