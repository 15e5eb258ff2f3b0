//! HCI status and error codes carried in command-complete, command-status,
//! and completion events (Core Specification 4.2, Volume 2, Part D).

pub const SUCCESS: u8 = 0x00;
pub const UNKNOWN_COMMAND: u8 = 0x01;
pub const PAGE_TIMEOUT: u8 = 0x04;
pub const COMMAND_DISALLOWED: u8 = 0x0C;
pub const INVALID_PARAMETERS: u8 = 0x12;
