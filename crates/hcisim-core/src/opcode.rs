//! HCI command opcodes.
//!
//! An opcode is a 16-bit value split into a 6-bit Opcode Group Field (OGF)
//! and a 10-bit Opcode Command Field (OCF):
//!
//! ```text
//! opcode = (OGF << 10) | OCF
//! ```
//!
//! Opcodes travel little-endian on the wire. Constants below cover every
//! command the emulated controller answers; anything else is treated as
//! unsupported and silently ignored by the controller.

use std::fmt;

mod ogf {
    pub const LINK_CONTROL: u16 = 0x01;
    pub const LINK_POLICY: u16 = 0x02;
    pub const CONTROLLER_BASEBAND: u16 = 0x03;
    pub const INFO_PARAM: u16 = 0x04;
    pub const LE_CONTROLLER: u16 = 0x08;
    pub const VENDOR_SPECIFIC: u16 = 0x3F;
}

/// A 16-bit HCI command opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpCode(pub u16);

impl OpCode {
    /// Build an opcode from its group and command fields.
    ///
    /// Bits of `ogf` above 6 and of `ocf` above 10 are discarded.
    pub const fn new(ogf: u16, ocf: u16) -> OpCode {
        OpCode(((ogf & 0x3F) << 10) | (ocf & 0x03FF))
    }

    /// Opcode Group Field (high 6 bits).
    pub const fn ogf(self) -> u16 {
        self.0 >> 10
    }

    /// Opcode Command Field (low 10 bits).
    pub const fn ocf(self) -> u16 {
        self.0 & 0x03FF
    }

    /// Wire representation (little-endian).
    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    /// Parse from wire representation (little-endian).
    pub const fn from_le_bytes(bytes: [u8; 2]) -> OpCode {
        OpCode(u16::from_le_bytes(bytes))
    }

    /// Whether this opcode is in the vendor-specific group.
    pub const fn is_vendor_specific(self) -> bool {
        self.ogf() == ogf::VENDOR_SPECIFIC
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X} (ogf 0x{:02X}, ocf 0x{:03X})", self.0, self.ogf(), self.ocf())
    }
}

impl From<u16> for OpCode {
    fn from(value: u16) -> Self {
        OpCode(value)
    }
}

impl From<OpCode> for u16 {
    fn from(opcode: OpCode) -> u16 {
        opcode.0
    }
}

// Link Control (OGF 0x01)
pub const INQUIRY: OpCode = OpCode::new(ogf::LINK_CONTROL, 0x0001);
pub const INQUIRY_CANCEL: OpCode = OpCode::new(ogf::LINK_CONTROL, 0x0002);
pub const REMOTE_NAME_REQUEST: OpCode = OpCode::new(ogf::LINK_CONTROL, 0x0019);

// Link Policy (OGF 0x02)
pub const WRITE_DEFAULT_LINK_POLICY_SETTINGS: OpCode = OpCode::new(ogf::LINK_POLICY, 0x000F);

// Controller & Baseband (OGF 0x03)
pub const SET_EVENT_MASK: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x0001);
pub const RESET: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x0003);
pub const SET_EVENT_FILTER: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x0005);
pub const DELETE_STORED_LINK_KEY: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x0012);
pub const WRITE_LOCAL_NAME: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x0013);
pub const READ_LOCAL_NAME: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x0014);
pub const WRITE_PAGE_TIMEOUT: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x0018);
pub const WRITE_SCAN_ENABLE: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x001A);
pub const WRITE_INQUIRY_SCAN_ACTIVITY: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x001E);
pub const WRITE_CLASS_OF_DEVICE: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x0024);
pub const WRITE_VOICE_SETTING: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x0026);
pub const HOST_BUFFER_SIZE: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x0033);
pub const WRITE_CURRENT_IAC_LAP: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x003A);
pub const WRITE_INQUIRY_SCAN_TYPE: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x0043);
pub const WRITE_INQUIRY_MODE: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x0045);
pub const WRITE_PAGE_SCAN_TYPE: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x0047);
pub const WRITE_EXTENDED_INQUIRY_RESPONSE: OpCode =
    OpCode::new(ogf::CONTROLLER_BASEBAND, 0x0052);
pub const WRITE_SIMPLE_PAIRING_MODE: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x0056);
pub const WRITE_LE_HOST_SUPPORT: OpCode = OpCode::new(ogf::CONTROLLER_BASEBAND, 0x006D);

// Informational Parameters (OGF 0x04)
pub const READ_LOCAL_VERSION_INFORMATION: OpCode = OpCode::new(ogf::INFO_PARAM, 0x0001);
pub const READ_LOCAL_SUPPORTED_COMMANDS: OpCode = OpCode::new(ogf::INFO_PARAM, 0x0002);
pub const READ_LOCAL_SUPPORTED_FEATURES: OpCode = OpCode::new(ogf::INFO_PARAM, 0x0003);
pub const READ_LOCAL_EXTENDED_FEATURES: OpCode = OpCode::new(ogf::INFO_PARAM, 0x0004);
pub const READ_BUFFER_SIZE: OpCode = OpCode::new(ogf::INFO_PARAM, 0x0005);
pub const READ_BD_ADDR: OpCode = OpCode::new(ogf::INFO_PARAM, 0x0009);
pub const READ_LOCAL_SUPPORTED_CODECS: OpCode = OpCode::new(ogf::INFO_PARAM, 0x000B);

// LE Controller (OGF 0x08)
pub const LE_SET_EVENT_MASK: OpCode = OpCode::new(ogf::LE_CONTROLLER, 0x0001);
pub const LE_READ_BUFFER_SIZE: OpCode = OpCode::new(ogf::LE_CONTROLLER, 0x0002);
pub const LE_READ_LOCAL_SUPPORTED_FEATURES: OpCode = OpCode::new(ogf::LE_CONTROLLER, 0x0003);
pub const LE_SET_RANDOM_ADDRESS: OpCode = OpCode::new(ogf::LE_CONTROLLER, 0x0005);
pub const LE_SET_SCAN_PARAMETERS: OpCode = OpCode::new(ogf::LE_CONTROLLER, 0x000B);
pub const LE_SET_SCAN_ENABLE: OpCode = OpCode::new(ogf::LE_CONTROLLER, 0x000C);
pub const LE_READ_WHITE_LIST_SIZE: OpCode = OpCode::new(ogf::LE_CONTROLLER, 0x000F);
pub const LE_RAND: OpCode = OpCode::new(ogf::LE_CONTROLLER, 0x0018);
pub const LE_READ_SUPPORTED_STATES: OpCode = OpCode::new(ogf::LE_CONTROLLER, 0x001C);

// Vendor specific (OGF 0x3F)
pub const VENDOR_SLEEP_MODE: OpCode = OpCode::new(ogf::VENDOR_SPECIFIC, 0x0027);
pub const VENDOR_LE_GET_CAPABILITIES: OpCode = OpCode::new(ogf::VENDOR_SPECIFIC, 0x0153);
pub const VENDOR_LE_MULTI_ADVERTISING: OpCode = OpCode::new(ogf::VENDOR_SPECIFIC, 0x0154);
pub const VENDOR_LE_RPA_OFFLOAD: OpCode = OpCode::new(ogf::VENDOR_SPECIFIC, 0x0155);
pub const VENDOR_LE_ADV_FILTER: OpCode = OpCode::new(ogf::VENDOR_SPECIFIC, 0x0157);
pub const VENDOR_LE_ENERGY_INFO: OpCode = OpCode::new(ogf::VENDOR_SPECIFIC, 0x0159);
pub const VENDOR_LE_EXTENDED_SCAN_PARAMS: OpCode = OpCode::new(ogf::VENDOR_SPECIFIC, 0x015A);
