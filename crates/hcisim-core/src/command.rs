//! HCI command frames and their parsed form.
//!
//! A command frame on the wire is:
//!
//! ```text
//! 0x01 [opcode_lo] [opcode_hi] [param_len] [params...]
//! ```
//!
//! [`CommandPacket`] holds the raw frame as received. [`Command::parse`] turns
//! it into a tagged union once, so the controller dispatches with a plain
//! `match` and never touches raw parameter bytes. Unknown opcodes and
//! malformed parameter blocks are rejected here, at parse time.

use bytes::Buf;

use crate::address::BdAddr;
use crate::error::{Error, Result};
use crate::opcode::{self, OpCode};
use crate::packet::{Packet, PacketType};

/// Length of the Local_Name parameter (Write Local Name, Read Local Name).
pub const LOCAL_NAME_OCTETS: usize = 248;

/// Length of the Extended_Inquiry_Response parameter.
pub const EXTENDED_INQUIRY_RESPONSE_OCTETS: usize = 240;

// ---------------------------------------------------------------------------
// CommandPacket
// ---------------------------------------------------------------------------

/// A raw HCI command frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPacket {
    packet: Packet,
}

impl CommandPacket {
    /// Size of the command header on the wire: opcode (2) + length (1).
    pub const HEADER_SIZE: usize = 3;

    /// Build a command frame from an opcode and its parameters.
    pub fn new(opcode: OpCode, params: &[u8]) -> Result<Self> {
        let packet =
            Packet::with_payload(PacketType::Command, opcode.to_le_bytes().to_vec(), params)?;
        Ok(CommandPacket { packet })
    }

    /// Assemble a frame from a received 3-octet header and its payload.
    ///
    /// The header's length octet must agree with `payload.len()`.
    pub fn from_parts(header: &[u8], payload: &[u8]) -> Result<Self> {
        if header.len() != Self::HEADER_SIZE {
            return Err(Error::Framing(format!(
                "command header is {} octets, expected {}",
                header.len(),
                Self::HEADER_SIZE
            )));
        }
        let declared = usize::from(header[2]);
        if declared != payload.len() {
            return Err(Error::Framing(format!(
                "command declares {} parameter octets, got {}",
                declared,
                payload.len()
            )));
        }
        let opcode = OpCode::from_le_bytes([header[0], header[1]]);
        CommandPacket::new(opcode, payload)
    }

    pub fn opcode(&self) -> OpCode {
        let header = self.packet.header();
        OpCode::from_le_bytes([header[0], header[1]])
    }

    pub fn ogf(&self) -> u16 {
        self.opcode().ogf()
    }

    pub fn ocf(&self) -> u16 {
        self.opcode().ocf()
    }

    /// Command parameters.
    pub fn payload(&self) -> &[u8] {
        self.packet.payload()
    }

    /// The underlying frame.
    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    /// Serialize to wire bytes, including the packet type octet.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.packet.to_bytes()
    }
}

// ---------------------------------------------------------------------------
// Parsed commands
// ---------------------------------------------------------------------------

/// Why a command frame could not be turned into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The opcode is not one the controller answers.
    #[error("unknown opcode {0}")]
    UnknownOpcode(OpCode),

    /// The parameter block has the wrong length or an out-of-range field.
    #[error("invalid parameters for {opcode}: {reason}")]
    InvalidParameters {
        /// Opcode of the rejected command.
        opcode: OpCode,
        /// Human-readable description of the problem.
        reason: String,
    },
}

impl ParseError {
    fn invalid(opcode: OpCode, reason: impl Into<String>) -> ParseError {
        ParseError::InvalidParameters {
            opcode,
            reason: reason.into(),
        }
    }
}

/// A parsed HCI command.
///
/// Field widths follow the Bluetooth Core Specification 4.2, Volume 2,
/// Part E, Section 7. Vendor commands keep their sub-command and raw
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Link Control
    Inquiry {
        lap: u32,
        /// In units of 1.28 s.
        inquiry_length: u8,
        num_responses: u8,
    },
    InquiryCancel,
    RemoteNameRequest {
        bd_addr: BdAddr,
        page_scan_repetition_mode: u8,
        clock_offset: u16,
    },

    // Link Policy
    WriteDefaultLinkPolicySettings {
        settings: u16,
    },

    // Controller & Baseband
    SetEventMask {
        mask: u64,
    },
    Reset,
    SetEventFilter {
        filter_type: u8,
        condition: Vec<u8>,
    },
    DeleteStoredLinkKey {
        bd_addr: BdAddr,
        delete_all: bool,
    },
    WriteLocalName {
        /// Name octets up to the first NUL.
        name: Vec<u8>,
    },
    ReadLocalName,
    WritePageTimeout {
        timeout: u16,
    },
    WriteScanEnable {
        scan_enable: u8,
    },
    WriteInquiryScanActivity {
        interval: u16,
        window: u16,
    },
    WriteClassOfDevice {
        class_of_device: [u8; 3],
    },
    WriteVoiceSetting {
        setting: u16,
    },
    HostBufferSize {
        acl_data_packet_length: u16,
        sco_data_packet_length: u8,
        total_num_acl_data_packets: u16,
        total_num_sco_data_packets: u16,
    },
    WriteCurrentIacLap {
        laps: Vec<u32>,
    },
    WriteInquiryScanType {
        scan_type: u8,
    },
    WriteInquiryMode {
        mode: u8,
    },
    WritePageScanType {
        scan_type: u8,
    },
    WriteExtendedInquiryResponse {
        fec_required: u8,
        data: Vec<u8>,
    },
    WriteSimplePairingMode {
        enabled: bool,
    },
    WriteLeHostSupport {
        le_supported: bool,
        simultaneous_le_host: bool,
    },

    // Informational Parameters
    ReadLocalVersionInformation,
    ReadLocalSupportedCommands,
    ReadLocalSupportedFeatures,
    ReadLocalExtendedFeatures {
        page_number: u8,
    },
    ReadBufferSize,
    ReadBdAddr,
    ReadLocalSupportedCodecs,

    // LE Controller
    LeSetEventMask {
        mask: u64,
    },
    LeReadBufferSize,
    LeReadLocalSupportedFeatures,
    LeSetRandomAddress {
        address: BdAddr,
    },
    LeSetScanParameters {
        scan_type: u8,
        interval: u16,
        window: u16,
        own_address_type: u8,
        filter_policy: u8,
    },
    LeSetScanEnable {
        enable: bool,
        filter_duplicates: bool,
    },
    LeReadWhiteListSize,
    LeRand,
    LeReadSupportedStates,

    // Vendor specific
    VendorSleepMode {
        params: Vec<u8>,
    },
    VendorLeGetCapabilities,
    VendorLeMultiAdvertising {
        subcommand: u8,
        params: Vec<u8>,
    },
    VendorLeRpaOffload {
        subcommand: u8,
        params: Vec<u8>,
    },
    VendorLeAdvFilter {
        subcommand: u8,
        params: Vec<u8>,
    },
    VendorLeEnergyInfo,
    VendorLeExtendedScanParams {
        params: Vec<u8>,
    },
}

impl Command {
    /// Parse a command frame.
    pub fn parse(packet: &CommandPacket) -> std::result::Result<Command, ParseError> {
        let op = packet.opcode();
        let mut p = packet.payload();

        let command = match op {
            opcode::INQUIRY => {
                expect_len(op, p, 5)?;
                let lap = read_u24(&mut p);
                let inquiry_length = p.get_u8();
                let num_responses = p.get_u8();
                if !(0x01..=0x30).contains(&inquiry_length) {
                    return Err(ParseError::invalid(
                        op,
                        format!("inquiry length {inquiry_length} outside 1..=48"),
                    ));
                }
                Command::Inquiry {
                    lap,
                    inquiry_length,
                    num_responses,
                }
            }
            opcode::INQUIRY_CANCEL => {
                expect_len(op, p, 0)?;
                Command::InquiryCancel
            }
            opcode::REMOTE_NAME_REQUEST => {
                expect_len(op, p, 10)?;
                let bd_addr = read_bd_addr(&mut p);
                let page_scan_repetition_mode = p.get_u8();
                p.advance(1);
                let clock_offset = p.get_u16_le();
                Command::RemoteNameRequest {
                    bd_addr,
                    page_scan_repetition_mode,
                    clock_offset,
                }
            }

            opcode::WRITE_DEFAULT_LINK_POLICY_SETTINGS => {
                expect_len(op, p, 2)?;
                Command::WriteDefaultLinkPolicySettings {
                    settings: p.get_u16_le(),
                }
            }

            opcode::SET_EVENT_MASK => {
                expect_len(op, p, 8)?;
                Command::SetEventMask {
                    mask: p.get_u64_le(),
                }
            }
            opcode::RESET => {
                expect_len(op, p, 0)?;
                Command::Reset
            }
            opcode::SET_EVENT_FILTER => {
                if p.is_empty() {
                    return Err(ParseError::invalid(op, "missing filter type"));
                }
                let filter_type = p.get_u8();
                Command::SetEventFilter {
                    filter_type,
                    condition: p.to_vec(),
                }
            }
            opcode::DELETE_STORED_LINK_KEY => {
                expect_len(op, p, 7)?;
                let bd_addr = read_bd_addr(&mut p);
                Command::DeleteStoredLinkKey {
                    bd_addr,
                    delete_all: p.get_u8() != 0,
                }
            }
            opcode::WRITE_LOCAL_NAME => {
                if p.len() > LOCAL_NAME_OCTETS {
                    return Err(ParseError::invalid(
                        op,
                        format!("local name is {} octets, maximum {LOCAL_NAME_OCTETS}", p.len()),
                    ));
                }
                let end = p.iter().position(|&b| b == 0).unwrap_or(p.len());
                Command::WriteLocalName {
                    name: p[..end].to_vec(),
                }
            }
            opcode::READ_LOCAL_NAME => {
                expect_len(op, p, 0)?;
                Command::ReadLocalName
            }
            opcode::WRITE_PAGE_TIMEOUT => {
                expect_len(op, p, 2)?;
                Command::WritePageTimeout {
                    timeout: p.get_u16_le(),
                }
            }
            opcode::WRITE_SCAN_ENABLE => {
                expect_len(op, p, 1)?;
                Command::WriteScanEnable {
                    scan_enable: p.get_u8(),
                }
            }
            opcode::WRITE_INQUIRY_SCAN_ACTIVITY => {
                expect_len(op, p, 4)?;
                let interval = p.get_u16_le();
                let window = p.get_u16_le();
                Command::WriteInquiryScanActivity { interval, window }
            }
            opcode::WRITE_CLASS_OF_DEVICE => {
                expect_len(op, p, 3)?;
                Command::WriteClassOfDevice {
                    class_of_device: [p[0], p[1], p[2]],
                }
            }
            opcode::WRITE_VOICE_SETTING => {
                expect_len(op, p, 2)?;
                Command::WriteVoiceSetting {
                    setting: p.get_u16_le(),
                }
            }
            opcode::HOST_BUFFER_SIZE => {
                expect_len(op, p, 7)?;
                Command::HostBufferSize {
                    acl_data_packet_length: p.get_u16_le(),
                    sco_data_packet_length: p.get_u8(),
                    total_num_acl_data_packets: p.get_u16_le(),
                    total_num_sco_data_packets: p.get_u16_le(),
                }
            }
            opcode::WRITE_CURRENT_IAC_LAP => {
                if p.is_empty() {
                    return Err(ParseError::invalid(op, "missing IAC count"));
                }
                let count = usize::from(p.get_u8());
                if count == 0 || p.len() != count * 3 {
                    return Err(ParseError::invalid(
                        op,
                        format!("{count} IACs declared, {} octets follow", p.len()),
                    ));
                }
                let laps = (0..count).map(|_| read_u24(&mut p)).collect();
                Command::WriteCurrentIacLap { laps }
            }
            opcode::WRITE_INQUIRY_SCAN_TYPE => {
                expect_len(op, p, 1)?;
                Command::WriteInquiryScanType {
                    scan_type: p.get_u8(),
                }
            }
            opcode::WRITE_INQUIRY_MODE => {
                expect_len(op, p, 1)?;
                let mode = p.get_u8();
                if mode > 0x02 {
                    return Err(ParseError::invalid(op, format!("inquiry mode {mode}")));
                }
                Command::WriteInquiryMode { mode }
            }
            opcode::WRITE_PAGE_SCAN_TYPE => {
                expect_len(op, p, 1)?;
                Command::WritePageScanType {
                    scan_type: p.get_u8(),
                }
            }
            opcode::WRITE_EXTENDED_INQUIRY_RESPONSE => {
                expect_len(op, p, 1 + EXTENDED_INQUIRY_RESPONSE_OCTETS)?;
                let fec_required = p.get_u8();
                Command::WriteExtendedInquiryResponse {
                    fec_required,
                    data: p.to_vec(),
                }
            }
            opcode::WRITE_SIMPLE_PAIRING_MODE => {
                expect_len(op, p, 1)?;
                Command::WriteSimplePairingMode {
                    enabled: p.get_u8() != 0,
                }
            }
            opcode::WRITE_LE_HOST_SUPPORT => {
                expect_len(op, p, 2)?;
                Command::WriteLeHostSupport {
                    le_supported: p.get_u8() != 0,
                    simultaneous_le_host: p.get_u8() != 0,
                }
            }

            opcode::READ_LOCAL_VERSION_INFORMATION => {
                expect_len(op, p, 0)?;
                Command::ReadLocalVersionInformation
            }
            opcode::READ_LOCAL_SUPPORTED_COMMANDS => {
                expect_len(op, p, 0)?;
                Command::ReadLocalSupportedCommands
            }
            opcode::READ_LOCAL_SUPPORTED_FEATURES => {
                expect_len(op, p, 0)?;
                Command::ReadLocalSupportedFeatures
            }
            opcode::READ_LOCAL_EXTENDED_FEATURES => {
                expect_len(op, p, 1)?;
                Command::ReadLocalExtendedFeatures {
                    page_number: p.get_u8(),
                }
            }
            opcode::READ_BUFFER_SIZE => {
                expect_len(op, p, 0)?;
                Command::ReadBufferSize
            }
            opcode::READ_BD_ADDR => {
                expect_len(op, p, 0)?;
                Command::ReadBdAddr
            }
            opcode::READ_LOCAL_SUPPORTED_CODECS => {
                expect_len(op, p, 0)?;
                Command::ReadLocalSupportedCodecs
            }

            opcode::LE_SET_EVENT_MASK => {
                expect_len(op, p, 8)?;
                Command::LeSetEventMask {
                    mask: p.get_u64_le(),
                }
            }
            opcode::LE_READ_BUFFER_SIZE => {
                expect_len(op, p, 0)?;
                Command::LeReadBufferSize
            }
            opcode::LE_READ_LOCAL_SUPPORTED_FEATURES => {
                expect_len(op, p, 0)?;
                Command::LeReadLocalSupportedFeatures
            }
            opcode::LE_SET_RANDOM_ADDRESS => {
                expect_len(op, p, 6)?;
                Command::LeSetRandomAddress {
                    address: read_bd_addr(&mut p),
                }
            }
            opcode::LE_SET_SCAN_PARAMETERS => {
                expect_len(op, p, 7)?;
                Command::LeSetScanParameters {
                    scan_type: p.get_u8(),
                    interval: p.get_u16_le(),
                    window: p.get_u16_le(),
                    own_address_type: p.get_u8(),
                    filter_policy: p.get_u8(),
                }
            }
            opcode::LE_SET_SCAN_ENABLE => {
                expect_len(op, p, 2)?;
                Command::LeSetScanEnable {
                    enable: p.get_u8() != 0,
                    filter_duplicates: p.get_u8() != 0,
                }
            }
            opcode::LE_READ_WHITE_LIST_SIZE => {
                expect_len(op, p, 0)?;
                Command::LeReadWhiteListSize
            }
            opcode::LE_RAND => {
                expect_len(op, p, 0)?;
                Command::LeRand
            }
            opcode::LE_READ_SUPPORTED_STATES => {
                expect_len(op, p, 0)?;
                Command::LeReadSupportedStates
            }

            opcode::VENDOR_SLEEP_MODE => Command::VendorSleepMode { params: p.to_vec() },
            opcode::VENDOR_LE_GET_CAPABILITIES => Command::VendorLeGetCapabilities,
            opcode::VENDOR_LE_MULTI_ADVERTISING => {
                let (subcommand, params) = split_subcommand(op, p)?;
                Command::VendorLeMultiAdvertising { subcommand, params }
            }
            opcode::VENDOR_LE_RPA_OFFLOAD => {
                let (subcommand, params) = split_subcommand(op, p)?;
                Command::VendorLeRpaOffload { subcommand, params }
            }
            opcode::VENDOR_LE_ADV_FILTER => {
                let (subcommand, params) = split_subcommand(op, p)?;
                Command::VendorLeAdvFilter { subcommand, params }
            }
            opcode::VENDOR_LE_ENERGY_INFO => Command::VendorLeEnergyInfo,
            opcode::VENDOR_LE_EXTENDED_SCAN_PARAMS => {
                Command::VendorLeExtendedScanParams { params: p.to_vec() }
            }

            other => return Err(ParseError::UnknownOpcode(other)),
        };

        Ok(command)
    }

    /// Short human-readable name, used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Inquiry { .. } => "Inquiry",
            Command::InquiryCancel => "Inquiry Cancel",
            Command::RemoteNameRequest { .. } => "Remote Name Request",
            Command::WriteDefaultLinkPolicySettings { .. } => "Write Default Link Policy Settings",
            Command::SetEventMask { .. } => "Set Event Mask",
            Command::Reset => "Reset",
            Command::SetEventFilter { .. } => "Set Event Filter",
            Command::DeleteStoredLinkKey { .. } => "Delete Stored Link Key",
            Command::WriteLocalName { .. } => "Write Local Name",
            Command::ReadLocalName => "Read Local Name",
            Command::WritePageTimeout { .. } => "Write Page Timeout",
            Command::WriteScanEnable { .. } => "Write Scan Enable",
            Command::WriteInquiryScanActivity { .. } => "Write Inquiry Scan Activity",
            Command::WriteClassOfDevice { .. } => "Write Class Of Device",
            Command::WriteVoiceSetting { .. } => "Write Voice Setting",
            Command::HostBufferSize { .. } => "Host Buffer Size",
            Command::WriteCurrentIacLap { .. } => "Write Current IAC LAP",
            Command::WriteInquiryScanType { .. } => "Write Inquiry Scan Type",
            Command::WriteInquiryMode { .. } => "Write Inquiry Mode",
            Command::WritePageScanType { .. } => "Write Page Scan Type",
            Command::WriteExtendedInquiryResponse { .. } => "Write Extended Inquiry Response",
            Command::WriteSimplePairingMode { .. } => "Write Simple Pairing Mode",
            Command::WriteLeHostSupport { .. } => "Write LE Host Support",
            Command::ReadLocalVersionInformation => "Read Local Version Information",
            Command::ReadLocalSupportedCommands => "Read Local Supported Commands",
            Command::ReadLocalSupportedFeatures => "Read Local Supported Features",
            Command::ReadLocalExtendedFeatures { .. } => "Read Local Extended Features",
            Command::ReadBufferSize => "Read Buffer Size",
            Command::ReadBdAddr => "Read BD_ADDR",
            Command::ReadLocalSupportedCodecs => "Read Local Supported Codecs",
            Command::LeSetEventMask { .. } => "LE Set Event Mask",
            Command::LeReadBufferSize => "LE Read Buffer Size",
            Command::LeReadLocalSupportedFeatures => "LE Read Local Supported Features",
            Command::LeSetRandomAddress { .. } => "LE Set Random Address",
            Command::LeSetScanParameters { .. } => "LE Set Scan Parameters",
            Command::LeSetScanEnable { .. } => "LE Set Scan Enable",
            Command::LeReadWhiteListSize => "LE Read White List Size",
            Command::LeRand => "LE Rand",
            Command::LeReadSupportedStates => "LE Read Supported States",
            Command::VendorSleepMode { .. } => "Vendor Sleep Mode",
            Command::VendorLeGetCapabilities => "Vendor LE Get Capabilities",
            Command::VendorLeMultiAdvertising { .. } => "Vendor LE Multi Advertising",
            Command::VendorLeRpaOffload { .. } => "Vendor LE RPA Offload",
            Command::VendorLeAdvFilter { .. } => "Vendor LE Advertising Filter",
            Command::VendorLeEnergyInfo => "Vendor LE Energy Info",
            Command::VendorLeExtendedScanParams { .. } => "Vendor LE Extended Scan Params",
        }
    }
}

fn expect_len(op: OpCode, params: &[u8], len: usize) -> std::result::Result<(), ParseError> {
    if params.len() != len {
        return Err(ParseError::invalid(
            op,
            format!("expected {len} parameter octets, got {}", params.len()),
        ));
    }
    Ok(())
}

fn split_subcommand(op: OpCode, params: &[u8]) -> std::result::Result<(u8, Vec<u8>), ParseError> {
    match params.split_first() {
        Some((&sub, rest)) => Ok((sub, rest.to_vec())),
        None => Err(ParseError::invalid(op, "missing vendor sub-command")),
    }
}

fn read_u24(buf: &mut &[u8]) -> u32 {
    let value = u32::from_le_bytes([buf[0], buf[1], buf[2], 0]);
    buf.advance(3);
    value
}

fn read_bd_addr(buf: &mut &[u8]) -> BdAddr {
    let mut octets = [0u8; 6];
    buf.copy_to_slice(&mut octets);
    BdAddr(octets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(op: OpCode, params: &[u8]) -> std::result::Result<Command, ParseError> {
        Command::parse(&CommandPacket::new(op, params).unwrap())
    }

    #[test]
    fn new_and_accessors() {
        let cmd = CommandPacket::new(opcode::RESET, &[]).unwrap();
        assert_eq!(cmd.opcode(), opcode::RESET);
        assert_eq!(cmd.ogf(), 0x03);
        assert_eq!(cmd.ocf(), 0x003);
        assert!(cmd.payload().is_empty());
        assert_eq!(cmd.to_bytes(), vec![0x01, 0x03, 0x0C, 0x00]);
    }

    #[test]
    fn from_parts_matches_wire_bytes() {
        let wire = [0x01, 0x01, 0x04, 0x05, 0x33, 0x8B, 0x9E, 0x08, 0x00];
        let cmd = CommandPacket::from_parts(&wire[1..4], &wire[4..]).unwrap();
        assert_eq!(cmd.opcode(), opcode::INQUIRY);
        assert_eq!(cmd.to_bytes(), wire.to_vec());
    }

    #[test]
    fn from_parts_rejects_bad_header() {
        assert!(matches!(
            CommandPacket::from_parts(&[0x03, 0x0C], &[]),
            Err(Error::Framing(_))
        ));
        assert!(matches!(
            CommandPacket::from_parts(&[0x03, 0x0C, 0x02], &[0x00]),
            Err(Error::Framing(_))
        ));
    }

    #[test]
    fn parse_reset() {
        assert_eq!(parse(opcode::RESET, &[]).unwrap(), Command::Reset);
    }

    #[test]
    fn parse_inquiry() {
        let cmd = parse(opcode::INQUIRY, &[0x33, 0x8B, 0x9E, 0x08, 0x00]).unwrap();
        assert_eq!(
            cmd,
            Command::Inquiry {
                lap: 0x9E8B33,
                inquiry_length: 8,
                num_responses: 0,
            }
        );
        assert_eq!(cmd.name(), "Inquiry");
    }

    #[test]
    fn parse_inquiry_rejects_zero_length() {
        assert!(matches!(
            parse(opcode::INQUIRY, &[0x33, 0x8B, 0x9E, 0x00, 0x00]),
            Err(ParseError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn parse_remote_name_request() {
        let cmd = parse(
            opcode::REMOTE_NAME_REQUEST,
            &[6, 5, 4, 3, 2, 1, 0x01, 0x00, 0x02, 0x01],
        )
        .unwrap();
        assert_eq!(
            cmd,
            Command::RemoteNameRequest {
                bd_addr: BdAddr([6, 5, 4, 3, 2, 1]),
                page_scan_repetition_mode: 1,
                clock_offset: 0x0102,
            }
        );
    }

    #[test]
    fn parse_write_local_name_stops_at_nul() {
        let mut params = vec![0u8; LOCAL_NAME_OCTETS];
        params[..6].copy_from_slice(b"FooBar");
        let cmd = parse(opcode::WRITE_LOCAL_NAME, &params).unwrap();
        assert_eq!(
            cmd,
            Command::WriteLocalName {
                name: b"FooBar".to_vec()
            }
        );
    }

    #[test]
    fn parse_write_current_iac_lap() {
        let cmd = parse(
            opcode::WRITE_CURRENT_IAC_LAP,
            &[0x02, 0x33, 0x8B, 0x9E, 0x00, 0x8B, 0x9E],
        )
        .unwrap();
        assert_eq!(
            cmd,
            Command::WriteCurrentIacLap {
                laps: vec![0x9E8B33, 0x9E8B00]
            }
        );
        assert!(parse(opcode::WRITE_CURRENT_IAC_LAP, &[0x02, 0x33, 0x8B, 0x9E]).is_err());
    }

    #[test]
    fn parse_host_buffer_size() {
        let cmd = parse(
            opcode::HOST_BUFFER_SIZE,
            &[0x00, 0x04, 0xFF, 0x0A, 0x00, 0x0A, 0x00],
        )
        .unwrap();
        assert_eq!(
            cmd,
            Command::HostBufferSize {
                acl_data_packet_length: 1024,
                sco_data_packet_length: 255,
                total_num_acl_data_packets: 10,
                total_num_sco_data_packets: 10,
            }
        );
    }

    #[test]
    fn parse_le_set_scan_parameters() {
        let cmd = parse(
            opcode::LE_SET_SCAN_PARAMETERS,
            &[0x01, 0x10, 0x00, 0x08, 0x00, 0x00, 0x00],
        )
        .unwrap();
        assert_eq!(
            cmd,
            Command::LeSetScanParameters {
                scan_type: 1,
                interval: 0x10,
                window: 0x08,
                own_address_type: 0,
                filter_policy: 0,
            }
        );
    }

    #[test]
    fn parse_vendor_subcommand() {
        let cmd = parse(opcode::VENDOR_LE_MULTI_ADVERTISING, &[0x01, 0xAA]).unwrap();
        assert_eq!(
            cmd,
            Command::VendorLeMultiAdvertising {
                subcommand: 0x01,
                params: vec![0xAA]
            }
        );
        assert!(parse(opcode::VENDOR_LE_ADV_FILTER, &[]).is_err());
    }

    #[test]
    fn parse_rejects_wrong_length() {
        match parse(opcode::RESET, &[0x00]) {
            Err(ParseError::InvalidParameters { opcode: op, reason }) => {
                assert_eq!(op, opcode::RESET);
                assert_eq!(reason, "expected 0 parameter octets, got 1");
            }
            other => panic!("expected InvalidParameters, got {:?}", other),
        }
        assert!(parse(opcode::SET_EVENT_MASK, &[0xFF; 7]).is_err());
        assert!(parse(opcode::WRITE_INQUIRY_MODE, &[0x03]).is_err());
    }

    #[test]
    fn parse_rejects_unknown_opcode() {
        let unknown = OpCode::new(0x03, 0x3FF);
        assert_eq!(
            parse(unknown, &[]),
            Err(ParseError::UnknownOpcode(unknown))
        );
    }

    #[test]
    fn parse_error_display() {
        let e = ParseError::UnknownOpcode(opcode::RESET);
        assert_eq!(e.to_string(), "unknown opcode 0x0C03 (ogf 0x03, ocf 0x003)");
    }
}
