//! HCI event frames and the factories that build them.
//!
//! An event frame on the wire is:
//!
//! ```text
//! 0x04 [event_code] [param_len] [params...]
//! ```
//!
//! Every factory here is a pure function that lays out its parameters in the
//! exact order and width the Core Specification 4.2 (Volume 2, Part E,
//! Section 7.7) gives for that event. All parameter blocks are bounded by
//! protocol constants, so a factory that overflows the frame is a bug in the
//! caller and panics.

use crate::address::BdAddr;
use crate::command::{EXTENDED_INQUIRY_RESPONSE_OCTETS, LOCAL_NAME_OCTETS};
use crate::opcode::{self, OpCode};
use crate::packet::{MAX_PAYLOAD_OCTETS, Packet, PacketType};

/// Event codes.
pub mod code {
    pub const INQUIRY_COMPLETE: u8 = 0x01;
    pub const INQUIRY_RESULT: u8 = 0x02;
    pub const REMOTE_NAME_REQUEST_COMPLETE: u8 = 0x07;
    pub const COMMAND_COMPLETE: u8 = 0x0E;
    pub const COMMAND_STATUS: u8 = 0x0F;
    pub const INQUIRY_RESULT_WITH_RSSI: u8 = 0x22;
    pub const EXTENDED_INQUIRY_RESULT: u8 = 0x2F;
    pub const LE_META: u8 = 0x3E;
}

/// LE meta event subevent codes.
pub mod le_subevent {
    pub const ADVERTISING_REPORT: u8 = 0x02;
}

/// Number of command packets the host may send, reported in every
/// command-complete and command-status event.
pub const NUM_HCI_COMMAND_PACKETS: u8 = 1;

// Per-response sizes of the multi-response events.
const INQUIRY_RESULT_OCTETS: usize = 14;
const INQUIRY_RESULT_WITH_RSSI_OCTETS: usize = 14;

/// A controller-to-host event frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPacket {
    packet: Packet,
}

impl EventPacket {
    /// Size of the event header on the wire: event code (1) + length (1).
    pub const HEADER_SIZE: usize = 2;

    fn new(event_code: u8) -> EventPacket {
        EventPacket {
            packet: Packet::new(PacketType::Event, vec![event_code]),
        }
    }

    /// Build an event from a code and a complete parameter block.
    ///
    /// # Panics
    ///
    /// If `params` is longer than one frame can carry.
    pub fn from_params(event_code: u8, params: &[u8]) -> EventPacket {
        let mut event = EventPacket::new(event_code);
        event.push_bytes(params);
        event
    }

    pub fn event_code(&self) -> u8 {
        self.packet.header()[0]
    }

    /// Event parameters.
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

    /// For command-complete and command-status events, the opcode of the
    /// command being answered.
    pub fn command_opcode(&self) -> Option<OpCode> {
        let p = self.payload();
        match self.event_code() {
            code::COMMAND_COMPLETE if p.len() >= 3 => Some(OpCode::from_le_bytes([p[1], p[2]])),
            code::COMMAND_STATUS if p.len() >= 4 => Some(OpCode::from_le_bytes([p[2], p[3]])),
            _ => None,
        }
    }

    /// For command-complete and command-status events, the status octet.
    pub fn status(&self) -> Option<u8> {
        let p = self.payload();
        match self.event_code() {
            code::COMMAND_COMPLETE => p.get(3).copied(),
            code::COMMAND_STATUS | code::INQUIRY_COMPLETE | code::REMOTE_NAME_REQUEST_COMPLETE => {
                p.first().copied()
            }
            _ => None,
        }
    }

    fn push_u8(&mut self, value: u8) {
        assert!(self.packet.add_payload_octets1(value), "event payload overflow");
    }

    fn push_u16(&mut self, value: u16) {
        assert!(self.packet.add_payload_octets2(value), "event payload overflow");
    }

    fn push_u32(&mut self, value: u32) {
        assert!(self.packet.add_payload_octets4(value), "event payload overflow");
    }

    fn push_u64(&mut self, value: u64) {
        assert!(self.packet.add_payload_octets8(value), "event payload overflow");
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        assert!(self.packet.add_payload_bytes(bytes), "event payload overflow");
    }

    /// Append `bytes` zero-padded (or truncated) to exactly `width` octets.
    fn push_padded(&mut self, bytes: &[u8], width: usize) {
        let used = bytes.len().min(width);
        self.push_bytes(&bytes[..used]);
        self.push_bytes(&vec![0u8; width - used]);
    }

    // -----------------------------------------------------------------------
    // Generic shapes
    // -----------------------------------------------------------------------

    /// Command Complete (7.7.14):
    /// `[num_packets][opcode_lo][opcode_hi][return_params...]`.
    pub fn command_complete(num_packets: u8, opcode: OpCode, return_params: &[u8]) -> EventPacket {
        let mut event = EventPacket::new(code::COMMAND_COMPLETE);
        event.push_u8(num_packets);
        event.push_u16(opcode.0);
        event.push_bytes(return_params);
        event
    }

    /// Command Complete whose only return parameter is `status`.
    pub fn command_complete_only_status(opcode: OpCode, status: u8) -> EventPacket {
        EventPacket::command_complete(NUM_HCI_COMMAND_PACKETS, opcode, &[status])
    }

    /// Command Status (7.7.15): `[status][num_packets][opcode_lo][opcode_hi]`.
    pub fn command_status(status: u8, opcode: OpCode) -> EventPacket {
        let mut event = EventPacket::new(code::COMMAND_STATUS);
        event.push_u8(status);
        event.push_u8(NUM_HCI_COMMAND_PACKETS);
        event.push_u16(opcode.0);
        event
    }

    // -----------------------------------------------------------------------
    // Discovery
    // -----------------------------------------------------------------------

    /// Inquiry Complete (7.7.1).
    pub fn inquiry_complete(status: u8) -> EventPacket {
        EventPacket::from_params(code::INQUIRY_COMPLETE, &[status])
    }

    /// Inquiry Result (7.7.2) or Inquiry Result with RSSI (7.7.33) events for
    /// `results`, as many responses per event as fit. Empty input yields no
    /// events.
    pub fn inquiry_result(
        shape: InquiryResultShape,
        results: &[InquiryResult],
    ) -> Vec<EventPacket> {
        let mut events = Vec::new();
        let mut builder = InquiryResultBuilder::new(shape);
        for result in results {
            if !builder.push(result.clone()) {
                events.push(builder.build());
                builder = InquiryResultBuilder::new(shape);
                builder.push(result.clone());
            }
        }
        if !builder.is_empty() {
            events.push(builder.build());
        }
        events
    }

    /// Extended Inquiry Result (7.7.38): always a single response followed by
    /// a 240-octet extended inquiry response block.
    pub fn extended_inquiry_result(result: &InquiryResult, eir: &[u8]) -> EventPacket {
        let mut event = EventPacket::new(code::EXTENDED_INQUIRY_RESULT);
        event.push_u8(1);
        event.push_bytes(result.bd_addr.as_bytes());
        event.push_u8(result.page_scan_repetition_mode);
        event.push_u8(0);
        event.push_bytes(&result.class_of_device);
        event.push_u16(result.clock_offset);
        event.push_u8(result.rssi as u8);
        event.push_padded(eir, EXTENDED_INQUIRY_RESPONSE_OCTETS);
        event
    }

    /// Remote Name Request Complete (7.7.4): status, address, and a 248-octet
    /// NUL-padded name.
    pub fn remote_name_request_complete(status: u8, bd_addr: BdAddr, name: &[u8]) -> EventPacket {
        let mut event = EventPacket::new(code::REMOTE_NAME_REQUEST_COMPLETE);
        event.push_u8(status);
        event.push_bytes(bd_addr.as_bytes());
        event.push_padded(name, LOCAL_NAME_OCTETS);
        event
    }

    /// LE Advertising Report (7.7.65.2), carried in an LE meta event.
    pub fn le_advertising_report(reports: &[LeAdvertisingReport]) -> EventPacket {
        let mut event = EventPacket::new(code::LE_META);
        event.push_u8(le_subevent::ADVERTISING_REPORT);
        event.push_u8(reports.len() as u8);
        for report in reports {
            event.push_u8(report.event_type);
            event.push_u8(report.address_type);
            event.push_bytes(report.address.as_bytes());
            event.push_u8(report.data.len() as u8);
            event.push_bytes(&report.data);
            event.push_u8(report.rssi as u8);
        }
        event
    }

    // -----------------------------------------------------------------------
    // Command Complete with return parameters
    // -----------------------------------------------------------------------

    /// Read Buffer Size (7.4.5).
    pub fn read_buffer_size(
        status: u8,
        acl_data_packet_length: u16,
        sco_data_packet_length: u8,
        total_num_acl_data_packets: u16,
        total_num_sco_data_packets: u16,
    ) -> EventPacket {
        let mut event = EventPacket::complete_with_status(opcode::READ_BUFFER_SIZE, status);
        event.push_u16(acl_data_packet_length);
        event.push_u8(sco_data_packet_length);
        event.push_u16(total_num_acl_data_packets);
        event.push_u16(total_num_sco_data_packets);
        event
    }

    /// Read Local Version Information (7.4.1).
    pub fn read_local_version_information(
        status: u8,
        hci_version: u8,
        hci_revision: u16,
        lmp_version: u8,
        manufacturer_name: u16,
        lmp_subversion: u16,
    ) -> EventPacket {
        let mut event =
            EventPacket::complete_with_status(opcode::READ_LOCAL_VERSION_INFORMATION, status);
        event.push_u8(hci_version);
        event.push_u16(hci_revision);
        event.push_u8(lmp_version);
        event.push_u16(manufacturer_name);
        event.push_u16(lmp_subversion);
        event
    }

    /// Read Local Supported Commands (7.4.2): a 64-octet bitmap.
    pub fn read_local_supported_commands(status: u8, supported_commands: &[u8; 64]) -> EventPacket {
        let mut event =
            EventPacket::complete_with_status(opcode::READ_LOCAL_SUPPORTED_COMMANDS, status);
        event.push_bytes(supported_commands);
        event
    }

    /// Read Local Supported Features (7.4.3).
    pub fn read_local_supported_features(status: u8, features: u64) -> EventPacket {
        let mut event =
            EventPacket::complete_with_status(opcode::READ_LOCAL_SUPPORTED_FEATURES, status);
        event.push_u64(features);
        event
    }

    /// Read Local Extended Features (7.4.4).
    pub fn read_local_extended_features(
        status: u8,
        page_number: u8,
        maximum_page_number: u8,
        features: u64,
    ) -> EventPacket {
        let mut event =
            EventPacket::complete_with_status(opcode::READ_LOCAL_EXTENDED_FEATURES, status);
        event.push_u8(page_number);
        event.push_u8(maximum_page_number);
        event.push_u64(features);
        event
    }

    /// Read BD_ADDR (7.4.6).
    pub fn read_bd_addr(status: u8, bd_addr: BdAddr) -> EventPacket {
        let mut event = EventPacket::complete_with_status(opcode::READ_BD_ADDR, status);
        event.push_bytes(bd_addr.as_bytes());
        event
    }

    /// Read Local Supported Codecs (7.4.8).
    pub fn read_local_supported_codecs(
        status: u8,
        supported_codecs: &[u8],
        vendor_specific_codecs: &[u32],
    ) -> EventPacket {
        let mut event =
            EventPacket::complete_with_status(opcode::READ_LOCAL_SUPPORTED_CODECS, status);
        event.push_u8(supported_codecs.len() as u8);
        event.push_bytes(supported_codecs);
        event.push_u8(vendor_specific_codecs.len() as u8);
        for codec in vendor_specific_codecs {
            event.push_u32(*codec);
        }
        event
    }

    /// Read Local Name (7.3.12): a 248-octet NUL-padded name.
    pub fn read_local_name(status: u8, name: &[u8]) -> EventPacket {
        let mut event = EventPacket::complete_with_status(opcode::READ_LOCAL_NAME, status);
        event.push_padded(name, LOCAL_NAME_OCTETS);
        event
    }

    /// LE Read Buffer Size (7.8.2).
    pub fn le_read_buffer_size(
        status: u8,
        le_data_packet_length: u16,
        total_num_le_data_packets: u8,
    ) -> EventPacket {
        let mut event = EventPacket::complete_with_status(opcode::LE_READ_BUFFER_SIZE, status);
        event.push_u16(le_data_packet_length);
        event.push_u8(total_num_le_data_packets);
        event
    }

    /// LE Read Local Supported Features (7.8.3).
    pub fn le_read_local_supported_features(status: u8, features: u64) -> EventPacket {
        let mut event =
            EventPacket::complete_with_status(opcode::LE_READ_LOCAL_SUPPORTED_FEATURES, status);
        event.push_u64(features);
        event
    }

    /// LE Read White List Size (7.8.14).
    pub fn le_read_white_list_size(status: u8, white_list_size: u8) -> EventPacket {
        let mut event = EventPacket::complete_with_status(opcode::LE_READ_WHITE_LIST_SIZE, status);
        event.push_u8(white_list_size);
        event
    }

    /// LE Rand (7.8.23).
    pub fn le_rand(status: u8, random: u64) -> EventPacket {
        let mut event = EventPacket::complete_with_status(opcode::LE_RAND, status);
        event.push_u64(random);
        event
    }

    /// LE Read Supported States (7.8.27).
    pub fn le_read_supported_states(status: u8, states: u64) -> EventPacket {
        let mut event = EventPacket::complete_with_status(opcode::LE_READ_SUPPORTED_STATES, status);
        event.push_u64(states);
        event
    }

    /// Vendor LE Get Capabilities: status followed by the capability blob.
    pub fn le_vendor_capabilities(status: u8, capabilities: &[u8]) -> EventPacket {
        let mut event =
            EventPacket::complete_with_status(opcode::VENDOR_LE_GET_CAPABILITIES, status);
        event.push_bytes(capabilities);
        event
    }

    fn complete_with_status(opcode: OpCode, status: u8) -> EventPacket {
        EventPacket::command_complete_only_status(opcode, status)
    }
}

// ---------------------------------------------------------------------------
// Inquiry results
// ---------------------------------------------------------------------------

/// One discovered device, as reported in the inquiry result events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InquiryResult {
    pub bd_addr: BdAddr,
    pub page_scan_repetition_mode: u8,
    pub class_of_device: [u8; 3],
    pub clock_offset: u16,
    /// Only reported by the with-RSSI and extended shapes.
    pub rssi: i8,
}

/// Which inquiry result event a builder produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InquiryResultShape {
    /// Inquiry Result (7.7.2).
    Standard,
    /// Inquiry Result with RSSI (7.7.33).
    WithRssi,
}

impl InquiryResultShape {
    fn response_octets(self) -> usize {
        match self {
            InquiryResultShape::Standard => INQUIRY_RESULT_OCTETS,
            InquiryResultShape::WithRssi => INQUIRY_RESULT_WITH_RSSI_OCTETS,
        }
    }
}

/// Collects results for one multi-response inquiry event and serializes
/// them once, count first.
///
/// Responses are laid out one after another, the same way BlueZ and the
/// Linux kernel read them.
#[derive(Debug, Clone)]
pub struct InquiryResultBuilder {
    shape: InquiryResultShape,
    results: Vec<InquiryResult>,
}

impl InquiryResultBuilder {
    pub fn new(shape: InquiryResultShape) -> Self {
        InquiryResultBuilder {
            shape,
            results: Vec::new(),
        }
    }

    pub fn standard() -> Self {
        InquiryResultBuilder::new(InquiryResultShape::Standard)
    }

    pub fn with_rssi() -> Self {
        InquiryResultBuilder::new(InquiryResultShape::WithRssi)
    }

    /// Most responses one event of this shape can carry.
    pub fn capacity(&self) -> usize {
        ((MAX_PAYLOAD_OCTETS - 1) / self.shape.response_octets()).min(usize::from(u8::MAX))
    }

    /// Add a response. Returns `false`, leaving the builder unchanged, when
    /// the event is already full.
    pub fn push(&mut self, result: InquiryResult) -> bool {
        if self.results.len() >= self.capacity() {
            return false;
        }
        self.results.push(result);
        true
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn build(&self) -> EventPacket {
        let event_code = match self.shape {
            InquiryResultShape::Standard => code::INQUIRY_RESULT,
            InquiryResultShape::WithRssi => code::INQUIRY_RESULT_WITH_RSSI,
        };
        let mut event = EventPacket::new(event_code);
        // Bounded by capacity().
        event.push_u8(self.results.len() as u8);
        for r in &self.results {
            event.push_bytes(r.bd_addr.as_bytes());
            event.push_u8(r.page_scan_repetition_mode);
            match self.shape {
                InquiryResultShape::Standard => {
                    // Reserved (formerly page scan period and page scan mode).
                    event.push_u8(0);
                    event.push_u8(0);
                    event.push_bytes(&r.class_of_device);
                    event.push_u16(r.clock_offset);
                }
                InquiryResultShape::WithRssi => {
                    event.push_u8(0);
                    event.push_bytes(&r.class_of_device);
                    event.push_u16(r.clock_offset);
                    event.push_u8(r.rssi as u8);
                }
            }
        }
        event
    }
}

/// One entry of an LE Advertising Report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeAdvertisingReport {
    /// 0x00 ADV_IND .. 0x04 SCAN_RSP.
    pub event_type: u8,
    /// 0x00 public, 0x01 random.
    pub address_type: u8,
    pub address: BdAddr,
    pub data: Vec<u8>,
    pub rssi: i8,
}
