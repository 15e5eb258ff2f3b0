//! Base HCI frame representation.
//!
//! Every frame on the HCI UART transport has the same outer shape:
//!
//! ```text
//! [type:1] [header fields...] [param_len] [payload...]
//! ```
//!
//! [`Packet`] stores the fixed header fields separately from the payload and
//! reconstructs the length octet from the payload size whenever the frame is
//! serialized, so the length can never disagree with the data that follows.
//! [`CommandPacket`](crate::command::CommandPacket) and
//! [`EventPacket`](crate::event::EventPacket) wrap a `Packet` with typed
//! accessors for their header fields.

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};

/// Largest payload a one-octet length field can describe.
pub const MAX_PAYLOAD_OCTETS: usize = 255;

/// HCI UART packet indicator, the first octet of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Host-to-controller command.
    Command = 0x01,
    /// Asynchronous connection-oriented data.
    Acl = 0x02,
    /// Synchronous connection-oriented data.
    Sco = 0x03,
    /// Controller-to-host event.
    Event = 0x04,
}

impl PacketType {
    /// Returns `true` for the types a host is allowed to send to the
    /// controller (command, ACL, SCO).
    pub fn is_host_to_controller(self) -> bool {
        matches!(self, PacketType::Command | PacketType::Acl | PacketType::Sco)
    }
}

impl TryFrom<u8> for PacketType {
    type Error = Error;

    fn try_from(octet: u8) -> Result<Self> {
        match octet {
            0x01 => Ok(PacketType::Command),
            0x02 => Ok(PacketType::Acl),
            0x03 => Ok(PacketType::Sco),
            0x04 => Ok(PacketType::Event),
            other => Err(Error::InvalidPacketType(other)),
        }
    }
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> u8 {
        packet_type as u8
    }
}

/// An append-only HCI frame: type octet, fixed header fields, and payload.
///
/// The payload can only grow, and only up to [`MAX_PAYLOAD_OCTETS`]. Append
/// operations return `false` instead of growing past the limit; callers that
/// build packets from protocol constants treat that as a bug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    packet_type: PacketType,
    /// Header fields excluding the trailing length octet.
    header: Vec<u8>,
    payload: BytesMut,
}

impl Packet {
    /// Create an empty packet with the given fixed header fields.
    pub fn new(packet_type: PacketType, header: Vec<u8>) -> Self {
        Packet {
            packet_type,
            header,
            payload: BytesMut::with_capacity(MAX_PAYLOAD_OCTETS),
        }
    }

    /// Create a packet with header fields and an initial payload.
    ///
    /// Fails with [`Error::PayloadOverflow`] if the payload is too large.
    pub fn with_payload(packet_type: PacketType, header: Vec<u8>, payload: &[u8]) -> Result<Self> {
        let mut packet = Packet::new(packet_type, header);
        if !packet.add_payload_bytes(payload) {
            return Err(Error::PayloadOverflow {
                size: payload.len(),
                max: MAX_PAYLOAD_OCTETS,
            });
        }
        Ok(packet)
    }

    /// The packet type octet.
    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// Fixed header fields, excluding the length octet.
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    /// Size of the header on the wire, including the length octet.
    pub fn header_size(&self) -> usize {
        self.header.len() + 1
    }

    /// The payload (event or command parameters).
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of payload octets.
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }

    /// Size of the whole frame: type octet, header, and payload.
    pub fn packet_size(&self) -> usize {
        1 + self.header_size() + self.payload_size()
    }

    /// Largest frame this packet may grow to.
    pub fn max_packet_size(&self) -> usize {
        1 + self.header_size() + MAX_PAYLOAD_OCTETS
    }

    /// Append the low `octets` bytes of `value`, little-endian.
    ///
    /// Returns `false` and leaves the packet unchanged if `value` does not fit
    /// in `octets` bytes or the payload would exceed [`MAX_PAYLOAD_OCTETS`].
    pub fn add_payload_octets(&mut self, octets: usize, value: u64) -> bool {
        if octets > 8 {
            return false;
        }
        if octets < 8 && value >> (8 * octets) != 0 {
            return false;
        }
        if self.payload.len() + octets > MAX_PAYLOAD_OCTETS {
            return false;
        }
        self.payload.put_slice(&value.to_le_bytes()[..octets]);
        true
    }

    pub fn add_payload_octets1(&mut self, value: u8) -> bool {
        self.add_payload_octets(1, value.into())
    }

    pub fn add_payload_octets2(&mut self, value: u16) -> bool {
        self.add_payload_octets(2, value.into())
    }

    pub fn add_payload_octets3(&mut self, value: u32) -> bool {
        self.add_payload_octets(3, value.into())
    }

    pub fn add_payload_octets4(&mut self, value: u32) -> bool {
        self.add_payload_octets(4, value.into())
    }

    pub fn add_payload_octets6(&mut self, value: u64) -> bool {
        self.add_payload_octets(6, value)
    }

    pub fn add_payload_octets8(&mut self, value: u64) -> bool {
        self.add_payload_octets(8, value)
    }

    /// Append raw bytes verbatim.
    ///
    /// Returns `false` and leaves the packet unchanged on overflow.
    pub fn add_payload_bytes(&mut self, bytes: &[u8]) -> bool {
        if self.payload.len() + bytes.len() > MAX_PAYLOAD_OCTETS {
            return false;
        }
        self.payload.put_slice(bytes);
        true
    }

    /// Increment the payload octet at `index` by one, wrapping at 0xFF.
    ///
    /// Returns `false` if `index` is out of range.
    pub fn increment_payload_counter(&mut self, index: usize) -> bool {
        match self.payload.get_mut(index) {
            Some(counter) => {
                *counter = counter.wrapping_add(1);
                true
            }
            None => false,
        }
    }

    /// Increment the payload octet at `index` unless it already equals
    /// `max_val`.
    ///
    /// Returns `false` if `index` is out of range or the counter is saturated.
    pub fn increment_payload_counter_max(&mut self, index: usize, max_val: u8) -> bool {
        match self.payload.get_mut(index) {
            Some(counter) if *counter < max_val => {
                *counter += 1;
                true
            }
            _ => false,
        }
    }

    /// Serialize to wire bytes: `[type][header][len][payload]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.packet_size());
        buf.put_u8(self.packet_type.into());
        buf.put_slice(&self.header);
        // Bounded by MAX_PAYLOAD_OCTETS on every append.
        buf.put_u8(self.payload.len() as u8);
        buf.put_slice(&self.payload);
        buf.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_type_from_octet() {
        assert_eq!(PacketType::try_from(0x01).unwrap(), PacketType::Command);
        assert_eq!(PacketType::try_from(0x02).unwrap(), PacketType::Acl);
        assert_eq!(PacketType::try_from(0x03).unwrap(), PacketType::Sco);
        assert_eq!(PacketType::try_from(0x04).unwrap(), PacketType::Event);
    }

    #[test]
    fn packet_type_rejects_unknown_octets() {
        for octet in [0x00, 0x05, 0x7F, 0xFF] {
            match PacketType::try_from(octet) {
                Err(Error::InvalidPacketType(o)) => assert_eq!(o, octet),
                other => panic!("expected InvalidPacketType, got {:?}", other),
            }
        }
    }

    #[test]
    fn host_to_controller_types() {
        assert!(PacketType::Command.is_host_to_controller());
        assert!(PacketType::Acl.is_host_to_controller());
        assert!(PacketType::Sco.is_host_to_controller());
        assert!(!PacketType::Event.is_host_to_controller());
    }

    #[test]
    fn empty_packet_sizes() {
        let packet = Packet::new(PacketType::Event, vec![0x0E]);
        assert_eq!(packet.header_size(), 2);
        assert_eq!(packet.payload_size(), 0);
        assert_eq!(packet.packet_size(), 3);
        assert_eq!(packet.max_packet_size(), 258);
        assert_eq!(packet.to_bytes(), vec![0x04, 0x0E, 0x00]);
    }

    #[test]
    fn add_payload_octets_little_endian() {
        let mut packet = Packet::new(PacketType::Event, vec![0x0E]);
        assert!(packet.add_payload_octets1(0xAB));
        assert!(packet.add_payload_octets2(0x0C03));
        assert!(packet.add_payload_octets3(0x9E8B33));
        assert!(packet.add_payload_octets4(0x0102_0304));
        assert!(packet.add_payload_octets6(0x0605_0403_0201));
        assert_eq!(
            packet.payload(),
            &[
                0xAB, 0x03, 0x0C, 0x33, 0x8B, 0x9E, 0x04, 0x03, 0x02, 0x01, 0x01, 0x02, 0x03,
                0x04, 0x05, 0x06
            ]
        );
    }

    #[test]
    fn add_payload_octets_rejects_values_too_wide() {
        let mut packet = Packet::new(PacketType::Event, vec![0x0E]);
        assert!(!packet.add_payload_octets(1, 0x100));
        assert!(!packet.add_payload_octets(3, 0x0100_0000));
        assert!(!packet.add_payload_octets(9, 0));
        assert_eq!(packet.payload_size(), 0);
        assert!(packet.add_payload_octets8(u64::MAX));
        assert_eq!(packet.payload(), &[0xFF; 8]);
    }

    #[test]
    fn add_payload_stops_at_maximum() {
        let mut packet = Packet::new(PacketType::Event, vec![0x0E]);
        assert!(packet.add_payload_bytes(&[0u8; 254]));
        assert!(!packet.add_payload_octets2(0x1234));
        assert_eq!(packet.payload_size(), 254);
        assert!(packet.add_payload_octets1(0x01));
        assert!(!packet.add_payload_octets1(0x01));
        assert!(!packet.add_payload_bytes(&[0x00]));
        assert_eq!(packet.payload_size(), MAX_PAYLOAD_OCTETS);
        assert_eq!(packet.packet_size(), packet.max_packet_size());
    }

    #[test]
    fn with_payload_rejects_oversized() {
        let result = Packet::with_payload(PacketType::Command, vec![0x03, 0x0C], &[0u8; 256]);
        assert!(matches!(
            result,
            Err(Error::PayloadOverflow { size: 256, max: 255 })
        ));
    }

    #[test]
    fn increment_payload_counter_wraps() {
        let mut packet = Packet::new(PacketType::Event, vec![0x02]);
        packet.add_payload_octets1(0xFE);
        assert!(packet.increment_payload_counter(0));
        assert_eq!(packet.payload()[0], 0xFF);
        assert!(packet.increment_payload_counter(0));
        assert_eq!(packet.payload()[0], 0x00);
        assert!(!packet.increment_payload_counter(1));
    }

    #[test]
    fn increment_payload_counter_saturates_at_max() {
        let mut packet = Packet::new(PacketType::Event, vec![0x02]);
        packet.add_payload_octets1(0);
        assert!(packet.increment_payload_counter_max(0, 2));
        assert!(packet.increment_payload_counter_max(0, 2));
        assert!(!packet.increment_payload_counter_max(0, 2));
        assert_eq!(packet.payload()[0], 2);
        assert!(!packet.increment_payload_counter_max(5, 2));
    }

    #[test]
    fn to_bytes_reconstructs_length() {
        let packet = Packet::with_payload(
            PacketType::Command,
            vec![0x01, 0x04],
            &[0x33, 0x8B, 0x9E, 0x01, 0x00],
        )
        .unwrap();
        assert_eq!(
            packet.to_bytes(),
            vec![0x01, 0x01, 0x04, 0x05, 0x33, 0x8B, 0x9E, 0x01, 0x00]
        );
    }
}
