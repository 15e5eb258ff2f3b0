//! Controller state enums and the fake peer devices it reports.

use std::fmt;

use hcisim_core::address::BdAddr;
use hcisim_core::command::EXTENDED_INQUIRY_RESPONSE_OCTETS;
use hcisim_core::event::{InquiryResult, LeAdvertisingReport};

/// Link-layer activity of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Standby,
    /// BR/EDR inquiry in progress.
    Inquiry,
    /// LE scanning enabled.
    Scanning,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Standby => write!(f, "standby"),
            LinkState::Inquiry => write!(f, "inquiry"),
            LinkState::Scanning => write!(f, "scanning"),
        }
    }
}

/// Which event shape inquiry results use (Write Inquiry Mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum InquiryMode {
    #[default]
    Standard = 0x00,
    Rssi = 0x01,
    Extended = 0x02,
}

impl TryFrom<u8> for InquiryMode {
    type Error = u8;

    fn try_from(mode: u8) -> Result<Self, u8> {
        match mode {
            0x00 => Ok(InquiryMode::Standard),
            0x01 => Ok(InquiryMode::Rssi),
            0x02 => Ok(InquiryMode::Extended),
            other => Err(other),
        }
    }
}

/// Fault injection set from the test channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestChannelState {
    #[default]
    None,
    /// Every HCI command is swallowed.
    TimeoutAll,
    /// Every event is posted with the configured delay.
    DelayedResponse,
}

/// A remote device the controller pretends to see over the air.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakePeer {
    pub address: BdAddr,
    pub name: Vec<u8>,
    pub class_of_device: [u8; 3],
    pub page_scan_repetition_mode: u8,
    pub clock_offset: u16,
    pub rssi: i8,
}

/// AD type for a complete local name.
const COMPLETE_LOCAL_NAME: u8 = 0x09;

/// Largest advertising data an LE report carries.
const MAX_ADVERTISING_DATA_OCTETS: usize = 31;

impl FakePeer {
    /// A peer with the given address and name and otherwise default radio
    /// parameters.
    pub fn new(address: BdAddr, name: impl Into<Vec<u8>>) -> Self {
        FakePeer {
            address,
            name: name.into(),
            class_of_device: [1, 2, 3],
            page_scan_repetition_mode: 0,
            clock_offset: 0x0201,
            rssi: 0,
        }
    }

    pub fn inquiry_result(&self) -> InquiryResult {
        InquiryResult {
            bd_addr: self.address,
            page_scan_repetition_mode: self.page_scan_repetition_mode,
            class_of_device: self.class_of_device,
            clock_offset: self.clock_offset,
            rssi: self.rssi,
        }
    }

    /// The peer's name as a complete-local-name data structure, `limit`
    /// octets at most.
    fn name_structure(&self, limit: usize) -> Vec<u8> {
        let name_len = self
            .name
            .len()
            .min(limit.saturating_sub(2))
            .min(usize::from(u8::MAX) - 1);
        let mut data = Vec::with_capacity(name_len + 2);
        data.push(name_len as u8 + 1);
        data.push(COMPLETE_LOCAL_NAME);
        data.extend_from_slice(&self.name[..name_len]);
        data
    }

    /// Extended inquiry response data carrying the name.
    pub fn extended_inquiry_response(&self) -> Vec<u8> {
        self.name_structure(EXTENDED_INQUIRY_RESPONSE_OCTETS)
    }

    pub fn advertising_report(&self) -> LeAdvertisingReport {
        LeAdvertisingReport {
            // ADV_IND from a public address.
            event_type: 0x00,
            address_type: 0x00,
            address: self.address,
            data: self.name_structure(MAX_ADVERTISING_DATA_OCTETS),
            rssi: self.rssi,
        }
    }
}

impl Default for FakePeer {
    /// The one device every controller starts out seeing.
    fn default() -> Self {
        FakePeer::new(BdAddr([6, 5, 4, 3, 2, 1]), b"FooBar".to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_peer_eir_carries_its_name() {
        let eir = FakePeer::default().extended_inquiry_response();
        assert_eq!(eir, vec![7, 0x09, b'F', b'o', b'o', b'B', b'a', b'r']);
    }

    #[test]
    fn advertising_data_is_cut_to_31_octets() {
        let peer = FakePeer::new(BdAddr::default(), vec![b'n'; 64]);
        let report = peer.advertising_report();
        assert_eq!(report.data.len(), 31);
        assert_eq!(report.data[0], 30);
    }

    #[test]
    fn inquiry_mode_from_octet() {
        assert_eq!(InquiryMode::try_from(0x02), Ok(InquiryMode::Extended));
        assert_eq!(InquiryMode::try_from(0x03), Err(0x03));
    }

    #[test]
    fn link_state_display() {
        assert_eq!(LinkState::Inquiry.to_string(), "inquiry");
    }
}
