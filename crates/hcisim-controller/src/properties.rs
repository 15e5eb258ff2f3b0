//! Fixed capabilities of the emulated controller.
//!
//! [`Properties`] answers every informational command (buffer sizes,
//! version, feature pages, supported commands) and seeds the defaults that
//! HCI Reset restores. It is built once, with the `with_*` setters, and
//! never changes after the controller is constructed.
//!
//! # Example
//!
//! ```
//! use hcisim_controller::Properties;
//! use hcisim_core::BdAddr;
//!
//! let props = Properties::default()
//!     .with_bd_addr(BdAddr([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]))
//!     .with_local_name("bench-controller");
//! assert_eq!(props.local_name(), b"bench-controller");
//! ```

use hcisim_core::address::BdAddr;
use hcisim_core::command::LOCAL_NAME_OCTETS;

/// Capability table of the emulated controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Properties {
    acl_data_packet_length: u16,
    sco_data_packet_length: u8,
    total_num_acl_data_packets: u16,
    total_num_sco_data_packets: u16,

    hci_version: u8,
    hci_revision: u16,
    lmp_version: u8,
    manufacturer_name: u16,
    lmp_subversion: u16,

    supported_commands: [u8; 64],
    /// Page 0 is the classic LMP feature mask.
    extended_features: Vec<u64>,
    bd_addr: BdAddr,
    local_name: Vec<u8>,
    class_of_device: [u8; 3],
    supported_codecs: Vec<u8>,
    vendor_specific_codecs: Vec<u32>,

    le_data_packet_length: u16,
    total_num_le_data_packets: u8,
    le_supported_features: u64,
    le_white_list_size: u8,
    le_supported_states: u64,
    le_vendor_capabilities: Vec<u8>,
}

impl Default for Properties {
    fn default() -> Self {
        Properties {
            acl_data_packet_length: 1024,
            sco_data_packet_length: 255,
            total_num_acl_data_packets: 10,
            total_num_sco_data_packets: 10,

            // Bluetooth 4.2.
            hci_version: 0x08,
            hci_revision: 0x0000,
            lmp_version: 0x08,
            // 0xFFFF is reserved for test devices.
            manufacturer_name: 0xFFFF,
            lmp_subversion: 0x0000,

            supported_commands: [0xFF; 64],
            extended_features: vec![u64::MAX],
            bd_addr: BdAddr([1, 2, 3, 4, 5, 6]),
            local_name: b"hcisim".to_vec(),
            class_of_device: [0, 0, 0],
            // CVSD and transparent.
            supported_codecs: vec![0x02, 0x03],
            vendor_specific_codecs: Vec::new(),

            le_data_packet_length: 27,
            total_num_le_data_packets: 15,
            le_supported_features: 0x1F,
            le_white_list_size: 15,
            le_supported_states: 0x0000_03FF_FFFF_FFFF,
            // max_advt_instances, offloaded_resolution_of_private_address,
            // total_scan_results_storage (2), max_irk_list_sz,
            // filtering_support, max_filter, activity_energy_info_support.
            le_vendor_capabilities: vec![0x05, 0x01, 0x00, 0x00, 0x10, 0x01, 0x10, 0x01],
        }
    }
}

impl Properties {
    // -----------------------------------------------------------------------
    // Builders
    // -----------------------------------------------------------------------

    pub fn with_bd_addr(mut self, bd_addr: BdAddr) -> Self {
        self.bd_addr = bd_addr;
        self
    }

    /// Set the name reported before any Write Local Name. Names longer than
    /// the 248-octet field are cut.
    pub fn with_local_name(mut self, name: impl AsRef<[u8]>) -> Self {
        let name = name.as_ref();
        self.local_name = name[..name.len().min(LOCAL_NAME_OCTETS)].to_vec();
        self
    }

    pub fn with_class_of_device(mut self, class_of_device: [u8; 3]) -> Self {
        self.class_of_device = class_of_device;
        self
    }

    pub fn with_buffer_size(
        mut self,
        acl_data_packet_length: u16,
        sco_data_packet_length: u8,
        total_num_acl_data_packets: u16,
        total_num_sco_data_packets: u16,
    ) -> Self {
        self.acl_data_packet_length = acl_data_packet_length;
        self.sco_data_packet_length = sco_data_packet_length;
        self.total_num_acl_data_packets = total_num_acl_data_packets;
        self.total_num_sco_data_packets = total_num_sco_data_packets;
        self
    }

    pub fn with_version(
        mut self,
        hci_version: u8,
        hci_revision: u16,
        lmp_version: u8,
        manufacturer_name: u16,
        lmp_subversion: u16,
    ) -> Self {
        self.hci_version = hci_version;
        self.hci_revision = hci_revision;
        self.lmp_version = lmp_version;
        self.manufacturer_name = manufacturer_name;
        self.lmp_subversion = lmp_subversion;
        self
    }

    pub fn with_supported_commands(mut self, supported_commands: [u8; 64]) -> Self {
        self.supported_commands = supported_commands;
        self
    }

    /// Set the LMP feature pages. An empty list leaves a single all-zero
    /// page 0.
    pub fn with_extended_features(mut self, pages: Vec<u64>) -> Self {
        self.extended_features = if pages.is_empty() { vec![0] } else { pages };
        self
    }

    pub fn with_supported_codecs(mut self, codecs: Vec<u8>, vendor_specific: Vec<u32>) -> Self {
        self.supported_codecs = codecs;
        self.vendor_specific_codecs = vendor_specific;
        self
    }

    pub fn with_le_buffer_size(mut self, data_packet_length: u16, total_num_packets: u8) -> Self {
        self.le_data_packet_length = data_packet_length;
        self.total_num_le_data_packets = total_num_packets;
        self
    }

    pub fn with_le_supported_features(mut self, features: u64) -> Self {
        self.le_supported_features = features;
        self
    }

    pub fn with_le_white_list_size(mut self, size: u8) -> Self {
        self.le_white_list_size = size;
        self
    }

    pub fn with_le_supported_states(mut self, states: u64) -> Self {
        self.le_supported_states = states;
        self
    }

    pub fn with_le_vendor_capabilities(mut self, capabilities: Vec<u8>) -> Self {
        self.le_vendor_capabilities = capabilities;
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn acl_data_packet_length(&self) -> u16 {
        self.acl_data_packet_length
    }

    pub fn sco_data_packet_length(&self) -> u8 {
        self.sco_data_packet_length
    }

    pub fn total_num_acl_data_packets(&self) -> u16 {
        self.total_num_acl_data_packets
    }

    pub fn total_num_sco_data_packets(&self) -> u16 {
        self.total_num_sco_data_packets
    }

    pub fn hci_version(&self) -> u8 {
        self.hci_version
    }

    pub fn hci_revision(&self) -> u16 {
        self.hci_revision
    }

    pub fn lmp_version(&self) -> u8 {
        self.lmp_version
    }

    pub fn manufacturer_name(&self) -> u16 {
        self.manufacturer_name
    }

    pub fn lmp_subversion(&self) -> u16 {
        self.lmp_subversion
    }

    pub fn supported_commands(&self) -> &[u8; 64] {
        &self.supported_commands
    }

    /// Page 0 of the LMP features.
    pub fn supported_features(&self) -> u64 {
        self.extended_features[0]
    }

    /// Highest valid feature page number.
    pub fn max_feature_page(&self) -> u8 {
        u8::try_from(self.extended_features.len() - 1).unwrap_or(u8::MAX)
    }

    /// The feature mask of `page`, or `None` past the last page.
    pub fn extended_features(&self, page: u8) -> Option<u64> {
        self.extended_features.get(usize::from(page)).copied()
    }

    pub fn bd_addr(&self) -> BdAddr {
        self.bd_addr
    }

    pub fn local_name(&self) -> &[u8] {
        &self.local_name
    }

    pub fn class_of_device(&self) -> [u8; 3] {
        self.class_of_device
    }

    pub fn supported_codecs(&self) -> &[u8] {
        &self.supported_codecs
    }

    pub fn vendor_specific_codecs(&self) -> &[u32] {
        &self.vendor_specific_codecs
    }

    pub fn le_data_packet_length(&self) -> u16 {
        self.le_data_packet_length
    }

    pub fn total_num_le_data_packets(&self) -> u8 {
        self.total_num_le_data_packets
    }

    pub fn le_supported_features(&self) -> u64 {
        self.le_supported_features
    }

    pub fn le_white_list_size(&self) -> u8 {
        self.le_white_list_size
    }

    pub fn le_supported_states(&self) -> u64 {
        self.le_supported_states
    }

    pub fn le_vendor_capabilities(&self) -> &[u8] {
        &self.le_vendor_capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_emulated_chip() {
        let props = Properties::default();
        assert_eq!(props.acl_data_packet_length(), 1024);
        assert_eq!(props.sco_data_packet_length(), 255);
        assert_eq!(props.total_num_acl_data_packets(), 10);
        assert_eq!(props.total_num_sco_data_packets(), 10);
        assert_eq!(props.bd_addr(), BdAddr([1, 2, 3, 4, 5, 6]));
        assert_eq!(props.supported_commands(), &[0xFF; 64]);
        assert_eq!(props.le_data_packet_length(), 27);
        assert_eq!(props.total_num_le_data_packets(), 15);
        assert_eq!(props.max_feature_page(), 0);
        assert_eq!(props.supported_features(), u64::MAX);
    }

    #[test]
    fn long_local_name_is_cut_to_field_size() {
        let props = Properties::default().with_local_name(vec![b'x'; 300]);
        assert_eq!(props.local_name().len(), LOCAL_NAME_OCTETS);
    }

    #[test]
    fn feature_pages() {
        let props = Properties::default().with_extended_features(vec![0x1, 0x2, 0x3]);
        assert_eq!(props.max_feature_page(), 2);
        assert_eq!(props.extended_features(1), Some(0x2));
        assert_eq!(props.extended_features(3), None);

        let empty = Properties::default().with_extended_features(vec![]);
        assert_eq!(empty.max_feature_page(), 0);
        assert_eq!(empty.supported_features(), 0);
    }

    #[test]
    fn builders_chain() {
        let props = Properties::default()
            .with_buffer_size(512, 64, 4, 2)
            .with_le_buffer_size(251, 8)
            .with_version(0x09, 1, 0x09, 0x00E0, 2);
        assert_eq!(props.acl_data_packet_length(), 512);
        assert_eq!(props.total_num_sco_data_packets(), 2);
        assert_eq!(props.le_data_packet_length(), 251);
        assert_eq!(props.hci_version(), 0x09);
        assert_eq!(props.manufacturer_name(), 0x00E0);
    }
}
