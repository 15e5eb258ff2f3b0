//! Bluetooth device addresses.

use std::fmt;
use std::str::FromStr;

/// A 48-bit Bluetooth device address (BD_ADDR).
///
/// Octets are stored in wire order (least significant first). `Display` and
/// `FromStr` use the conventional most-significant-first notation, so the
/// wire octets `01 02 03 04 05 06` print as `06:05:04:03:02:01`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    /// Wire octets, least significant first.
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Build from the first six octets of `bytes`, if there are that many.
    pub fn from_slice(bytes: &[u8]) -> Option<BdAddr> {
        let octets: [u8; 6] = bytes.get(..6)?.try_into().ok()?;
        Some(BdAddr(octets))
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[5], b[4], b[3], b[2], b[1], b[0]
        )
    }
}

/// Error returned when a string is not a valid `aa:bb:cc:dd:ee:ff` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBdAddrError(String);

impl fmt::Display for ParseBdAddrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid BD_ADDR: '{}'", self.0)
    }
}

impl std::error::Error for ParseBdAddrError {}

impl FromStr for BdAddr {
    type Err = ParseBdAddrError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 6 {
            return Err(ParseBdAddrError(s.to_string()));
        }
        let mut octets = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(ParseBdAddrError(s.to_string()));
            }
            octets[5 - i] =
                u8::from_str_radix(part, 16).map_err(|_| ParseBdAddrError(s.to_string()))?;
        }
        Ok(BdAddr(octets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_most_significant_first() {
        let addr = BdAddr([1, 2, 3, 4, 5, 6]);
        assert_eq!(addr.to_string(), "06:05:04:03:02:01");
    }

    #[test]
    fn parse_stores_wire_order() {
        let addr: BdAddr = "06:05:04:03:02:01".parse().unwrap();
        assert_eq!(addr, BdAddr([1, 2, 3, 4, 5, 6]));
        let lower: BdAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(lower.as_bytes(), &[0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA]);
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in [
            "",
            "01:02:03:04:05",
            "01:02:03:04:05:06:07",
            "0g:00:00:00:00:00",
            "1:2:3:4:5:6",
        ] {
            assert!(bad.parse::<BdAddr>().is_err(), "accepted {bad:?}");
        }
        let err = "nope".parse::<BdAddr>().unwrap_err();
        assert_eq!(err.to_string(), "invalid BD_ADDR: 'nope'");
    }

    #[test]
    fn from_slice_requires_six_octets() {
        assert_eq!(BdAddr::from_slice(&[1, 2, 3, 4, 5]), None);
        assert_eq!(
            BdAddr::from_slice(&[1, 2, 3, 4, 5, 6, 7]),
            Some(BdAddr([1, 2, 3, 4, 5, 6]))
        );
    }
}
