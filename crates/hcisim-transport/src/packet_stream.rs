//! Blocking HCI frame I/O over a byte stream.
//!
//! These functions speak the UART framing on anything implementing
//! [`Read`] or [`Write`]. They block, so callers only use them once the
//! descriptor is known to be readable (from an FD-watcher callback) or on a
//! thread that may block.
//!
//! Any error here leaves the stream at an unknown offset. The caller treats
//! it as a desynchronized link and stops reading.

use std::io::{ErrorKind, Read, Write};

use tracing::trace;

use hcisim_core::command::CommandPacket;
use hcisim_core::error::{Error, Result};
use hcisim_core::event::EventPacket;
use hcisim_core::packet::PacketType;

/// ACL data header: handle and flags (2), data length (2).
const ACL_HEADER_SIZE: usize = 4;

/// SCO data header: handle and flags (2), data length (1).
const SCO_HEADER_SIZE: usize = 3;

/// Read the packet type octet that starts every frame.
///
/// Only types a host may send (command, ACL, SCO) are accepted. A clean
/// end of stream before the octet is [`Error::ConnectionLost`].
pub fn receive_packet_type<R: Read>(reader: &mut R) -> Result<PacketType> {
    let mut octet = [0u8; 1];
    match read_full(reader, &mut octet) {
        Err(Error::ShortRead { got: 0, .. }) => return Err(Error::ConnectionLost),
        other => other?,
    }
    let packet_type = PacketType::try_from(octet[0])?;
    if !packet_type.is_host_to_controller() {
        return Err(Error::InvalidPacketType(octet[0]));
    }
    Ok(packet_type)
}

/// Read the header and parameters of a command frame.
pub fn receive_command<R: Read>(reader: &mut R) -> Result<CommandPacket> {
    let mut header = [0u8; CommandPacket::HEADER_SIZE];
    read_full(reader, &mut header)?;
    let mut payload = vec![0u8; usize::from(header[2])];
    read_full(reader, &mut payload)?;
    trace!(header = ?header, payload = ?payload, "command frame received");
    CommandPacket::from_parts(&header, &payload)
}

/// Consume one ACL or SCO frame so the stream stays aligned.
///
/// Returns the number of data octets dropped.
pub fn skip_data_packet<R: Read>(reader: &mut R, packet_type: PacketType) -> Result<usize> {
    let len = match packet_type {
        PacketType::Acl => {
            let mut header = [0u8; ACL_HEADER_SIZE];
            read_full(reader, &mut header)?;
            usize::from(u16::from_le_bytes([header[2], header[3]]))
        }
        PacketType::Sco => {
            let mut header = [0u8; SCO_HEADER_SIZE];
            read_full(reader, &mut header)?;
            usize::from(header[2])
        }
        other => {
            return Err(Error::Framing(format!(
                "{other:?} is not a data packet type"
            )));
        }
    };
    let mut payload = vec![0u8; len];
    read_full(reader, &mut payload)?;
    Ok(len)
}

/// Write one event frame with a single `write_all`.
pub fn send_event<W: Write>(event: &EventPacket, writer: &mut W) -> Result<()> {
    let bytes = event.to_bytes();
    trace!(bytes = ?bytes, "event frame sent");
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Fill `buf` completely or fail with [`Error::ShortRead`].
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut got = 0;
    while got < buf.len() {
        match reader.read(&mut buf[got..]) {
            Ok(0) => {
                return Err(Error::ShortRead {
                    expected: buf.len(),
                    got,
                });
            }
            Ok(n) => got += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(())
}
