//! Mock HCI host for end-to-end testing over a real socket.
//!
//! [`MockHost`] wraps the host end of an HCI link. It writes command frames
//! the way a host stack would and reads back whole event frames, with a read
//! timeout so a missing event fails the test instead of hanging it.
//!
//! # Example
//!
//! ```no_run
//! use std::os::unix::net::UnixStream;
//! use hcisim_core::{CommandPacket, opcode};
//! use hcisim_test_harness::MockHost;
//!
//! # fn example(stream: UnixStream) -> hcisim_core::Result<()> {
//! let mut host = MockHost::new(stream)?;
//! host.send_command(&CommandPacket::new(opcode::RESET, &[])?)?;
//! let event = host.read_event()?;
//! assert_eq!(event.status(), Some(0x00));
//! # Ok(())
//! # }
//! ```

use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use tracing::trace;

use hcisim_core::command::CommandPacket;
use hcisim_core::error::{Error, Result};
use hcisim_core::event::EventPacket;
use hcisim_core::packet::PacketType;

/// Read timeout applied unless the test sets its own.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// The host side of an HCI socket.
#[derive(Debug)]
pub struct MockHost {
    stream: UnixStream,
    read_timeout: Duration,
    /// Every frame written, in order.
    sent_log: Vec<Vec<u8>>,
}

impl MockHost {
    /// Wrap a connected stream and apply [`DEFAULT_READ_TIMEOUT`].
    pub fn new(stream: UnixStream) -> Result<Self> {
        stream.set_read_timeout(Some(DEFAULT_READ_TIMEOUT))?;
        Ok(MockHost {
            stream,
            read_timeout: DEFAULT_READ_TIMEOUT,
            sent_log: Vec::new(),
        })
    }

    /// Change how long [`read_event`](Self::read_event) waits.
    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.read_timeout = timeout;
        Ok(())
    }

    /// Write a complete command frame.
    pub fn send_command(&mut self, command: &CommandPacket) -> Result<()> {
        self.send_raw(&command.to_bytes())
    }

    /// Write arbitrary bytes, framed or not.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        trace!(bytes = ?bytes, "mock host sending");
        self.stream.write_all(bytes)?;
        self.sent_log.push(bytes.to_vec());
        Ok(())
    }

    /// Return every frame written so far.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// Read one event frame.
    ///
    /// Fails with an I/O error if nothing arrives within the read timeout,
    /// and with [`Error::InvalidPacketType`] if the controller sends
    /// anything but an event.
    pub fn read_event(&mut self) -> Result<EventPacket> {
        let mut header = [0u8; 3];
        self.read_exact(&mut header)?;
        if header[0] != u8::from(PacketType::Event) {
            return Err(Error::InvalidPacketType(header[0]));
        }
        let mut params = vec![0u8; usize::from(header[2])];
        self.read_exact(&mut params)?;
        trace!(event_code = header[1], params = ?params, "mock host received event");
        Ok(EventPacket::from_params(header[1], &params))
    }

    /// Read one event frame and return its raw bytes.
    pub fn read_event_bytes(&mut self) -> Result<Vec<u8>> {
        Ok(self.read_event()?.to_bytes())
    }

    /// Succeed only if nothing arrives within `window`.
    pub fn expect_no_event(&mut self, window: Duration) -> Result<()> {
        self.stream.set_read_timeout(Some(window))?;
        let mut octet = [0u8; 1];
        let result = self.stream.read(&mut octet);
        self.stream.set_read_timeout(Some(self.read_timeout))?;
        match result {
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(()),
            Err(e) => Err(Error::Io(e)),
            Ok(0) => Err(Error::ConnectionLost),
            Ok(_) => Err(Error::Framing(format!(
                "unexpected data from controller: {:02X?}",
                octet
            ))),
        }
    }

    /// Whether the controller closed its end.
    pub fn is_closed_by_peer(&mut self) -> Result<bool> {
        let mut octet = [0u8; 1];
        match self.stream.read(&mut octet) {
            Ok(0) => Ok(true),
            Ok(_) => Ok(false),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => Error::ConnectionLost,
            _ => Error::Io(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcisim_core::opcode;

    fn pair() -> (MockHost, UnixStream) {
        let (a, b) = UnixStream::pair().unwrap();
        (MockHost::new(a).unwrap(), b)
    }

    #[test]
    fn send_command_writes_frame_and_logs_it() {
        let (mut host, mut controller) = pair();
        host.send_command(&CommandPacket::new(opcode::RESET, &[]).unwrap())
            .unwrap();

        let mut buf = [0u8; 4];
        controller.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0x01, 0x03, 0x0C, 0x00]);
        assert_eq!(host.sent_data(), &[vec![0x01, 0x03, 0x0C, 0x00]]);
    }

    #[test]
    fn read_event_parses_a_whole_frame() {
        let (mut host, mut controller) = pair();
        controller
            .write_all(&[0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00])
            .unwrap();

        let event = host.read_event().unwrap();
        assert_eq!(event.command_opcode(), Some(opcode::RESET));
        assert_eq!(event.status(), Some(0x00));
    }

    #[test]
    fn read_event_rejects_non_event_frames() {
        let (mut host, mut controller) = pair();
        controller.write_all(&[0x01, 0x03, 0x0C]).unwrap();
        assert!(matches!(
            host.read_event(),
            Err(Error::InvalidPacketType(0x01))
        ));
    }

    #[test]
    fn read_event_times_out() {
        let (mut host, _controller) = pair();
        host.set_read_timeout(Duration::from_millis(50)).unwrap();
        assert!(matches!(host.read_event(), Err(Error::Io(_))));
    }

    #[test]
    fn read_event_reports_hangup() {
        let (mut host, controller) = pair();
        drop(controller);
        assert!(matches!(host.read_event(), Err(Error::ConnectionLost)));
    }

    #[test]
    fn expect_no_event_passes_on_silence_and_fails_on_data() {
        let (mut host, mut controller) = pair();
        host.expect_no_event(Duration::from_millis(50)).unwrap();

        controller.write_all(&[0x04]).unwrap();
        assert!(host.expect_no_event(Duration::from_millis(50)).is_err());
    }
}
