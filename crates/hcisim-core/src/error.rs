//! Error types for hcisim.
//!
//! All fallible operations across the emulator return [`Result<T>`], which
//! uses [`Error`] as the error type. Framing failures on the HCI byte stream,
//! scheduler registration failures, and plain I/O errors are all captured
//! here.

/// The error type for all hcisim operations.
///
/// Framing errors leave the HCI link desynchronized: the transport that hits
/// one stops reading and never tries to resynchronize, the same way a wedged
/// controller behaves on a real UART.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A frame could not be assembled (bad header, length mismatch).
    #[error("framing error: {0}")]
    Framing(String),

    /// The packet type octet is outside the range the host may send.
    #[error("invalid packet type octet: 0x{0:02X}")]
    InvalidPacketType(u8),

    /// The stream ended before a complete frame was read.
    #[error("short read: expected {expected} octets, got {got}")]
    ShortRead {
        /// Octets required to complete the read.
        expected: usize,
        /// Octets actually available before end of stream.
        got: usize,
    },

    /// Appending to a payload would exceed the maximum packet size.
    #[error("payload overflow: {size} octets exceeds maximum of {max}")]
    PayloadOverflow {
        /// Payload size the caller attempted to build.
        size: usize,
        /// Maximum payload size for the packet type.
        max: usize,
    },

    /// A file descriptor could not be watched for readability.
    #[error("watch error: {0}")]
    Watch(String),

    /// A transport-level error (socket setup, listener bind).
    #[error("transport error: {0}")]
    Transport(String),

    /// The peer closed the connection.
    #[error("connection lost")]
    ConnectionLost,

    /// The async manager has been shut down.
    #[error("async manager shut down")]
    Shutdown,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_framing() {
        let e = Error::Framing("header too short".into());
        assert_eq!(e.to_string(), "framing error: header too short");
    }

    #[test]
    fn error_display_invalid_packet_type() {
        let e = Error::InvalidPacketType(0x04);
        assert_eq!(e.to_string(), "invalid packet type octet: 0x04");
    }

    #[test]
    fn error_display_short_read() {
        let e = Error::ShortRead {
            expected: 3,
            got: 1,
        };
        assert_eq!(e.to_string(), "short read: expected 3 octets, got 1");
    }

    #[test]
    fn error_display_payload_overflow() {
        let e = Error::PayloadOverflow {
            size: 256,
            max: 255,
        };
        assert_eq!(
            e.to_string(),
            "payload overflow: 256 octets exceeds maximum of 255"
        );
    }

    #[test]
    fn error_display_watch() {
        let e = Error::Watch("fd 7 is already watched".into());
        assert_eq!(e.to_string(), "watch error: fd 7 is already watched");
    }

    #[test]
    fn error_display_connection_lost() {
        assert_eq!(Error::ConnectionLost.to_string(), "connection lost");
    }

    #[test]
    fn error_display_shutdown() {
        assert_eq!(Error::Shutdown.to_string(), "async manager shut down");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
