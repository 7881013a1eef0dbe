//! Error types for flexlib.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. The parse/dispatch core itself never
//! aborts a connection; these errors surface from codec functions (so the
//! caller can drop the offending line or datagram) and from the transport
//! adapter.

/// The error type for all flexlib operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (TCP socket, UDP socket).
    #[error("transport error: {0}")]
    Transport(String),

    /// A text protocol line that could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A VITA-49 datagram that could not be decoded.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// The radio rejected a command with a non-zero response code.
    #[error("command failed with code {code}: {message}")]
    CommandFailed {
        /// Hex response code as sent by the radio.
        code: String,
        /// Reply text accompanying the code (may be empty).
        message: String,
    },

    /// Timed out waiting for the radio.
    #[error("timeout waiting for response")]
    Timeout,

    /// An invalid parameter was passed to a command builder or setter.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection to the radio has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the radio was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

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
    fn error_display_protocol() {
        let e = Error::Protocol("malformed reply".into());
        assert_eq!(e.to_string(), "protocol error: malformed reply");
    }

    #[test]
    fn error_display_malformed_packet() {
        let e = Error::MalformedPacket("too short".into());
        assert_eq!(e.to_string(), "malformed packet: too short");
    }

    #[test]
    fn error_display_command_failed() {
        let e = Error::CommandFailed {
            code: "50000015".into(),
            message: "Invalid slice".into(),
        };
        assert_eq!(
            e.to_string(),
            "command failed with code 50000015: Invalid slice"
        );
    }

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for response");
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
