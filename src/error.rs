//! Error taxonomy for the relay.
//!
//! `ConnectionClosed` is the expected end of a session, not a failure;
//! everything else marks a condition a caller has to react to.

use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug)]
pub enum RelayError {
    /// The peer closed its stream before a complete protocol unit arrived.
    ConnectionClosed,
    /// A declared byte span ended before its full length was delivered.
    TruncatedTransfer,
    /// The addressed display name has no live connection.
    RecipientNotConnected(String),
    /// A protocol unit was fully consumed but could not be interpreted.
    /// The stream is still at a frame boundary, so the session survives.
    MalformedCommand(String),
    /// Any other socket or filesystem failure.
    Io(io::Error),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::ConnectionClosed => write!(f, "connection closed by peer"),
            RelayError::TruncatedTransfer => {
                write!(f, "stream ended before the declared length was delivered")
            }
            RelayError::RecipientNotConnected(name) => {
                write!(f, "User {} is not connected.", name)
            }
            RelayError::MalformedCommand(reason) => write!(f, "malformed command: {}", reason),
            RelayError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RelayError {
    fn from(err: io::Error) -> Self {
        // read_exact reports a mid-frame close as UnexpectedEof
        if err.kind() == io::ErrorKind::UnexpectedEof {
            RelayError::ConnectionClosed
        } else {
            RelayError::Io(err)
        }
    }
}
