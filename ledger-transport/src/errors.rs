use ledger_apdu::{APDUAnswerError, APDUCommandError};
use thiserror::Error;

use crate::ExchangeError;

/// Errors raised while wrapping or unwrapping framed packets
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Packet size leaves no room for the frame header
    #[error("packet size {0} cannot hold a frame header")]
    InvalidPacketSize(usize),
    /// The serialized APDU does not fit the 16-bit length prefix
    #[error("APDU too long to frame: {0} bytes")]
    CommandTooLong(usize),
    /// The device accepted fewer bytes than a full packet
    #[error("USB write error. Could not send whole message ({written} of {expected} bytes)")]
    ShortWrite { written: usize, expected: usize },
    /// The packet is too short to carry its header
    #[error("USB read error. Incomplete header")]
    IncompleteHeader,
    /// The packet belongs to another channel
    #[error("Invalid channel: expected {expected:#06x}, received {received:#06x}")]
    InvalidChannel { expected: u16, received: u16 },
    /// The packet does not carry an APDU tag
    #[error("Invalid tag: {0:#04x}")]
    InvalidTag(u8),
    /// Packets arrived out of order
    #[error("Invalid sequence index: expected {expected}, received {received}")]
    InvalidSequence { expected: u16, received: u16 },
    /// No further packet arrived before the declared length was reached
    #[error("lost connection")]
    LostConnection,
    /// The command could not be serialized
    #[error(transparent)]
    Command(#[from] APDUCommandError),
    /// The reassembled bytes are not an APDU answer
    #[error("invalid APDU answer: {0}")]
    Answer(#[from] APDUAnswerError),
}

impl FramingError {
    /// True when the link itself failed, as opposed to malformed data
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            FramingError::ShortWrite { .. } | FramingError::LostConnection
        )
    }
}

impl ExchangeError for FramingError {
    fn is_invalid_answer(&self) -> bool {
        matches!(self, FramingError::Answer(_))
    }
}
