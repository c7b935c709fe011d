use std::ops::Deref;

mod errors;
pub mod framing;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use errors::FramingError;
pub use framing::{exchange_framed, FramedTransport, PacketDevice, LEDGER_CHANNEL, LEDGER_PACKET_SIZE};
pub use ledger_apdu::{
    APDUAnswer, APDUAnswerError, APDUCommand, APDUCommandError, APDUErrorCode, MAX_DATA_LEN,
    SW_SUCCESS,
};

/// Error reported by an [`Exchange`] implementation
pub trait ExchangeError: std::error::Error {
    /// The device answered, but with bytes that do not form an APDU answer
    fn is_invalid_answer(&self) -> bool {
        false
    }
}

/// Use to talk to the ledger device
///
/// Every call blocks until the device answered or the transport gave up;
/// implementations never retry on their own.
pub trait Exchange {
    /// Error defined by Transport used
    type Error: ExchangeError;

    /// The concrete type containing the APDUAnswer
    type AnswerType: Deref<Target = [u8]>;

    /// Send a command with the given transport and retrieve an answer or a transport error
    fn exchange<I>(
        &self,
        command: &APDUCommand<I>,
    ) -> Result<APDUAnswer<Self::AnswerType>, Self::Error>
    where
        I: Deref<Target = [u8]>;
}
