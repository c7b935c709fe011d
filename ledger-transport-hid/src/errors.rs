use ledger_transport::{ExchangeError, FramingError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerHIDError {
    /// Device not found error
    #[error("Ledger device not found")]
    DeviceNotFound,
    /// Communication error
    #[error("Ledger device: communication error `{0}`")]
    Comm(&'static str),
    /// Packet framing error
    #[error("Ledger device: {0}")]
    Framing(#[from] FramingError),
    /// HID error
    #[error("Ledger device: HID error {0}")]
    Hid(#[from] hidapi::HidError),
}

impl LedgerHIDError {
    /// True when the USB link failed rather than the data being malformed
    pub fn is_connection_error(&self) -> bool {
        match self {
            LedgerHIDError::DeviceNotFound | LedgerHIDError::Hid(_) => true,
            LedgerHIDError::Framing(e) => e.is_connection_error(),
            LedgerHIDError::Comm(_) => false,
        }
    }
}

impl ExchangeError for LedgerHIDError {
    fn is_invalid_answer(&self) -> bool {
        matches!(self, LedgerHIDError::Framing(e) if e.is_invalid_answer())
    }
}
