use ledger_transport::ExchangeError;
use thiserror::Error;

use crate::version::VersionInfo;

/// Errors shared by every app built on this crate
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum LedgerAppError<E: std::error::Error> {
    /// Transport failed or the packet stream ended early
    #[error("Transport | {0}")]
    TransportError(#[from] E),

    /// Status word other than 0x9000 with a known meaning
    #[error("App Error: | {0:#06x} {1}")]
    AppSpecific(u16, String),

    /// Status word other than 0x9000 without a known meaning
    #[error("Unknown error: {0:#06x}")]
    Unknown(u16),

    /// Diagnostic text the app placed in the answer of a failed command
    #[error("{1}")]
    Diagnostic(u16, String),

    /// The device answered with bytes that are not an APDU answer
    #[error("invalid answer | {0}")]
    InvalidAnswer(#[source] E),

    /// Answer shorter than the command requires
    #[error("response too short: {actual} bytes (expected at least {expected})")]
    InvalidResponseLength { expected: usize, actual: usize },

    #[error("received no signature back")]
    NoSignature,

    #[error("message cannot be empty")]
    InvalidEmptyMessage,

    /// Payload needs more packets than a single-byte packet count allows
    #[error("message size is invalid (too big)")]
    InvalidMessageSize,

    #[error("only values of SIGN_MODE_LEGACY_AMINO (P2=0) and SIGN_MODE_TEXTUAL (P2=1) are allowed, got {0}")]
    InvalidSignMode(u8),

    #[error("App version {0} is not supported")]
    UnsupportedVersion(u8),

    #[error("App Version required {required} - Version found: {found}")]
    VersionTooOld {
        found: VersionInfo,
        required: VersionInfo,
    },

    /// A version dependent command ran before the version was queried
    #[error("app version has not been retrieved yet")]
    MissingVersion,

    #[error("are you sure the app is open?")]
    AppNotOpen,
}

impl<E: std::error::Error> LedgerAppError<E> {
    /// The underlying link failed
    pub fn is_transport_error(&self) -> bool {
        matches!(self, LedgerAppError::TransportError(_))
    }

    /// Rejected before anything was sent to the device
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            LedgerAppError::InvalidEmptyMessage
                | LedgerAppError::InvalidMessageSize
                | LedgerAppError::InvalidSignMode(_)
        )
    }

    /// The app on the device cannot be driven by this library
    pub fn is_version_error(&self) -> bool {
        matches!(
            self,
            LedgerAppError::UnsupportedVersion(_)
                | LedgerAppError::VersionTooOld { .. }
                | LedgerAppError::MissingVersion
                | LedgerAppError::AppNotOpen
        )
    }

    /// Status word reported by the device, if this is a status failure
    pub fn status_code(&self) -> Option<u16> {
        match self {
            LedgerAppError::AppSpecific(code, _)
            | LedgerAppError::Unknown(code)
            | LedgerAppError::Diagnostic(code, _) => Some(*code),
            _ => None,
        }
    }

    /// Readable explanation for the JSON parser errors the apps report
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            LedgerAppError::Diagnostic(_, text) => parser_error_hint(text),
            _ => None,
        }
    }
}

impl<E: ExchangeError> LedgerAppError<E> {
    /// Wrap a failed exchange, keeping malformed answers apart from link failures
    pub fn from_exchange(err: E) -> Self {
        if err.is_invalid_answer() {
            LedgerAppError::InvalidAnswer(err)
        } else {
            LedgerAppError::TransportError(err)
        }
    }
}

/// Translate a JSMN parser diagnostic into plain words
pub fn parser_error_hint(diagnostic: &str) -> Option<&'static str> {
    match diagnostic {
        "ERROR: JSMN_ERROR_NOMEM" => Some("Not enough tokens were provided"),
        "PARSER ERROR: JSMN_ERROR_INVAL" => Some("Unexpected character in JSON string"),
        "PARSER ERROR: JSMN_ERROR_PART" => Some("The JSON string is not a complete."),
        _ => None,
    }
}
