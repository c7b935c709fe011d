// SPDX-License-Identifier: Apache-2.0

//! Error types for the Cosmos and THORChain applications

use ledger_device_base::LedgerAppError;
use thiserror::Error;

/// Cosmos application specific errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CosmosAppError<E: std::error::Error> {
    /// Error from the underlying transport/device
    #[error("{0}")]
    Transport(#[from] LedgerAppError<E>),

    /// Invalid BIP32 derivation path
    #[error("Invalid BIP32 path: {0}")]
    InvalidBip32Path(String),

    /// Human readable part rejected before sending
    #[error("Invalid HRP: {0}")]
    InvalidHrp(String),

    /// Command payload does not fit a single APDU
    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Feature not supported by the selected app family
    #[error("Feature not supported: {0}")]
    FeatureNotSupported(String),

    /// Invalid response data from device
    #[error("Invalid response data: {0}")]
    InvalidResponseData(String),
}

impl<E: std::error::Error> CosmosAppError<E> {
    /// Check if error is due to transport/communication issues
    pub fn is_transport_error(&self) -> bool {
        matches!(self, CosmosAppError::Transport(err) if err.is_transport_error())
    }

    /// Check if error is due to invalid input parameters
    pub fn is_invalid_input(&self) -> bool {
        match self {
            CosmosAppError::InvalidBip32Path(_)
            | CosmosAppError::InvalidHrp(_)
            | CosmosAppError::PayloadTooLarge { .. } => true,
            CosmosAppError::Transport(err) => err.is_invalid_input(),
            _ => false,
        }
    }

    /// Check if the app version on the device prevents the operation
    pub fn is_version_error(&self) -> bool {
        matches!(self, CosmosAppError::Transport(err) if err.is_version_error())
    }

    /// Status word reported by the device, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CosmosAppError::Transport(err) => err.status_code(),
            _ => None,
        }
    }
}

/// Result type alias for Cosmos application operations
pub type CosmosAppResult<T, E> = Result<T, CosmosAppError<E>>;
