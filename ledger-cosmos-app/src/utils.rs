// SPDX-License-Identifier: Apache-2.0

//! Utility functions for the Cosmos and THORChain applications

use crate::errors::{CosmosAppError, CosmosAppResult};
use crate::instructions::length;
use crate::types::{AddressInfo, DerivationPath};

/// Bech32 allows printable US-ASCII in the human readable part
fn is_valid_hrp_byte(b: u8) -> bool {
    (33..=126).contains(&b)
}

/// Validate a bech32 human readable part before it is sent to the device
pub fn validate_hrp<E: std::error::Error>(hrp: &str) -> CosmosAppResult<(), E> {
    if hrp.len() > length::MAX_HRP_LEN {
        return Err(CosmosAppError::InvalidHrp(format!(
            "HRP too long: {} bytes (max {})",
            hrp.len(),
            length::MAX_HRP_LEN
        )));
    }

    if let Some(b) = hrp.bytes().find(|b| !is_valid_hrp_byte(*b)) {
        return Err(CosmosAppError::InvalidHrp(format!(
            "all characters in the HRP must be in the [33, 126] range, found {:#04x}",
            b
        )));
    }

    Ok(())
}

/// Encode a derivation path with the hardening the apps expect
pub fn encode_bip32_path<E: std::error::Error>(path: &DerivationPath) -> CosmosAppResult<Vec<u8>, E> {
    path.encode(length::HARDENED_PATH_ELEMENTS)
        .map_err(CosmosAppError::InvalidBip32Path)
}

/// `[len(hrp)] ++ hrp ++ encoded_path`
pub fn encode_address_request<E: std::error::Error>(
    hrp: &str,
    path: &DerivationPath,
) -> CosmosAppResult<Vec<u8>, E> {
    validate_hrp::<E>(hrp)?;
    let path_bytes = encode_bip32_path::<E>(path)?;

    let mut data = Vec::with_capacity(1 + hrp.len() + path_bytes.len());
    data.push(hrp.len() as u8);
    data.extend_from_slice(hrp.as_bytes());
    data.extend_from_slice(&path_bytes);

    if data.len() > length::MAX_APDU_DATA {
        return Err(CosmosAppError::PayloadTooLarge {
            size: data.len(),
            max: length::MAX_APDU_DATA,
        });
    }

    Ok(data)
}

/// Split an address answer into the compressed key and the address string
pub fn parse_address_response<E: std::error::Error>(
    data: &[u8],
    hrp: &str,
) -> CosmosAppResult<AddressInfo, E> {
    let min_len = length::COMPRESSED_PUBLIC_KEY_SIZE + hrp.len();
    if data.len() < min_len {
        return Err(CosmosAppError::InvalidResponseData(format!(
            "Address response too short: {} bytes (expected at least {})",
            data.len(),
            min_len
        )));
    }

    let (public_key, address) = data.split_at(length::COMPRESSED_PUBLIC_KEY_SIZE);
    let address = std::str::from_utf8(address)
        .map_err(|e| CosmosAppError::InvalidResponseData(format!("Address is not UTF-8: {}", e)))?;

    Ok(AddressInfo {
        public_key: public_key.to_vec(),
        address: address.to_string(),
    })
}
