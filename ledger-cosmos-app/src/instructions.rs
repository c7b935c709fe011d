// SPDX-License-Identifier: Apache-2.0

//! APDU instruction constants for the Cosmos and THORChain applications

use serde::{Deserialize, Serialize};

use crate::types::Curve;

/// CLA shared by the Cosmos and THORChain applications
pub const CLA: u8 = 0x55;

/// APDU instruction codes
pub mod ins {
    /// GET VERSION
    pub const GET_VERSION: u8 = 0x00;
    /// GET PUBLIC KEY SECP256K1 (Cosmos legacy)
    pub const GET_PUBLIC_KEY_SECP256K1: u8 = 0x01;
    /// SIGN SECP256K1
    pub const SIGN_SECP256K1: u8 = 0x02;
    /// GET ADDRESS AND PUBLIC KEY SECP256K1
    pub const GET_ADDRESS_SECP256K1: u8 = 0x04;
    /// HASH (Cosmos legacy test build)
    pub const HASH: u8 = 0x64;
    /// GET PUBLIC KEY (Cosmos legacy test build)
    pub const TEST_PUBLIC_KEY: u8 = 0x66;
    /// SIGN (Cosmos legacy test build)
    pub const TEST_SIGN: u8 = 0x67;
}

/// P1 parameter constants for GET ADDRESS
pub mod p1_get_address {
    /// Return address without confirmation
    pub const RETURN_ADDRESS: u8 = 0x00;
    /// Display address and confirm before returning
    pub const DISPLAY_AND_CONFIRM: u8 = 0x01;
}

/// P2 parameter constants for SIGN (v2 apps)
pub mod p2_sign {
    /// SIGN_MODE_LEGACY_AMINO_JSON
    pub const LEGACY_AMINO_JSON: u8 = 0x00;
    /// SIGN_MODE_TEXTUAL
    pub const TEXTUAL: u8 = 0x01;
}

/// Data length constants
pub mod length {
    /// Number of leading path elements that get the hardened bit
    pub const HARDENED_PATH_ELEMENTS: usize = 3;
    /// Size of each BIP 32 derivation index
    pub const BIP32_INDEX_SIZE: usize = 4;
    /// Maximum encoded path size (count byte included)
    pub const MAX_ENCODED_PATH_SIZE: usize = 255;
    /// Size of a compressed secp256k1 public key
    pub const COMPRESSED_PUBLIC_KEY_SIZE: usize = 33;
    /// Maximum human readable part length
    pub const MAX_HRP_LEN: usize = 83;
    /// Maximum APDU payload
    pub const MAX_APDU_DATA: usize = 255;
}

/// Which app is running on the device
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppFamily {
    /// THORChain app: public keys are served by the address command
    #[default]
    THORChain,
    /// Cosmos app, legacy instruction layout
    Cosmos,
}

impl AppFamily {
    pub fn instructions(&self) -> InstructionSet {
        match self {
            AppFamily::THORChain => InstructionSet::THORCHAIN,
            AppFamily::Cosmos => InstructionSet::COSMOS_LEGACY,
        }
    }
}

/// How a family answers a public key request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublicKeySource {
    /// Dedicated instruction returning the raw key
    Direct(u8),
    /// Address command, without confirmation, keeping only the key
    ViaAddress,
}

/// Instructions an app family understands; `None` means unsupported
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstructionSet {
    pub get_version: u8,
    pub public_key_secp256k1: PublicKeySource,
    pub get_address_secp256k1: Option<u8>,
    pub sign_secp256k1: u8,
    pub hash: Option<u8>,
    pub test_public_key: Option<u8>,
    pub test_sign: Option<u8>,
}

impl InstructionSet {
    pub const THORCHAIN: InstructionSet = InstructionSet {
        get_version: ins::GET_VERSION,
        public_key_secp256k1: PublicKeySource::ViaAddress,
        get_address_secp256k1: Some(ins::GET_ADDRESS_SECP256K1),
        sign_secp256k1: ins::SIGN_SECP256K1,
        hash: None,
        test_public_key: None,
        test_sign: None,
    };

    pub const COSMOS_LEGACY: InstructionSet = InstructionSet {
        get_version: ins::GET_VERSION,
        public_key_secp256k1: PublicKeySource::Direct(ins::GET_PUBLIC_KEY_SECP256K1),
        get_address_secp256k1: None,
        sign_secp256k1: ins::SIGN_SECP256K1,
        hash: Some(ins::HASH),
        test_public_key: Some(ins::TEST_PUBLIC_KEY),
        test_sign: Some(ins::TEST_SIGN),
    };

    /// Public key source for `curve`, if the family maps it
    pub fn public_key(&self, curve: Curve) -> Option<PublicKeySource> {
        match curve {
            Curve::Secp256k1 => Some(self.public_key_secp256k1),
            Curve::Ed25519 => None,
        }
    }

    /// Signing instruction for `curve`, if the family maps it
    pub fn sign(&self, curve: Curve) -> Option<u8> {
        match curve {
            Curve::Secp256k1 => Some(self.sign_secp256k1),
            Curve::Ed25519 => None,
        }
    }
}
