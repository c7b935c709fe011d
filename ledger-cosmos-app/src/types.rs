// SPDX-License-Identifier: Apache-2.0

//! Core data types for the Cosmos and THORChain applications

use std::fmt;

use ledger_device_base::VersionRequirements;
use serde::{Deserialize, Serialize};

use crate::instructions::{length, p2_sign, AppFamily};

/// Hardened bit of a BIP32 index
pub const HARDENED: u32 = 0x8000_0000;

/// BIP44 coin type registered for Cosmos Hub and THORChain keys
pub const COSMOS_COIN_TYPE: u32 = 118;

/// BIP32 derivation path
///
/// Indices are stored as given; the hardened bit is applied when encoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationPath {
    pub indices: Vec<u32>,
}

impl DerivationPath {
    pub fn new(indices: Vec<u32>) -> Self {
        DerivationPath { indices }
    }

    /// Standard Cosmos derivation path: m/44'/118'/account'/0/address_index
    pub fn cosmos_standard(account: u32, address_index: u32) -> Self {
        DerivationPath {
            indices: vec![44, COSMOS_COIN_TYPE, account, 0, address_index],
        }
    }

    /// Get the encoded length for APDU
    pub fn encoded_len(&self) -> usize {
        1 + self.indices.len() * length::BIP32_INDEX_SIZE
    }

    /// Count byte, then each index big endian with the first
    /// `harden_count` indices hardened
    pub fn encode(&self, harden_count: usize) -> Result<Vec<u8>, String> {
        if self.indices.is_empty() {
            return Err("Empty path".to_string());
        }
        if self.encoded_len() > length::MAX_ENCODED_PATH_SIZE {
            return Err(format!(
                "Path too long: {} elements encode to {} bytes (max {})",
                self.indices.len(),
                self.encoded_len(),
                length::MAX_ENCODED_PATH_SIZE
            ));
        }

        let mut encoded = Vec::with_capacity(self.encoded_len());
        encoded.push(self.indices.len() as u8);
        for (position, &index) in self.indices.iter().enumerate() {
            let index = if position < harden_count {
                index | HARDENED
            } else {
                index
            };
            encoded.extend_from_slice(&index.to_be_bytes());
        }

        Ok(encoded)
    }
}

impl From<Vec<u32>> for DerivationPath {
    fn from(indices: Vec<u32>) -> Self {
        DerivationPath::new(indices)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for (position, index) in self.indices.iter().enumerate() {
            let hardened =
                position < length::HARDENED_PATH_ELEMENTS || index & HARDENED != 0;
            if hardened {
                write!(f, "/{}'", index & !HARDENED)?;
            } else {
                write!(f, "/{}", index)?;
            }
        }
        Ok(())
    }
}

/// Elliptic curve of the requested key
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Curve {
    #[default]
    Secp256k1,
    Ed25519,
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Curve::Secp256k1 => write!(f, "secp256k1"),
            Curve::Ed25519 => write!(f, "ed25519"),
        }
    }
}

/// What the device is asked to sign; sent in P2 by v2 apps
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignMode {
    #[default]
    LegacyAminoJson,
    Textual,
}

impl SignMode {
    pub fn p2(&self) -> u8 {
        match self {
            SignMode::LegacyAminoJson => p2_sign::LEGACY_AMINO_JSON,
            SignMode::Textual => p2_sign::TEXTUAL,
        }
    }
}

impl TryFrom<u8> for SignMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            p2_sign::LEGACY_AMINO_JSON => Ok(SignMode::LegacyAminoJson),
            p2_sign::TEXTUAL => Ok(SignMode::Textual),
            other => Err(other),
        }
    }
}

/// Public key and bech32 address returned by the address command
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    /// Compressed secp256k1 public key (33 bytes)
    pub public_key: Vec<u8>,
    /// Bech32 address
    pub address: String,
}

impl AddressInfo {
    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public_key)
    }
}

impl fmt::Display for AddressInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.address, self.public_key_hex())
    }
}

/// Parameters for GET PUBLIC KEY
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetPublicKeyParams {
    /// BIP32 derivation path
    pub path: DerivationPath,
    /// Curve of the requested key
    pub curve: Curve,
}

impl GetPublicKeyParams {
    pub fn new(path: DerivationPath) -> Self {
        GetPublicKeyParams {
            path,
            curve: Curve::default(),
        }
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }
}

/// Parameters for GET ADDRESS
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetAddressParams {
    /// BIP32 derivation path
    pub path: DerivationPath,
    /// Bech32 human readable part, e.g. "thor" or "cosmos"
    pub hrp: String,
    /// Whether to display address on device and require confirmation
    pub display: bool,
}

impl GetAddressParams {
    pub fn new(path: DerivationPath, hrp: impl Into<String>) -> Self {
        GetAddressParams {
            path,
            hrp: hrp.into(),
            display: false,
        }
    }

    /// Enable display and confirmation on device
    pub fn with_display(mut self) -> Self {
        self.display = true;
        self
    }
}

/// Parameters for SIGN
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignParams {
    /// BIP32 derivation path
    pub path: DerivationPath,
    /// Serialized transaction, sent as is
    pub transaction: Vec<u8>,
    /// Sign mode byte sent in P2 by v2 apps, ignored by v1 apps
    pub p2: u8,
    pub curve: Curve,
}

impl SignParams {
    pub fn new(path: DerivationPath, transaction: Vec<u8>) -> Self {
        SignParams {
            path,
            transaction,
            p2: SignMode::default().p2(),
            curve: Curve::default(),
        }
    }

    pub fn with_mode(mut self, mode: SignMode) -> Self {
        self.p2 = mode.p2();
        self
    }

    /// Raw P2 byte, validated by the device protocol before sending
    pub fn with_p2(mut self, p2: u8) -> Self {
        self.p2 = p2;
        self
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }
}

/// Session configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// App expected on the device
    pub family: AppFamily,
    /// HRP used when a public key is served by the address command
    pub default_hrp: String,
    /// Supported app versions and the chunking protocol each speaks
    pub requirements: VersionRequirements,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            family: AppFamily::THORChain,
            default_hrp: "thor".to_string(),
            requirements: VersionRequirements::default(),
        }
    }
}

impl AppConfig {
    pub fn new(family: AppFamily) -> Self {
        let default_hrp = match family {
            AppFamily::THORChain => "thor",
            AppFamily::Cosmos => "cosmos",
        };
        AppConfig {
            family,
            default_hrp: default_hrp.to_string(),
            ..AppConfig::default()
        }
    }

    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_family(mut self, family: AppFamily) -> Self {
        self.family = family;
        self
    }

    pub fn with_default_hrp(mut self, hrp: impl Into<String>) -> Self {
        self.default_hrp = hrp.into();
        self
    }

    pub fn with_requirements(mut self, requirements: VersionRequirements) -> Self {
        self.requirements = requirements;
        self
    }
}
