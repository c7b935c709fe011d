// SPDX-License-Identifier: Apache-2.0

//! Ledger Cosmos and THORChain Application SDK
//!
//! This crate drives the Cosmos and THORChain applications on Ledger hardware
//! wallets: version negotiation, public key and address retrieval, and
//! transaction signing over the chunked APDU protocol.
//!
//! ## Features
//!
//! - **Version Gate**: the app version read at connection picks the v1 or v2
//!   chunking protocol, older releases are refused
//! - **Addresses**: compressed secp256k1 keys and bech32 addresses for any HRP
//! - **Signing**: transactions of up to 254 chunks, legacy Amino JSON or textual
//! - **App Families**: THORChain and legacy Cosmos instruction layouts behind one API
//! - **Blocking**: every call completes one or more exchanges before returning

use ledger_device_base::{check_version, App, ChunkPolicy, LedgerAppError, VersionInfo};
use ledger_transport::Exchange;
use log::debug;

pub mod commands;
pub mod errors;
pub mod instructions;
pub mod types;
pub mod utils;

pub use commands::*;
pub use errors::*;
pub use instructions::{AppFamily, InstructionSet};
pub use types::*;

/// Cosmos/THORChain app marker implementing `App` trait CLA.
#[derive(Debug, Clone)]
pub struct CosmosUserApp;

impl App for CosmosUserApp {
    /// CLA shared by the Cosmos and THORChain apps (0x55)
    const CLA: u8 = instructions::CLA;
}

/// Session with the Cosmos or THORChain app on one device
///
/// Owns the transport for its whole life and caches the app version, which
/// decides how signing requests are chunked.
#[derive(Debug)]
pub struct CosmosApp<E: Exchange> {
    transport: E,
    config: AppConfig,
    version: Option<VersionInfo>,
}

impl<E: Exchange> CosmosApp<E> {
    /// Wrap a transport without talking to the device
    ///
    /// Version dependent commands fail until [`CosmosApp::get_version`] ran.
    pub fn new(transport: E, config: AppConfig) -> Self {
        Self {
            transport,
            config,
            version: None,
        }
    }

    /// Get a reference to the underlying transport
    pub fn transport(&self) -> &E {
        &self.transport
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Version read by the last successful version query
    pub fn version(&self) -> Option<&VersionInfo> {
        self.version.as_ref()
    }

    /// End the session, releasing the transport
    pub fn close(self) {
        debug!("closing {:?} session", self.config.family);
    }

    /// End the session and hand the transport back
    pub fn into_transport(self) -> E {
        self.transport
    }
}

impl<E> CosmosApp<E>
where
    E: Exchange,
    E::Error: std::error::Error,
{
    /// Open a session: read the app version and check it is supported
    ///
    /// On failure the transport is dropped.
    pub fn connect(transport: E, config: AppConfig) -> CosmosAppResult<Self, E::Error> {
        let (version, _) = CosmosUserApp::negotiate_version(&transport, &config.requirements)?;

        Ok(Self {
            transport,
            config,
            version: Some(version),
        })
    }

    /// Read the app version and cache it on the session
    pub fn get_version(&mut self) -> CosmosAppResult<VersionInfo, E::Error> {
        let version = <CosmosUserApp as GetVersion<E>>::get_version(&self.transport)?;
        self.version = Some(version);
        Ok(version)
    }

    /// Chunking protocol of the cached version
    ///
    /// Every command except the version query checks this first, so an
    /// unsupported or missing version blocks the whole session.
    pub fn chunk_policy(&self) -> CosmosAppResult<ChunkPolicy, E::Error> {
        let version = self.version.as_ref().ok_or(LedgerAppError::<E::Error>::MissingVersion)?;
        let policy = check_version::<E::Error>(version, &self.config.requirements)?;
        Ok(policy)
    }

    fn instructions(&self) -> InstructionSet {
        self.config.family.instructions()
    }

    /// Public key for `path`, without confirmation on device
    ///
    /// THORChain serves the compressed key through the address command with
    /// the configured default HRP; the legacy Cosmos app returns the raw key.
    pub fn get_public_key(
        &self,
        path: DerivationPath,
        curve: Curve,
    ) -> CosmosAppResult<Vec<u8>, E::Error> {
        self.chunk_policy()?;
        let params = GetPublicKeyParams::new(path).with_curve(curve);
        CosmosUserApp::get_public_key(&self.transport, &self.config, params)
    }

    /// Compressed public key and bech32 address for `path`
    ///
    /// With `require_confirmation` the device shows the address and waits
    /// for the user.
    pub fn get_address(
        &self,
        path: DerivationPath,
        hrp: &str,
        require_confirmation: bool,
    ) -> CosmosAppResult<AddressInfo, E::Error> {
        self.chunk_policy()?;
        let mut params = GetAddressParams::new(path, hrp);
        if require_confirmation {
            params = params.with_display();
        }
        CosmosUserApp::get_address(&self.transport, &self.instructions(), params)
    }

    /// Sign `transaction` with the key at `path`; requires confirmation on device
    pub fn sign(
        &self,
        path: DerivationPath,
        transaction: Vec<u8>,
        mode: SignMode,
    ) -> CosmosAppResult<Vec<u8>, E::Error> {
        self.sign_with_params(SignParams::new(path, transaction).with_mode(mode))
    }

    pub fn sign_with_params(&self, params: SignParams) -> CosmosAppResult<Vec<u8>, E::Error> {
        let policy = self.chunk_policy()?;
        CosmosUserApp::sign(&self.transport, &self.instructions(), policy, params)
    }

    /// Device side hash of `transaction` (test builds)
    pub fn hash(&self, transaction: &[u8]) -> CosmosAppResult<Vec<u8>, E::Error> {
        self.chunk_policy()?;
        <CosmosUserApp as HashMessage<E>>::hash(&self.transport, &self.instructions(), transaction)
    }

    /// Public key of the fixed test key (test builds)
    pub fn get_test_public_key(&self) -> CosmosAppResult<Vec<u8>, E::Error> {
        self.chunk_policy()?;
        CosmosUserApp::get_test_public_key(&self.transport, &self.instructions())
    }

    /// Signature with the fixed test key (test builds)
    pub fn sign_test(&self, transaction: &[u8]) -> CosmosAppResult<Vec<u8>, E::Error> {
        self.chunk_policy()?;
        CosmosUserApp::sign_test(&self.transport, &self.instructions(), transaction)
    }
}

#[cfg(test)]
mod tests {
    use ledger_transport::mock::MockTransport;

    use super::*;

    fn thor_address_answer() -> Vec<u8> {
        let mut answer = vec![0x02; 33];
        answer.extend_from_slice(b"thor1qqqqqqqq");
        answer
    }

    #[test]
    fn connect_caches_version() {
        let mock = MockTransport::new().answer(&[0, 2, 1, 0], 0x9000);

        let app = CosmosApp::connect(mock, AppConfig::default()).unwrap();
        assert_eq!(app.version(), Some(&VersionInfo::new(0, 2, 1, 0)));
        assert_eq!(app.chunk_policy().unwrap(), ChunkPolicy::V2);
        assert_eq!(app.transport().remaining(), 0);
        app.close();
    }

    #[test]
    fn connect_refuses_old_app() {
        let mock = MockTransport::new().answer(&[0, 1, 4, 9], 0x9000);

        let err = CosmosApp::connect(mock, AppConfig::default()).unwrap_err();
        assert!(err.is_version_error());
        assert_eq!(err.to_string(), "App Version required 1.5.1 - Version found: 1.4.9");
    }

    #[test]
    fn connect_without_app() {
        let mock = MockTransport::new().answer(&[], 0x6E00);

        let err = CosmosApp::connect(mock, AppConfig::default()).unwrap_err();
        assert_eq!(err, CosmosAppError::Transport(LedgerAppError::AppNotOpen));
    }

    #[test]
    fn commands_need_a_version() {
        let app = CosmosApp::new(MockTransport::new(), AppConfig::default());

        let err = app
            .sign(DerivationPath::cosmos_standard(0, 0), vec![1], SignMode::LegacyAminoJson)
            .unwrap_err();
        assert_eq!(err, CosmosAppError::Transport(LedgerAppError::MissingVersion));

        let err = app
            .get_address(DerivationPath::cosmos_standard(0, 0), "thor", false)
            .unwrap_err();
        assert_eq!(err, CosmosAppError::Transport(LedgerAppError::MissingVersion));
        assert!(app.transport().commands().is_empty());
    }

    #[test]
    fn get_version_refreshes_cache() {
        let mock = MockTransport::new().answer(&[0xFF, 1, 6, 0], 0x9000);
        let mut app = CosmosApp::new(mock, AppConfig::default());

        let version = app.get_version().unwrap();
        assert!(version.is_debug());
        assert_eq!(app.version(), Some(&version));
        assert_eq!(app.chunk_policy().unwrap(), ChunkPolicy::V1);
    }

    #[test]
    fn unsupported_major_blocks_every_versioned_command() {
        let mock = MockTransport::new().answer(&[0, 3, 0, 0], 0x9000);
        let mut app = CosmosApp::new(mock, AppConfig::default());
        app.get_version().unwrap();

        let path = DerivationPath::cosmos_standard(0, 0);
        assert!(app.get_public_key(path.clone(), Curve::Secp256k1).is_err());
        assert!(app.get_address(path.clone(), "thor", false).is_err());
        let err = app.sign(path, vec![1], SignMode::Textual).unwrap_err();
        assert_eq!(err, CosmosAppError::Transport(LedgerAppError::UnsupportedVersion(3)));
        assert!(app.transport().commands().len() == 1);
    }

    #[test]
    fn unsupported_major_blocks_test_commands() {
        let mock = MockTransport::new().answer(&[0, 3, 0, 0], 0x9000);
        let mut app = CosmosApp::new(mock, AppConfig::new(AppFamily::Cosmos));
        app.get_version().unwrap();

        let unsupported = CosmosAppError::Transport(LedgerAppError::UnsupportedVersion(3));
        assert_eq!(app.hash(&[1; 10]).unwrap_err(), unsupported);
        assert_eq!(app.get_test_public_key().unwrap_err(), unsupported);
        assert_eq!(app.sign_test(b"{}").unwrap_err(), unsupported);
        assert_eq!(app.transport().commands().len(), 1);
    }

    #[test]
    fn test_commands_need_a_version() {
        let app = CosmosApp::new(MockTransport::new(), AppConfig::new(AppFamily::Cosmos));

        let err = app.hash(&[1]).unwrap_err();
        assert_eq!(err, CosmosAppError::Transport(LedgerAppError::MissingVersion));
        assert!(app.transport().commands().is_empty());
    }

    #[test]
    fn thorchain_public_key() {
        let mock = MockTransport::new()
            .answer(&[0, 2, 0, 0], 0x9000)
            .answer(&thor_address_answer(), 0x9000);
        let app = CosmosApp::connect(mock, AppConfig::default()).unwrap();

        let key = app
            .get_public_key(DerivationPath::cosmos_standard(0, 0), Curve::Secp256k1)
            .unwrap();
        assert_eq!(key, vec![0x02; 33]);
    }

    #[test]
    fn session_sign_uses_negotiated_policy() {
        let mock = MockTransport::new()
            .answer(&[0, 1, 5, 1], 0x9000)
            .acks(1)
            .answer(&[0x30, 0x44], 0x9000);
        let app = CosmosApp::connect(mock, AppConfig::default()).unwrap();

        let signature = app
            .sign(DerivationPath::cosmos_standard(0, 0), vec![0; 20], SignMode::LegacyAminoJson)
            .unwrap();
        assert_eq!(signature, vec![0x30, 0x44]);

        let commands = app.into_transport().commands();
        assert_eq!((commands[1].p1, commands[1].p2), (1, 2));
        assert_eq!((commands[2].p1, commands[2].p2), (2, 2));
    }
}
