// SPDX-License-Identifier: Apache-2.0

//! GET PUBLIC KEY command implementation

use ledger_device_base::{App, AppExt, LedgerAppError};
use ledger_transport::{APDUCommand, Exchange};

use crate::commands::GetAddress;
use crate::errors::{CosmosAppError, CosmosAppResult};
use crate::instructions::PublicKeySource;
use crate::types::{AppConfig, GetAddressParams, GetPublicKeyParams};
use crate::utils::encode_bip32_path;
use crate::CosmosUserApp;

pub trait GetPublicKey<E>
where
    E: Exchange,
    E::Error: std::error::Error,
{
    /// Get the public key for a derivation path, without confirmation on device
    fn get_public_key(
        transport: &E,
        config: &AppConfig,
        params: GetPublicKeyParams,
    ) -> CosmosAppResult<Vec<u8>, E::Error>;
}

impl<E> GetPublicKey<E> for CosmosUserApp
where
    E: Exchange,
    E::Error: std::error::Error,
{
    fn get_public_key(
        transport: &E,
        config: &AppConfig,
        params: GetPublicKeyParams,
    ) -> CosmosAppResult<Vec<u8>, E::Error> {
        let instructions = config.family.instructions();
        let source = instructions.public_key(params.curve).ok_or_else(|| {
            CosmosAppError::FeatureNotSupported(format!("{} public keys", params.curve))
        })?;

        match source {
            PublicKeySource::ViaAddress => {
                let address_params = GetAddressParams::new(params.path, config.default_hrp.as_str());
                let info = <CosmosUserApp as GetAddress<E>>::get_address(
                    transport,
                    &instructions,
                    address_params,
                )?;
                Ok(info.public_key)
            }
            PublicKeySource::Direct(ins) => {
                let command = APDUCommand {
                    cla: Self::CLA,
                    ins,
                    p1: 0x00,
                    p2: 0x00,
                    data: encode_bip32_path::<E::Error>(&params.path)?,
                };

                let response = transport
                    .exchange(&command)
                    .map_err(LedgerAppError::from_exchange)?;

                <CosmosUserApp as AppExt<E>>::handle_response_error_diagnostic(&response)?;

                Ok(response.data().to_vec())
            }
        }
    }
}
