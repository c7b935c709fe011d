// SPDX-License-Identifier: Apache-2.0

//! GET ADDRESS AND PUBLIC KEY command implementation

use ledger_device_base::{App, AppExt, LedgerAppError};
use ledger_transport::{APDUCommand, Exchange};

use crate::errors::{CosmosAppError, CosmosAppResult};
use crate::instructions::{p1_get_address, InstructionSet};
use crate::types::{AddressInfo, GetAddressParams};
use crate::utils::{encode_address_request, parse_address_response};
use crate::CosmosUserApp;

pub trait GetAddress<E>
where
    E: Exchange,
    E::Error: std::error::Error,
{
    /// Get the compressed public key and bech32 address for a derivation path
    fn get_address(
        transport: &E,
        instructions: &InstructionSet,
        params: GetAddressParams,
    ) -> CosmosAppResult<AddressInfo, E::Error>;
}

impl<E> GetAddress<E> for CosmosUserApp
where
    E: Exchange,
    E::Error: std::error::Error,
{
    fn get_address(
        transport: &E,
        instructions: &InstructionSet,
        params: GetAddressParams,
    ) -> CosmosAppResult<AddressInfo, E::Error> {
        let ins = instructions.get_address_secp256k1.ok_or_else(|| {
            CosmosAppError::FeatureNotSupported("address derivation".to_string())
        })?;

        let data = encode_address_request::<E::Error>(&params.hrp, &params.path)?;

        let p1 = if params.display {
            p1_get_address::DISPLAY_AND_CONFIRM
        } else {
            p1_get_address::RETURN_ADDRESS
        };

        let command = APDUCommand {
            cla: Self::CLA,
            ins,
            p1,
            p2: 0x00,
            data,
        };

        let response = transport
            .exchange(&command)
            .map_err(LedgerAppError::from_exchange)?;

        <CosmosUserApp as AppExt<E>>::handle_response_error_diagnostic(&response)?;

        parse_address_response(response.data(), &params.hrp)
    }
}
