// SPDX-License-Identifier: Apache-2.0

//! SIGN command implementation

use ledger_device_base::{AppExt, ChunkPolicy};
use ledger_transport::Exchange;

use crate::errors::{CosmosAppError, CosmosAppResult};
use crate::instructions::InstructionSet;
use crate::types::SignParams;
use crate::utils::encode_bip32_path;
use crate::CosmosUserApp;

pub trait Sign<E>
where
    E: Exchange,
    E::Error: std::error::Error,
{
    /// Sign a serialized transaction; requires confirmation on device
    ///
    /// The path goes first, then the transaction in 250 byte chunks, with
    /// headers laid out as `policy` dictates. Returns the signature bytes.
    fn sign(
        transport: &E,
        instructions: &InstructionSet,
        policy: ChunkPolicy,
        params: SignParams,
    ) -> CosmosAppResult<Vec<u8>, E::Error>;
}

impl<E> Sign<E> for CosmosUserApp
where
    E: Exchange,
    E::Error: std::error::Error,
{
    fn sign(
        transport: &E,
        instructions: &InstructionSet,
        policy: ChunkPolicy,
        params: SignParams,
    ) -> CosmosAppResult<Vec<u8>, E::Error> {
        let ins = instructions.sign(params.curve).ok_or_else(|| {
            CosmosAppError::FeatureNotSupported(format!("{} signatures", params.curve))
        })?;

        let path = encode_bip32_path::<E::Error>(&params.path)?;

        let response = <CosmosUserApp as AppExt<E>>::send_chunks(
            transport,
            ins,
            params.p2,
            Some(path.as_slice()),
            &params.transaction,
            policy,
        )?;

        <CosmosUserApp as AppExt<E>>::handle_response_error_signature(&response)?;

        Ok(response.data().to_vec())
    }
}
