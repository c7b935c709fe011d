// SPDX-License-Identifier: Apache-2.0

//! HASH command implementation (Cosmos legacy test builds)

use ledger_device_base::{AppExt, ChunkPolicy};
use ledger_transport::Exchange;

use crate::errors::{CosmosAppError, CosmosAppResult};
use crate::instructions::InstructionSet;
use crate::CosmosUserApp;

pub trait HashMessage<E>
where
    E: Exchange,
    E::Error: std::error::Error,
{
    /// Have the device hash `transaction` and return the digest
    fn hash(
        transport: &E,
        instructions: &InstructionSet,
        transaction: &[u8],
    ) -> CosmosAppResult<Vec<u8>, E::Error>;
}

impl<E> HashMessage<E> for CosmosUserApp
where
    E: Exchange,
    E::Error: std::error::Error,
{
    fn hash(
        transport: &E,
        instructions: &InstructionSet,
        transaction: &[u8],
    ) -> CosmosAppResult<Vec<u8>, E::Error> {
        let ins = instructions
            .hash
            .ok_or_else(|| CosmosAppError::FeatureNotSupported("hash".to_string()))?;

        // test instructions predate v2 and always count packets
        let response = <CosmosUserApp as AppExt<E>>::send_chunks(
            transport,
            ins,
            0x00,
            None,
            transaction,
            ChunkPolicy::V1,
        )?;

        Ok(response.data().to_vec())
    }
}
