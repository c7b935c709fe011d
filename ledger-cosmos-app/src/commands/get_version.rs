// SPDX-License-Identifier: Apache-2.0

//! GET VERSION command implementation

use ledger_device_base::{
    check_version, AppExt, ChunkPolicy, LedgerAppError, VersionInfo, VersionRequirements,
};
use ledger_transport::{APDUErrorCode, Exchange};
use log::info;

use crate::errors::{CosmosAppError, CosmosAppResult};
use crate::CosmosUserApp;

pub trait GetVersion<E>
where
    E: Exchange,
    E::Error: std::error::Error,
{
    /// Read the version of the app running on the device
    fn get_version(transport: &E) -> CosmosAppResult<VersionInfo, E::Error>;

    /// Read the version and pick the chunking protocol it speaks
    fn negotiate_version(
        transport: &E,
        requirements: &VersionRequirements,
    ) -> CosmosAppResult<(VersionInfo, ChunkPolicy), E::Error>;
}

impl<E> GetVersion<E> for CosmosUserApp
where
    E: Exchange,
    E::Error: std::error::Error,
{
    fn get_version(transport: &E) -> CosmosAppResult<VersionInfo, E::Error> {
        <CosmosUserApp as AppExt<E>>::get_version(transport).map_err(|err| match err {
            // the dashboard or another app answers with CLA not supported
            LedgerAppError::AppSpecific(code, _) if code == APDUErrorCode::ClaNotSupported as u16 => {
                CosmosAppError::Transport(LedgerAppError::AppNotOpen)
            }
            err => CosmosAppError::Transport(err),
        })
    }

    fn negotiate_version(
        transport: &E,
        requirements: &VersionRequirements,
    ) -> CosmosAppResult<(VersionInfo, ChunkPolicy), E::Error> {
        let version = <CosmosUserApp as GetVersion<E>>::get_version(transport)?;
        let policy = check_version::<E::Error>(&version, requirements)?;
        info!(
            "app version {} (mode {:#04x}) speaks {:?} chunking",
            version, version.app_mode, policy
        );
        Ok((version, policy))
    }
}
