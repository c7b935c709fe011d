// SPDX-License-Identifier: Apache-2.0

//! Command implementations for the Cosmos and THORChain applications

pub mod get_address;
pub mod get_public_key;
pub mod get_version;
pub mod hash;
pub mod sign;

pub use get_address::*;
pub use get_public_key::*;
pub use get_version::*;
pub use hash::*;
pub use sign::*;
pub use sign_test::*;
