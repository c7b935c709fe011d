//! Chunk planning for payloads larger than one APDU.
//!
//! A signing request is sent as an optional leading packet (the encoded
//! derivation path) followed by the message cut into
//! [`USER_MESSAGE_CHUNK_SIZE`] slices. Every packet is one full exchange.
//! How each packet announces its position depends on the [`ChunkPolicy`]
//! the app speaks.

use ledger_transport::APDUErrorCode;
use serde::{Deserialize, Serialize};

use crate::LedgerAppError;

pub const USER_MESSAGE_CHUNK_SIZE: usize = 250;

/// Packet counters are single bytes
pub const MAX_PACKET_COUNT: usize = u8::MAX as usize;

/// Highest sign mode the v2 protocol accepts in P2
pub const MAX_SIGN_MODE: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
/// How chunk headers announce a packet's position
pub enum ChunkPolicy {
    /// P1 is the 1-based packet index, P2 the packet count
    V1,
    /// P1 is a [`ChunkPayloadType`], P2 carries the sign mode
    V2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkPayloadType {
    /// First chunk
    Init = 0x00,
    /// Append chunk
    Add = 0x01,
    /// Last chunk
    Last = 0x02,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkPlan {
    packet_count: u8,
    has_leading_packet: bool,
    policy: ChunkPolicy,
}

impl ChunkPlan {
    /// Plan the packets for a `message_len` byte message
    ///
    /// Fails when there is nothing to send or when the packet count does
    /// not fit a single byte.
    pub fn new<E: std::error::Error>(
        message_len: usize,
        has_leading_packet: bool,
        policy: ChunkPolicy,
    ) -> Result<Self, LedgerAppError<E>> {
        let total = message_len.div_ceil(USER_MESSAGE_CHUNK_SIZE) + usize::from(has_leading_packet);

        let packet_count = match total {
            0 => return Err(LedgerAppError::InvalidEmptyMessage),
            n if n > MAX_PACKET_COUNT => return Err(LedgerAppError::InvalidMessageSize),
            n => n as u8,
        };

        Ok(ChunkPlan {
            packet_count,
            has_leading_packet,
            policy,
        })
    }

    pub fn packet_count(&self) -> u8 {
        self.packet_count
    }

    pub fn has_leading_packet(&self) -> bool {
        self.has_leading_packet
    }

    pub fn policy(&self) -> ChunkPolicy {
        self.policy
    }

    /// Position of the packet at 1-based `index`
    pub fn role(&self, index: u8) -> ChunkPayloadType {
        if index == 1 && self.has_leading_packet {
            ChunkPayloadType::Init
        } else if index == self.packet_count {
            ChunkPayloadType::Last
        } else {
            ChunkPayloadType::Add
        }
    }

    /// P1 and P2 of the packet at 1-based `index`
    ///
    /// `p2` is only sent under [`ChunkPolicy::V2`]; v1 uses P2 for the
    /// packet count.
    pub fn params(&self, index: u8, p2: u8) -> (u8, u8) {
        match self.policy {
            ChunkPolicy::V1 => (index, self.packet_count),
            ChunkPolicy::V2 => (self.role(index) as u8, p2),
        }
    }
}

/// Diagnostic text the app embeds in the answer of some failed commands
///
/// Only bad-data statuses carry one; an empty payload yields `None`.
pub fn embedded_diagnostic(retcode: u16, payload: &[u8]) -> Option<String> {
    let carries_text = retcode == APDUErrorCode::BadKeyHandle as u16
        || retcode == APDUErrorCode::DataInvalid as u16;
    if !carries_text || payload.is_empty() {
        return None;
    }

    let text = String::from_utf8_lossy(payload);
    Some(text.trim_end_matches('\0').to_string())
}
