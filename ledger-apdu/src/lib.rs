//! APDU command and answer types shared by the Ledger transports and apps.
//!
//! A command is serialized as `CLA INS P1 P2 Lc DATA` with a single-byte `Lc`,
//! an answer is `DATA SW1 SW2` where the trailing status word decides success.

#![no_std]
extern crate no_std_compat as std;

use std::prelude::v1::*;

use core::ops::Deref;
use snafu::prelude::*;

/// Largest payload a single-byte `Lc` can describe
pub const MAX_DATA_LEN: usize = 255;

/// Status word reported by the device on success
pub const SW_SUCCESS: u16 = 0x9000;

#[derive(Debug, Clone)]
/// An APDU command
pub struct APDUCommand<B> {
    /// APDU class
    pub cla: u8,
    /// APDU instruction
    pub ins: u8,
    /// APDU p1
    pub p1: u8,
    /// APDU p2
    pub p2: u8,
    /// APDU command data
    pub data: B,
}

#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
/// Error building the wire form of a command
pub enum APDUCommandError {
    /// Payload does not fit the single-byte length field
    #[snafu(display("command data too long: {len} bytes (max 255)"))]
    DataTooLong {
        /// actual payload length
        len: usize,
    },
}

impl<B> APDUCommand<B>
where
    B: Deref<Target = [u8]>,
{
    /// Serialize this [`APDUCommand`] to be sent to the device
    pub fn serialize(&self) -> Result<Vec<u8>, APDUCommandError> {
        let len = self.data.len();
        ensure!(len <= MAX_DATA_LEN, DataTooLongSnafu { len });

        let mut v = Vec::with_capacity(5 + len);
        v.extend_from_slice(&[self.cla, self.ins, self.p1, self.p2, len as u8]);
        v.extend_from_slice(&self.data);
        Ok(v)
    }
}

#[derive(Debug)]
/// An APDU answer, payload plus trailing status word
pub struct APDUAnswer<B> {
    data: B,
    retcode: u16,
}

#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
/// Error interpreting bytes as an APDU answer
pub enum APDUAnswerError {
    #[snafu(display("answer too short (< 2 bytes)"))]
    /// There is no room for a status word
    TooShort,
}

impl<B> APDUAnswer<B>
where
    B: Deref<Target = [u8]>,
{
    /// Attempt to interpret the given slice as an APDU answer
    pub fn from_answer(answer: B) -> Result<Self, APDUAnswerError> {
        ensure!(answer.len() >= 2, TooShortSnafu);
        let retcode = arrayref::array_ref!(answer, answer.len() - 2, 2);
        let retcode = u16::from_be_bytes(*retcode);

        Ok(APDUAnswer {
            data: answer,
            retcode,
        })
    }

    #[inline(always)]
    /// Returns the answer payload, without the status word
    pub fn apdu_data(&self) -> &[u8] {
        &self.data[..self.data.len() - 2]
    }

    #[inline(always)]
    /// Alias of [`Self::apdu_data`]
    pub fn data(&self) -> &[u8] {
        self.apdu_data()
    }

    /// Returns the raw status word
    pub fn retcode(&self) -> u16 {
        self.retcode
    }

    /// True only for `0x9000`
    pub fn is_success(&self) -> bool {
        self.retcode == SW_SUCCESS
    }

    /// Attempt to map the status word to a known [`APDUErrorCode`],
    /// handing back the raw word when it is not one
    pub fn error_code(&self) -> Result<APDUErrorCode, u16> {
        APDUErrorCode::try_from(self.retcode).map_err(|_| self.retcode)
    }

    /// Returns the whole answer buffer, status word included
    pub fn into_inner(self) -> B {
        self.data
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
/// Common status words returned by Ledger apps
pub enum APDUErrorCode {
    /// success
    NoError = 0x9000,
    /// error during apdu execution
    ExecutionError = 0x6400,
    /// apdu command wrong length
    WrongLength = 0x6700,
    /// empty apdu buffer
    EmptyBuffer = 0x6982,
    /// apdu buffer too small
    OutputBufferTooSmall = 0x6983,
    /// apdu parameters invalid
    DataInvalid = 0x6984,
    /// apdu preconditions not satisfied
    ConditionsNotSatisfied = 0x6985,
    /// apdu command not allowed
    CommandNotAllowed = 0x6986,
    /// apdu data field incorrect (bad key)
    BadKeyHandle = 0x6A80,
    /// apdu p1 or p2 incorrect
    InvalidP1P2 = 0x6B00,
    /// apdu instruction not supported or invalid
    InsNotSupported = 0x6D00,
    /// apdu class not supported or invalid
    ClaNotSupported = 0x6E00,
    /// unknown apdu error
    Unknown = 0x6F00,
    /// apdu sign verify error
    SignVerifyError = 0x6F01,
}

impl TryFrom<u16> for APDUErrorCode {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            0x9000 => Self::NoError,
            0x6400 => Self::ExecutionError,
            0x6700 => Self::WrongLength,
            0x6982 => Self::EmptyBuffer,
            0x6983 => Self::OutputBufferTooSmall,
            0x6984 => Self::DataInvalid,
            0x6985 => Self::ConditionsNotSatisfied,
            0x6986 => Self::CommandNotAllowed,
            0x6A80 => Self::BadKeyHandle,
            0x6B00 => Self::InvalidP1P2,
            0x6D00 => Self::InsNotSupported,
            0x6E00 => Self::ClaNotSupported,
            0x6F00 => Self::Unknown,
            0x6F01 => Self::SignVerifyError,
            _ => return Err(()),
        };

        Ok(code)
    }
}

impl APDUErrorCode {
    /// Human readable description of the status word
    pub fn description(&self) -> String {
        let msg = match self {
            Self::NoError => "[APDU_CODE_OK]",
            Self::ExecutionError => "[APDU_CODE_EXECUTION_ERROR] No information given (NV-Ram not changed)",
            Self::WrongLength => "[APDU_CODE_WRONG_LENGTH] Wrong length",
            Self::EmptyBuffer => "[APDU_CODE_EMPTY_BUFFER]",
            Self::OutputBufferTooSmall => "[APDU_CODE_OUTPUT_BUFFER_TOO_SMALL]",
            Self::DataInvalid => {
                "[APDU_CODE_DATA_INVALID] Referenced data reversibly blocked (invalidated)"
            }
            Self::ConditionsNotSatisfied => {
                "[APDU_CODE_CONDITIONS_NOT_SATISFIED] Conditions of use not satisfied"
            }
            Self::CommandNotAllowed => {
                "[APDU_CODE_COMMAND_NOT_ALLOWED] Command not allowed (no current EF)"
            }
            Self::BadKeyHandle => {
                "[APDU_CODE_BAD_KEY_HANDLE] The parameters in the data field are incorrect"
            }
            Self::InvalidP1P2 => "[APDU_CODE_INVALID_P1P2] Wrong parameter(s) P1-P2",
            Self::InsNotSupported => {
                "[APDU_CODE_INS_NOT_SUPPORTED] Instruction code not supported or invalid"
            }
            Self::ClaNotSupported => "[APDU_CODE_CLA_NOT_SUPPORTED] Class not supported",
            Self::Unknown => "[APDU_CODE_UNKNOWN]",
            Self::SignVerifyError => "[APDU_CODE_SIGN_VERIFY_ERROR]",
        };

        String::from(msg)
    }
}
