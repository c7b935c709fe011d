//! Scripted in-memory [`Exchange`] used to drive app logic without a device.

use std::{cell::RefCell, collections::VecDeque, ops::Deref};

use ledger_apdu::{APDUAnswer, APDUCommand};
use thiserror::Error;

use crate::{Exchange, ExchangeError, FramingError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MockError {
    /// More exchanges were attempted than answers were scripted
    #[error("mock transport: no scripted answer left")]
    Exhausted,
    /// Scripted link failure
    #[error("mock transport: {0}")]
    Link(&'static str),
    #[error("mock transport: {0}")]
    Framing(#[from] FramingError),
}

impl ExchangeError for MockError {
    fn is_invalid_answer(&self) -> bool {
        matches!(self, MockError::Framing(e) if e.is_invalid_answer())
    }
}

/// Replays queued answers in order and records every command it receives
#[derive(Debug, Default)]
pub struct MockTransport {
    answers: RefCell<VecDeque<Result<Vec<u8>, MockError>>>,
    commands: RefCell<Vec<APDUCommand<Vec<u8>>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an answer carrying `data` followed by the status word `sw`
    pub fn answer(self, data: &[u8], sw: u16) -> Self {
        let mut raw = data.to_vec();
        raw.extend_from_slice(&sw.to_be_bytes());
        self.answers.borrow_mut().push_back(Ok(raw));
        self
    }

    /// Queue `count` empty success answers
    pub fn acks(self, count: usize) -> Self {
        (0..count).fold(self, |mock, _| mock.answer(&[], 0x9000))
    }

    /// Queue raw answer bytes, status word included
    pub fn raw_answer(self, raw: &[u8]) -> Self {
        self.answers.borrow_mut().push_back(Ok(raw.to_vec()));
        self
    }

    /// Queue a transport failure
    pub fn fail(self, error: MockError) -> Self {
        self.answers.borrow_mut().push_back(Err(error));
        self
    }

    /// Commands received so far, in order
    pub fn commands(&self) -> Vec<APDUCommand<Vec<u8>>> {
        self.commands.borrow().clone()
    }

    /// Serialized form of the commands received so far
    pub fn serialized_commands(&self) -> Vec<Vec<u8>> {
        self.commands
            .borrow()
            .iter()
            .filter_map(|c| c.serialize().ok())
            .collect()
    }

    /// Scripted answers not consumed yet
    pub fn remaining(&self) -> usize {
        self.answers.borrow().len()
    }
}

impl Exchange for MockTransport {
    type Error = MockError;
    type AnswerType = Vec<u8>;

    fn exchange<I>(
        &self,
        command: &APDUCommand<I>,
    ) -> Result<APDUAnswer<Self::AnswerType>, Self::Error>
    where
        I: Deref<Target = [u8]>,
    {
        // same length check a real transport applies before sending
        command.serialize().map_err(FramingError::from)?;

        self.commands.borrow_mut().push(APDUCommand {
            cla: command.cla,
            ins: command.ins,
            p1: command.p1,
            p2: command.p2,
            data: command.data.to_vec(),
        });

        let raw = self
            .answers
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(MockError::Exhausted))?;

        Ok(APDUAnswer::from_answer(raw).map_err(FramingError::from)?)
    }
}
