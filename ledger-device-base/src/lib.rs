mod chunks;
mod errors;
mod version;

pub use chunks::*;
pub use errors::*;
use ledger_transport::{APDUAnswer, APDUCommand, APDUErrorCode, Exchange};
use log::{debug, warn};
pub use version::*;

// Ledger generic (non app-specific) APDU constants
const INS_GET_VERSION: u8 = 0x00;
const VERSION_RESPONSE_LEN: usize = 4;

/// Defines what we can consider an "App"
pub trait App {
    /// App's APDU CLA
    const CLA: u8;
}

pub trait AppExt<E>: App
where
    E: Exchange,
    E::Error: std::error::Error,
{
    /// Check APDU status word. Ok on 0x9000, otherwise map to SDK errors.
    fn handle_response_error(
        response: &APDUAnswer<E::AnswerType>,
    ) -> Result<(), LedgerAppError<E::Error>> {
        match response.error_code() {
            Ok(APDUErrorCode::NoError) => Ok(()),
            Ok(err) => Err(LedgerAppError::AppSpecific(err as _, err.description())),
            Err(err) => Err(LedgerAppError::Unknown(err)),
        }
    }

    /// Same as `handle_response_error`, but surfaces the diagnostic text
    /// the app places in the payload of bad-data answers.
    fn handle_response_error_diagnostic(
        response: &APDUAnswer<E::AnswerType>,
    ) -> Result<(), LedgerAppError<E::Error>> {
        match embedded_diagnostic(response.retcode(), response.data()) {
            Some(text) => Err(LedgerAppError::Diagnostic(response.retcode(), text)),
            None => Self::handle_response_error(response),
        }
    }

    /// Same as `handle_response_error`, but also requires non-empty payload (signature).
    fn handle_response_error_signature(
        response: &APDUAnswer<E::AnswerType>,
    ) -> Result<(), LedgerAppError<E::Error>> {
        Self::handle_response_error_diagnostic(response)?;
        if response.data().is_empty() {
            return Err(LedgerAppError::NoSignature);
        }
        Ok(())
    }

    /// Query application version using the implementing app's CLA.
    fn get_version(transport: &E) -> Result<VersionInfo, LedgerAppError<E::Error>> {
        let command = APDUCommand {
            cla: Self::CLA,
            ins: INS_GET_VERSION,
            p1: 0x00,
            p2: 0x00,
            data: Vec::new(),
        };

        let response = transport
            .exchange(&command)
            .map_err(LedgerAppError::from_exchange)?;
        Self::handle_response_error(&response)?;

        match response.data() {
            [app_mode, major, minor, patch, ..] => {
                Ok(VersionInfo::new(*app_mode, *major, *minor, *patch))
            }
            data => Err(LedgerAppError::InvalidResponseLength {
                expected: VERSION_RESPONSE_LEN,
                actual: data.len(),
            }),
        }
    }

    /// Send `leading` (if any) and then `message` in chunks, one exchange per packet.
    ///
    /// Stops at the first failure. On success the answer to the last
    /// packet is returned; earlier answers are discarded.
    fn send_chunks(
        transport: &E,
        ins: u8,
        p2: u8,
        leading: Option<&[u8]>,
        message: &[u8],
        policy: ChunkPolicy,
    ) -> Result<APDUAnswer<E::AnswerType>, LedgerAppError<E::Error>> {
        if policy == ChunkPolicy::V2 && p2 > MAX_SIGN_MODE {
            return Err(LedgerAppError::InvalidSignMode(p2));
        }

        let plan = ChunkPlan::new::<E::Error>(message.len(), leading.is_some(), policy)?;
        let packets = leading
            .into_iter()
            .chain(message.chunks(USER_MESSAGE_CHUNK_SIZE));

        let mut last = None;
        for (index, payload) in (1..=plan.packet_count()).zip(packets) {
            let (p1, p2) = plan.params(index, p2);
            debug!(
                "chunk {}/{} ins={:#04x} p1={:#04x} p2={:#04x} len={}",
                index,
                plan.packet_count(),
                ins,
                p1,
                p2,
                payload.len()
            );

            let command = APDUCommand {
                cla: Self::CLA,
                ins,
                p1,
                p2,
                data: payload,
            };

            let response = transport.exchange(&command).map_err(|err| {
                warn!("chunk {}/{} transport failure: {}", index, plan.packet_count(), err);
                LedgerAppError::from_exchange(err)
            })?;

            if let Err(err) = Self::handle_response_error_diagnostic(&response) {
                warn!("chunk {}/{} rejected: {}", index, plan.packet_count(), err);
                return Err(err);
            }

            last = Some(response);
        }

        last.ok_or(LedgerAppError::InvalidEmptyMessage)
    }
}

impl<T, E> AppExt<E> for T
where
    T: App,
    E: Exchange,
    E::Error: std::error::Error,
{
}

#[cfg(test)]
mod tests {
    use ledger_transport::mock::{MockError, MockTransport};

    use super::*;

    struct TestApp;

    impl App for TestApp {
        const CLA: u8 = 0x55;
    }

    type Error = LedgerAppError<MockError>;

    fn send(
        mock: &MockTransport,
        p2: u8,
        leading: Option<&[u8]>,
        message: &[u8],
        policy: ChunkPolicy,
    ) -> Result<APDUAnswer<Vec<u8>>, Error> {
        <TestApp as AppExt<MockTransport>>::send_chunks(mock, 0x02, p2, leading, message, policy)
    }

    #[test]
    fn version_is_decoded() {
        let mock = MockTransport::new().answer(&[0xFF, 2, 1, 7], 0x9000);

        let version = <TestApp as AppExt<MockTransport>>::get_version(&mock).unwrap();
        assert_eq!(version, VersionInfo::new(0xFF, 2, 1, 7));
        assert_eq!(mock.serialized_commands(), vec![vec![0x55, 0x00, 0x00, 0x00, 0x00]]);
    }

    #[test]
    fn version_too_short() {
        let mock = MockTransport::new().answer(&[0, 2, 1], 0x9000);

        let err = <TestApp as AppExt<MockTransport>>::get_version(&mock).unwrap_err();
        assert_eq!(
            err,
            LedgerAppError::InvalidResponseLength {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn version_status_failure() {
        let mock = MockTransport::new().answer(&[], 0x6E00);

        let err = <TestApp as AppExt<MockTransport>>::get_version(&mock).unwrap_err();
        assert_eq!(err.status_code(), Some(0x6E00));
        assert!(matches!(err, LedgerAppError::AppSpecific(0x6E00, _)));
    }

    #[test]
    fn unknown_status_word() {
        let mock = MockTransport::new().answer(&[], 0x6123);

        let err = <TestApp as AppExt<MockTransport>>::get_version(&mock).unwrap_err();
        assert_eq!(err, LedgerAppError::Unknown(0x6123));
    }

    #[test]
    fn v2_chunks_keep_last_answer() {
        let path = [0x05u8; 21];
        let message = vec![0xAB; 700];
        let mock = MockTransport::new()
            .acks(3)
            .answer(&[0x30, 0x44], 0x9000);

        let answer = send(&mock, 0, Some(&path[..]), &message, ChunkPolicy::V2).unwrap();
        assert_eq!(answer.data(), &[0x30, 0x44]);

        let commands = mock.commands();
        let headers: Vec<_> = commands.iter().map(|c| (c.p1, c.p2, c.data.len())).collect();
        assert_eq!(headers, vec![(0, 0, 21), (1, 0, 250), (1, 0, 250), (2, 0, 200)]);
        assert!(commands.iter().all(|c| c.cla == 0x55 && c.ins == 0x02));

        let sent: Vec<u8> = commands[1..].iter().flat_map(|c| c.data.clone()).collect();
        assert_eq!(sent, message);
    }

    #[test]
    fn v1_chunks_count_packets() {
        let path = [0x05u8; 21];
        let mock = MockTransport::new().acks(2).answer(&[1], 0x9000);

        send(&mock, 1, Some(&path[..]), &[7u8; 260], ChunkPolicy::V1).unwrap();

        let params: Vec<_> = mock.commands().iter().map(|c| (c.p1, c.p2)).collect();
        assert_eq!(params, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn data_only_chunks() {
        let mock = MockTransport::new().answer(&[9; 32], 0x9000);

        let answer = send(&mock, 0, None, &[1, 2, 3], ChunkPolicy::V1).unwrap();
        assert_eq!(answer.data().len(), 32);
        assert_eq!(mock.serialized_commands(), vec![vec![0x55, 0x02, 1, 1, 3, 1, 2, 3]]);
    }

    #[test]
    fn invalid_sign_mode_sends_nothing() {
        let mock = MockTransport::new();

        let err = send(&mock, 2, Some(&[0u8][..]), &[1], ChunkPolicy::V2).unwrap_err();
        assert_eq!(err, LedgerAppError::InvalidSignMode(2));
        assert!(err.is_invalid_input());
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn empty_message_sends_nothing() {
        let mock = MockTransport::new();

        let err = send(&mock, 0, None, &[], ChunkPolicy::V1).unwrap_err();
        assert_eq!(err, LedgerAppError::InvalidEmptyMessage);
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn oversized_message_sends_nothing() {
        let mock = MockTransport::new();

        let err = send(&mock, 0, Some(&[0u8][..]), &vec![0; 250 * 255], ChunkPolicy::V2).unwrap_err();
        assert_eq!(err, LedgerAppError::InvalidMessageSize);
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn diagnostic_aborts_sequence() {
        let mock = MockTransport::new()
            .acks(1)
            .answer(b"PARSER ERROR: JSMN_ERROR_INVAL", 0x6A80)
            .acks(2);

        let err = send(&mock, 0, Some(&[0u8][..]), &[0; 600], ChunkPolicy::V2).unwrap_err();
        assert_eq!(
            err,
            LedgerAppError::Diagnostic(0x6A80, "PARSER ERROR: JSMN_ERROR_INVAL".to_string())
        );
        assert_eq!(err.to_string(), "PARSER ERROR: JSMN_ERROR_INVAL");
        assert_eq!(err.hint(), Some("Unexpected character in JSON string"));
        assert_eq!(mock.commands().len(), 2);
        assert_eq!(mock.remaining(), 2);
    }

    #[test]
    fn data_invalid_text_is_verbatim() {
        let mock = MockTransport::new()
            .acks(1)
            .answer(b"Unexpected field", 0x6984);

        let err = send(&mock, 1, Some(&[0u8][..]), &[0; 10], ChunkPolicy::V2).unwrap_err();
        assert_eq!(err, LedgerAppError::Diagnostic(0x6984, "Unexpected field".to_string()));
        assert_eq!(err.hint(), None);
    }

    #[test]
    fn empty_diagnostic_falls_back_to_status() {
        let mock = MockTransport::new().answer(&[], 0x6A80);

        let err = send(&mock, 0, Some(&[0u8][..]), &[], ChunkPolicy::V2).unwrap_err();
        assert!(matches!(err, LedgerAppError::AppSpecific(0x6A80, _)));
    }

    #[test]
    fn transport_failure_aborts_sequence() {
        let mock = MockTransport::new()
            .acks(1)
            .fail(MockError::Link("unplugged"))
            .acks(1);

        let err = send(&mock, 0, Some(&[0u8][..]), &[0; 300], ChunkPolicy::V1).unwrap_err();
        assert_eq!(err, LedgerAppError::TransportError(MockError::Link("unplugged")));
        assert!(err.is_transport_error());
        assert_eq!(mock.remaining(), 1);
    }

    #[test]
    fn short_answer_is_a_decoding_failure() {
        let mock = MockTransport::new().raw_answer(&[0x90]);

        let err = <TestApp as AppExt<MockTransport>>::get_version(&mock).unwrap_err();
        assert!(matches!(err, LedgerAppError::InvalidAnswer(_)));
        assert!(!err.is_transport_error());

        let mock = MockTransport::new().acks(1).raw_answer(&[]);
        let err = send(&mock, 0, Some(&[0u8][..]), &[1; 10], ChunkPolicy::V2).unwrap_err();
        assert!(matches!(err, LedgerAppError::InvalidAnswer(_)));
        assert_eq!(mock.commands().len(), 2);
    }

    #[test]
    fn chunks_reassemble_byte_for_byte() {
        let cases = [
            (0usize, true),
            (1, true),
            (249, true),
            (250, true),
            (251, true),
            (250 * 254, true),
            (250 * 255 - 1, false),
        ];

        for (len, with_path) in cases {
            let message: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let path = [0x05u8; 21];
            let leading = with_path.then_some(&path[..]);
            let mock = MockTransport::new().acks(255);

            send(&mock, 0, leading, &message, ChunkPolicy::V1).unwrap();

            let commands = mock.commands();
            let expected = len.div_ceil(USER_MESSAGE_CHUNK_SIZE) + usize::from(with_path);
            assert_eq!(commands.len(), expected, "len {len}");

            let data = if with_path {
                assert_eq!(commands[0].data, path.to_vec(), "len {len}");
                &commands[1..]
            } else {
                &commands[..]
            };
            let sent: Vec<u8> = data.iter().flat_map(|c| c.data.clone()).collect();
            assert_eq!(sent, message, "len {len}");
            assert!(data.iter().all(|c| c.data.len() <= USER_MESSAGE_CHUNK_SIZE));
            assert!(commands
                .iter()
                .enumerate()
                .all(|(i, c)| (c.p1 as usize, c.p2 as usize) == (i + 1, expected)));
        }
    }

    #[test]
    fn signature_must_not_be_empty() {
        let empty = APDUAnswer::from_answer(vec![0x90, 0x00]).unwrap();
        let err = <TestApp as AppExt<MockTransport>>::handle_response_error_signature(&empty)
            .unwrap_err();
        assert_eq!(err, LedgerAppError::NoSignature);

        let signed = APDUAnswer::from_answer(vec![0x30, 0x90, 0x00]).unwrap();
        assert!(<TestApp as AppExt<MockTransport>>::handle_response_error_signature(&signed).is_ok());
    }
}
