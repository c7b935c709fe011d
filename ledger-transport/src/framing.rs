//! Packet framing for the Ledger HID protocol.
//!
//! An APDU is prefixed with its big-endian length and sliced across
//! fixed-size packets. Every packet starts with the channel, the APDU tag and
//! a big-endian sequence index, and is zero padded to the packet size.
//! Answers come back framed the same way.

use std::{cmp::min, io::Cursor, ops::Deref};

use byteorder::{BigEndian, ReadBytesExt};
use ledger_apdu::{APDUAnswer, APDUCommand};
use log::debug;

use crate::{Exchange, ExchangeError, FramingError};

pub const LEDGER_CHANNEL: u16 = 0x0101;
pub const LEDGER_PACKET_SIZE: usize = 64;
pub const TAG_APDU: u8 = 0x05;

// channel(2) + tag(1) + sequence index(2)
const PACKET_HEADER_LEN: usize = 5;
// only present in the packet with sequence index 0
const APDU_LENGTH_LEN: usize = 2;

/// Raw packet link to a device, one fixed-size report at a time
pub trait PacketDevice {
    type Error: From<FramingError> + ExchangeError;

    /// Write a single packet and return how many of its bytes were accepted
    fn write_packet(&self, packet: &[u8]) -> Result<usize, Self::Error>;

    /// Read a single packet into `buffer`. `Ok(0)` means nothing arrived.
    fn read_packet(&self, buffer: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Split `command` into packets of exactly `packet_size` bytes
pub fn wrap_command_apdu(
    channel: u16,
    command: &[u8],
    packet_size: usize,
) -> Result<Vec<Vec<u8>>, FramingError> {
    if packet_size <= PACKET_HEADER_LEN + APDU_LENGTH_LEN {
        return Err(FramingError::InvalidPacketSize(packet_size));
    }
    let command_len =
        u16::try_from(command.len()).map_err(|_| FramingError::CommandTooLong(command.len()))?;

    let mut stream = Vec::with_capacity(command.len() + APDU_LENGTH_LEN);
    stream.extend_from_slice(&command_len.to_be_bytes());
    stream.extend_from_slice(command);

    // stream is at most 65537 bytes and each packet carries at least 3 of
    // them, so the index always fits in u16
    let packets = stream
        .chunks(packet_size - PACKET_HEADER_LEN)
        .enumerate()
        .map(|(idx, chunk)| {
            let mut packet = Vec::with_capacity(packet_size);
            packet.extend_from_slice(&channel.to_be_bytes());
            packet.push(TAG_APDU);
            packet.extend_from_slice(&(idx as u16).to_be_bytes());
            packet.extend_from_slice(chunk);
            packet.resize(packet_size, 0);
            packet
        })
        .collect();

    Ok(packets)
}

/// Read packets from `device` until the declared answer length is reached
pub fn unwrap_response_apdu<D>(
    device: &D,
    channel: u16,
    packet_size: usize,
) -> Result<Vec<u8>, D::Error>
where
    D: PacketDevice + ?Sized,
{
    let mut buffer = vec![0u8; packet_size];
    let mut answer = Vec::with_capacity(256);
    let mut sequence_idx = 0u16;
    let mut expected_apdu_len = 0usize;

    loop {
        let res = device.read_packet(&mut buffer)?;
        if res == 0 {
            return Err(FramingError::LostConnection.into());
        }
        if (sequence_idx == 0 && res < PACKET_HEADER_LEN + APDU_LENGTH_LEN)
            || res < PACKET_HEADER_LEN
        {
            return Err(FramingError::IncompleteHeader.into());
        }

        let packet = &buffer[..res];
        let mut rdr = Cursor::new(packet);

        let rcv_channel = read_u16(&mut rdr)?;
        let rcv_tag = rdr.read_u8().map_err(|_| FramingError::IncompleteHeader)?;
        let rcv_seq_idx = read_u16(&mut rdr)?;

        if rcv_channel != channel {
            return Err(FramingError::InvalidChannel {
                expected: channel,
                received: rcv_channel,
            }
            .into());
        }
        if rcv_tag != TAG_APDU {
            return Err(FramingError::InvalidTag(rcv_tag).into());
        }
        if rcv_seq_idx != sequence_idx {
            return Err(FramingError::InvalidSequence {
                expected: sequence_idx,
                received: rcv_seq_idx,
            }
            .into());
        }
        if rcv_seq_idx == 0 {
            expected_apdu_len = read_u16(&mut rdr)? as usize;
        }

        let start = rdr.position() as usize;
        let available = packet.len() - start;
        let missing = expected_apdu_len - answer.len();
        let new_chunk = &packet[start..start + min(available, missing)];

        debug!("[{:3}] >> {}", new_chunk.len(), hex::encode(new_chunk));

        answer.extend_from_slice(new_chunk);

        if answer.len() >= expected_apdu_len {
            return Ok(answer);
        }

        sequence_idx += 1;
    }
}

fn read_u16(rdr: &mut Cursor<&[u8]>) -> Result<u16, FramingError> {
    rdr.read_u16::<BigEndian>()
        .map_err(|_| FramingError::IncompleteHeader)
}

/// Send `command` as framed packets and read back the framed answer.
///
/// Every packet is written before reading starts. A short write aborts the
/// exchange, it is never retried.
pub fn exchange_framed<D, I>(
    device: &D,
    channel: u16,
    packet_size: usize,
    command: &APDUCommand<I>,
) -> Result<APDUAnswer<Vec<u8>>, D::Error>
where
    D: PacketDevice + ?Sized,
    I: Deref<Target = [u8]>,
{
    let serialized = command.serialize().map_err(FramingError::from)?;

    for packet in wrap_command_apdu(channel, &serialized, packet_size)? {
        debug!("[{:3}] << {}", packet.len(), hex::encode(&packet));

        let written = device.write_packet(&packet)?;
        if written < packet.len() {
            return Err(FramingError::ShortWrite {
                written,
                expected: packet.len(),
            }
            .into());
        }
    }

    let answer = unwrap_response_apdu(device, channel, packet_size)?;
    Ok(APDUAnswer::from_answer(answer).map_err(FramingError::from)?)
}

/// [`Exchange`] implementation over any [`PacketDevice`]
#[derive(Debug)]
pub struct FramedTransport<D> {
    device: D,
    channel: u16,
    packet_size: usize,
}

impl<D> FramedTransport<D> {
    /// Frame on the default Ledger channel with 64 byte packets
    pub fn new(device: D) -> Self {
        Self::with_channel(device, LEDGER_CHANNEL, LEDGER_PACKET_SIZE)
    }

    pub fn with_channel(device: D, channel: u16, packet_size: usize) -> Self {
        FramedTransport {
            device,
            channel,
            packet_size,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn into_inner(self) -> D {
        self.device
    }
}

impl<D> Exchange for FramedTransport<D>
where
    D: PacketDevice,
{
    type Error = D::Error;
    type AnswerType = Vec<u8>;

    fn exchange<I>(
        &self,
        command: &APDUCommand<I>,
    ) -> Result<APDUAnswer<Self::AnswerType>, Self::Error>
    where
        I: Deref<Target = [u8]>,
    {
        exchange_framed(&self.device, self.channel, self.packet_size, command)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::VecDeque};

    use ledger_apdu::APDUAnswerError;

    use super::*;

    /// Records written packets and replays queued ones
    #[derive(Default)]
    struct SimDevice {
        written: RefCell<Vec<Vec<u8>>>,
        pending: RefCell<VecDeque<Vec<u8>>>,
        drop_last_byte: bool,
    }

    impl SimDevice {
        fn answering(answer: &[u8]) -> Self {
            let device = SimDevice::default();
            device.queue(wrap_command_apdu(LEDGER_CHANNEL, answer, LEDGER_PACKET_SIZE).unwrap());
            device
        }

        fn queue(&self, packets: Vec<Vec<u8>>) {
            self.pending.borrow_mut().extend(packets);
        }
    }

    impl PacketDevice for SimDevice {
        type Error = FramingError;

        fn write_packet(&self, packet: &[u8]) -> Result<usize, Self::Error> {
            self.written.borrow_mut().push(packet.to_vec());
            if self.drop_last_byte {
                Ok(packet.len() - 1)
            } else {
                Ok(packet.len())
            }
        }

        fn read_packet(&self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
            match self.pending.borrow_mut().pop_front() {
                Some(packet) => {
                    buffer[..packet.len()].copy_from_slice(&packet);
                    Ok(packet.len())
                }
                None => Ok(0),
            }
        }
    }

    #[test]
    fn wrap_single_packet() {
        let command = [0x55, 0x00, 0x00, 0x00, 0x00];
        let packets = wrap_command_apdu(LEDGER_CHANNEL, &command, LEDGER_PACKET_SIZE).unwrap();

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), LEDGER_PACKET_SIZE);
        assert_eq!(
            &packets[0][..12],
            &[0x01, 0x01, 0x05, 0x00, 0x00, 0x00, 0x05, 0x55, 0x00, 0x00, 0x00, 0x00]
        );
        assert!(packets[0][12..].iter().all(|&b| b == 0));
    }

    #[test]
    fn wrap_multiple_packets() {
        // 2 length bytes + 200 command bytes over 59 byte packet payloads
        let command = vec![0xAB; 200];
        let packets = wrap_command_apdu(LEDGER_CHANNEL, &command, LEDGER_PACKET_SIZE).unwrap();

        assert_eq!(packets.len(), 4);
        for (idx, packet) in packets.iter().enumerate() {
            assert_eq!(packet.len(), LEDGER_PACKET_SIZE);
            assert_eq!(&packet[..3], &[0x01, 0x01, TAG_APDU]);
            assert_eq!(u16::from_be_bytes([packet[3], packet[4]]) as usize, idx);
        }
        assert_eq!(&packets[0][5..7], &[0x00, 200]);
        // 202 - 3 * 59 = 25 bytes of stream left for the last packet
        assert!(packets[3][5 + 25..].iter().all(|&b| b == 0));
    }

    #[test]
    fn wrap_rejects_tiny_packets() {
        assert_eq!(
            wrap_command_apdu(LEDGER_CHANNEL, &[1, 2, 3], 7),
            Err(FramingError::InvalidPacketSize(7))
        );
    }

    #[test]
    fn wrap_then_unwrap_recovers_bytes() {
        for len in [0usize, 1, 57, 58, 59, 200, 1000] {
            let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let device = SimDevice::default();
            device.queue(wrap_command_apdu(LEDGER_CHANNEL, &payload, LEDGER_PACKET_SIZE).unwrap());

            let unwrapped =
                unwrap_response_apdu(&device, LEDGER_CHANNEL, LEDGER_PACKET_SIZE).unwrap();
            assert_eq!(unwrapped, payload, "length {}", len);
        }
    }

    #[test]
    fn unwrap_rejects_other_channel() {
        let device = SimDevice::default();
        device.queue(wrap_command_apdu(0x8001, &[0x90, 0x00], LEDGER_PACKET_SIZE).unwrap());

        assert_eq!(
            unwrap_response_apdu(&device, LEDGER_CHANNEL, LEDGER_PACKET_SIZE),
            Err(FramingError::InvalidChannel {
                expected: LEDGER_CHANNEL,
                received: 0x8001
            })
        );
    }

    #[test]
    fn unwrap_rejects_bad_tag() {
        let mut packets = wrap_command_apdu(LEDGER_CHANNEL, &[0x90, 0x00], LEDGER_PACKET_SIZE).unwrap();
        packets[0][2] = 0x02;
        let device = SimDevice::default();
        device.queue(packets);

        assert_eq!(
            unwrap_response_apdu(&device, LEDGER_CHANNEL, LEDGER_PACKET_SIZE),
            Err(FramingError::InvalidTag(0x02))
        );
    }

    #[test]
    fn unwrap_rejects_out_of_order_packets() {
        let mut packets = wrap_command_apdu(LEDGER_CHANNEL, &[0x11; 150], LEDGER_PACKET_SIZE).unwrap();
        assert_eq!(packets.len(), 3);
        packets.swap(1, 2);
        let device = SimDevice::default();
        device.queue(packets);

        assert_eq!(
            unwrap_response_apdu(&device, LEDGER_CHANNEL, LEDGER_PACKET_SIZE),
            Err(FramingError::InvalidSequence {
                expected: 1,
                received: 2
            })
        );
    }

    #[test]
    fn unwrap_reports_lost_connection() {
        let mut packets = wrap_command_apdu(LEDGER_CHANNEL, &[0x11; 100], LEDGER_PACKET_SIZE).unwrap();
        packets.truncate(1);
        let device = SimDevice::default();
        device.queue(packets);

        let err = unwrap_response_apdu(&device, LEDGER_CHANNEL, LEDGER_PACKET_SIZE).unwrap_err();
        assert_eq!(err, FramingError::LostConnection);
        assert!(err.is_connection_error());
    }

    #[test]
    fn unwrap_rejects_incomplete_header() {
        let device = SimDevice::default();
        device.queue(vec![vec![0x01, 0x01, 0x05, 0x00, 0x00, 0x00]]);

        assert_eq!(
            unwrap_response_apdu(&device, LEDGER_CHANNEL, LEDGER_PACKET_SIZE),
            Err(FramingError::IncompleteHeader)
        );
    }

    #[test]
    fn exchange_writes_every_packet_then_reads_answer() {
        let device = SimDevice::answering(&[0xCA, 0xFE, 0x90, 0x00]);
        let command = APDUCommand {
            cla: 0x55,
            ins: 0x02,
            p1: 0x00,
            p2: 0x00,
            data: vec![0x42; 120],
        };

        let answer = exchange_framed(&device, LEDGER_CHANNEL, LEDGER_PACKET_SIZE, &command).unwrap();
        assert_eq!(answer.data(), &[0xCA, 0xFE]);
        assert_eq!(answer.retcode(), 0x9000);

        // 2 + 5 + 120 bytes of stream need three packets
        let written = device.written.borrow().clone();
        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|p| p.len() == LEDGER_PACKET_SIZE));

        // the device side sees the exact serialized command
        let echo = SimDevice::default();
        echo.queue(written);
        let received = unwrap_response_apdu(&echo, LEDGER_CHANNEL, LEDGER_PACKET_SIZE).unwrap();
        assert_eq!(received, command.serialize().unwrap());
    }

    #[test]
    fn exchange_aborts_on_short_write() {
        let mut device = SimDevice::answering(&[0x90, 0x00]);
        device.drop_last_byte = true;
        let command = APDUCommand {
            cla: 0x55,
            ins: 0x00,
            p1: 0,
            p2: 0,
            data: Vec::new(),
        };

        let err = exchange_framed(&device, LEDGER_CHANNEL, LEDGER_PACKET_SIZE, &command).unwrap_err();
        assert_eq!(
            err,
            FramingError::ShortWrite {
                written: 63,
                expected: 64
            }
        );
        // nothing was read after the failed write
        assert_eq!(device.pending.borrow().len(), 1);
    }

    #[test]
    fn exchange_rejects_answer_without_status_word() {
        let device = SimDevice::answering(&[0x90]);
        let transport = FramedTransport::new(device);
        let command = APDUCommand {
            cla: 0x55,
            ins: 0x00,
            p1: 0,
            p2: 0,
            data: Vec::new(),
        };

        let err = transport.exchange(&command).unwrap_err();
        assert_eq!(err, FramingError::Answer(APDUAnswerError::TooShort));
        assert!(err.is_invalid_answer());
        assert!(!err.is_connection_error());
    }

    #[test]
    fn exchange_rejects_oversized_command() {
        let device = SimDevice::default();
        let command = APDUCommand {
            cla: 0x55,
            ins: 0x02,
            p1: 0,
            p2: 0,
            data: vec![0u8; 300],
        };

        assert!(matches!(
            exchange_framed(&device, LEDGER_CHANNEL, LEDGER_PACKET_SIZE, &command),
            Err(FramingError::Command(_))
        ));
        assert!(device.written.borrow().is_empty());
    }
}
