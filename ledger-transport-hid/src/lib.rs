mod errors;

use std::{ops::Deref, sync::Mutex};

pub use errors::LedgerHIDError;
pub use hidapi;
use hidapi::{DeviceInfo, HidApi, HidDevice};
use ledger_transport::{
    exchange_framed, APDUAnswer, APDUCommand, Exchange, PacketDevice, LEDGER_CHANNEL,
};
use log::info;

pub const LEDGER_VENDOR_ID: u16 = 0x2c97;
pub const LEDGER_USAGE_PAGE: u16 = 0xffa0;
// for Windows compatability, we prepend the buffer with a 0x00
// so the actual buffer is 64 bytes
pub const LEDGER_PACKET_WRITE_SIZE: u8 = 65;
pub const LEDGER_PACKET_READ_SIZE: u8 = 64;
pub const LEDGER_TIMEOUT: i32 = 10_000_000;

// USB Product IDs (Normal / Bootloader)
pub mod pid {
    pub const NANO_S_PLUS: u16 = 0x0050; // Identifiers: 0x50
    pub const NANO_S_PLUS_BL: u16 = 0x0005;

    pub const NANO_X: u16 = 0x0040; // Identifiers: 0x40
    pub const NANO_X_BL: u16 = 0x0004;

    pub const STAX: u16 = 0x0060; // Identifiers: 0x60
    pub const STAX_BL: u16 = 0x0006;

    pub const FLEX: u16 = 0x0070; // Identifiers: 0x70
    pub const FLEX_BL: u16 = 0x0007;
}

/// One HID report per packet
struct HidPackets<'a>(&'a HidDevice);

impl PacketDevice for HidPackets<'_> {
    type Error = LedgerHIDError;

    fn write_packet(&self, packet: &[u8]) -> Result<usize, Self::Error> {
        let mut buffer = Vec::with_capacity(LEDGER_PACKET_WRITE_SIZE as usize);
        // Windows platform requires 0x00 prefix and Linux/Mac tolerate this as well
        buffer.push(0x00);
        buffer.extend_from_slice(packet);

        let size = self.0.write(&buffer)?;
        Ok(size.saturating_sub(1))
    }

    fn read_packet(&self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        // hidapi reports a timeout as an empty read
        Ok(self.0.read_timeout(buffer, LEDGER_TIMEOUT)?)
    }
}

pub struct TransportNativeHID {
    device: Mutex<HidDevice>,
}

impl TransportNativeHID {
    fn is_ledger(dev: &DeviceInfo) -> bool {
        dev.vendor_id() == LEDGER_VENDOR_ID && dev.usage_page() == LEDGER_USAGE_PAGE
    }

    pub fn list_ledgers(api: &HidApi) -> impl Iterator<Item = &DeviceInfo> {
        api.device_list().filter(|dev| Self::is_ledger(dev))
    }

    pub fn open_device(api: &HidApi, device: &DeviceInfo) -> Result<Self, LedgerHIDError> {
        let device = device.open_device(api)?;
        let _ = device.set_blocking_mode(true);

        if let Ok(Some(product)) = device.get_product_string() {
            info!("opened Ledger device: {}", product);
        }

        let ledger = TransportNativeHID {
            device: Mutex::new(device),
        };

        Ok(ledger)
    }

    pub fn new(api: &HidApi) -> Result<Self, LedgerHIDError> {
        let first_ledger = Self::list_ledgers(api)
            .next()
            .ok_or(LedgerHIDError::DeviceNotFound)?;

        Self::open_device(api, first_ledger)
    }

    pub fn exchange<I: Deref<Target = [u8]>>(
        &self,
        command: &APDUCommand<I>,
    ) -> Result<APDUAnswer<Vec<u8>>, LedgerHIDError> {
        // held for the whole write/read pair so two exchanges never interleave
        let device = self
            .device
            .lock()
            .map_err(|_| LedgerHIDError::Comm("HID device poisoned"))?;

        exchange_framed(
            &HidPackets(&*device),
            LEDGER_CHANNEL,
            LEDGER_PACKET_READ_SIZE as usize,
            command,
        )
    }
}

impl Exchange for TransportNativeHID {
    type Error = LedgerHIDError;
    type AnswerType = Vec<u8>;

    fn exchange<I>(
        &self,
        command: &APDUCommand<I>,
    ) -> Result<APDUAnswer<Self::AnswerType>, Self::Error>
    where
        I: Deref<Target = [u8]>,
    {
        TransportNativeHID::exchange(self, command)
    }
}
