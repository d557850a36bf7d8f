use crate::command::Registrar;
use crate::error::{Result, SpiError};
use crate::hexdump::hex_dump;
use crate::params::SpiParams;
use crate::spidev::{AppliedSettings, SpiBus, Spidev};
use crate::verbosity::{self, Verbosity};

use log::{debug, info, log_enabled, trace, Level};

const PRINT_BANNER: &str = "onion-spi::";
const HEX_DUMP_LINE: usize = 32;

/// Outcome of `SpiDevice::register_device`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The node was already there, nothing was loaded
    AlreadyPresent,
    Registered,
}

/// Handle to one SPI device, addressed by bus and device number
pub struct SpiDevice<B: SpiBus = Spidev> {
    pub params: SpiParams,
    bus: B,
    registrar: Registrar,
}

impl SpiDevice<Spidev> {
    pub fn new(bus: u32, device: u32) -> Self {
        Self::with_bus(SpiParams::new(bus, device), Spidev::default())
    }
}

impl<B: SpiBus> SpiDevice<B> {
    pub fn with_bus(params: SpiParams, bus: B) -> Self {
        SpiDevice {
            params,
            bus,
            registrar: Registrar::default(),
        }
    }

    pub fn with_registrar(mut self, registrar: Registrar) -> Self {
        self.registrar = registrar;
        self
    }

    pub fn set_device(&mut self, bus: u32, device: u32) {
        self.params.bus = bus;
        self.params.device = device;
    }

    /// Restore every parameter to its default
    pub fn reset(&mut self) {
        self.params = SpiParams::default();
    }

    pub fn set_verbosity(&self, level: i32) {
        verbosity::set_verbosity(Verbosity::from_level(level));
    }

    pub fn check_device(&self) -> bool {
        self.bus.exists(&self.params)
    }

    pub fn register_device(&mut self) -> Result<Registration> {
        if self.check_device() {
            debug!(
                "{} spidev{}.{} already present, skipping registration",
                PRINT_BANNER, self.params.bus, self.params.device
            );
            return Ok(Registration::AlreadyPresent);
        }
        self.registrar.register(&self.params)?;
        Ok(Registration::Registered)
    }

    /// Push mode, bits per word and speed to the driver and adopt what it reports
    pub fn setup_device(&mut self) -> Result<AppliedSettings> {
        self.log_settings("Set");
        let applied = self.bus.configure(&self.params)?;

        self.params.mode = applied.mode;
        self.params.bits_per_word = applied.bits_per_word;
        self.params.speed_hz = applied.speed_hz;
        self.log_settings("Got");

        Ok(applied)
    }

    fn log_settings(&self, verb: &str) {
        info!("> {} SPI mode:      0x{:x}", verb, self.params.mode.bits());
        info!("> {} bits per word: {}", verb, self.params.bits_per_word);
        info!(
            "> {} max speed:     {} Hz ({} KHz)",
            verb,
            self.params.speed_hz,
            self.params.speed_hz / 1000
        );
    }

    pub fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        if tx.is_empty() {
            return Err(SpiError::InvalidTransfer("nothing to transfer".into()));
        }
        if tx.len() != rx.len() {
            return Err(SpiError::InvalidTransfer(format!(
                "tx is {} bytes but rx is {}",
                tx.len(),
                rx.len()
            )));
        }

        debug!(
            "{} Transferring 0x{:02x}, {} byte{}",
            PRINT_BANNER,
            tx[0],
            tx.len(),
            if tx.len() > 1 { "s" } else { "" }
        );

        let moved = self.bus.transfer(&self.params, tx, rx)?;
        debug!("   Received: 0x{:02x}, ioctl status: {}", rx[0], moved);

        if log_enabled!(Level::Trace) {
            trace!("\n{}", hex_dump(tx, HEX_DUMP_LINE, "TX"));
            trace!("\n{}", hex_dump(rx, HEX_DUMP_LINE, "RX"));
        }

        Ok(())
    }

    /// Clock out `addr` followed by zeros; `bytes` counts the address byte
    pub fn read_bytes(&mut self, addr: u8, bytes: usize) -> Result<Vec<u8>> {
        let mut tx = vec![0u8; bytes];
        let mut rx = vec![0u8; bytes];
        if let Some(first) = tx.first_mut() {
            *first = addr;
        }
        self.transfer(&tx, &mut rx)?;
        Ok(rx)
    }

    pub fn write_bytes(&mut self, addr: u8, values: &[u8]) -> Result<()> {
        if values.is_empty() {
            return Err(SpiError::InvalidTransfer("no values to write".into()));
        }
        let mut tx = Vec::with_capacity(values.len() + 1);
        tx.push(addr);
        tx.extend_from_slice(values);
        let mut rx = vec![0u8; tx.len()];
        self.transfer(&tx, &mut rx)
    }

    pub fn write(&mut self, values: &[u8]) -> Result<()> {
        let mut rx = vec![0u8; values.len()];
        self.transfer(values, &mut rx)
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ModeFlags;

    /// Records transfers and answers with a canned response
    #[derive(Default)]
    struct MockBus {
        present: bool,
        response: Vec<u8>,
        sent: Vec<Vec<u8>>,
        configured: Vec<SpiParams>,
        fail_transfer: bool,
    }

    impl SpiBus for MockBus {
        fn exists(&self, _params: &SpiParams) -> bool {
            self.present
        }

        fn configure(&mut self, params: &SpiParams) -> Result<AppliedSettings> {
            self.configured.push(params.clone());
            // driver clamps speed and drops the dual-lane bits
            Ok(AppliedSettings {
                mode: params.mode - ModeFlags::TX_DUAL - ModeFlags::RX_DUAL,
                bits_per_word: 8,
                speed_hz: params.speed_hz.min(50_000),
            })
        }

        fn transfer(&mut self, _params: &SpiParams, tx: &[u8], rx: &mut [u8]) -> Result<usize> {
            if self.fail_transfer {
                return Err(SpiError::TransferFailed(std::io::Error::from_raw_os_error(
                    libc::EIO,
                )));
            }
            self.sent.push(tx.to_vec());
            for (i, byte) in rx.iter_mut().enumerate() {
                *byte = self.response.get(i).copied().unwrap_or(0);
            }
            Ok(tx.len())
        }
    }

    fn device(bus: MockBus) -> SpiDevice<MockBus> {
        SpiDevice::with_bus(SpiParams::new(0, 1), bus)
    }

    #[test]
    fn test_read_bytes_puts_address_first() {
        let mut spi = device(MockBus {
            response: vec![0x5a, 0x11],
            ..Default::default()
        });
        let read = spi.read_bytes(0xee, 2).unwrap();
        assert_eq!(read, vec![0x5a, 0x11]);
        assert_eq!(spi.bus().sent, vec![vec![0xee, 0x00]]);
    }

    #[test]
    fn test_write_bytes_prepends_address() {
        let mut spi = device(MockBus::default());
        spi.write_bytes(0x02, &[0x0d]).unwrap();
        assert_eq!(spi.bus().sent, vec![vec![0x02, 0x0d]]);
    }

    #[test]
    fn test_write_bytes_rejects_empty() {
        let mut spi = device(MockBus::default());
        assert!(matches!(
            spi.write_bytes(0x02, &[]),
            Err(SpiError::InvalidTransfer(_))
        ));
        assert!(spi.bus().sent.is_empty());
    }

    #[test]
    fn test_raw_write() {
        let mut spi = device(MockBus::default());
        spi.write(&[0x02, 0x0c]).unwrap();
        assert_eq!(spi.bus().sent, vec![vec![0x02, 0x0c]]);
        assert!(spi.write(&[]).is_err());
    }

    #[test]
    fn test_transfer_length_mismatch() {
        let mut spi = device(MockBus::default());
        let mut rx = [0u8; 1];
        assert!(spi.transfer(&[1, 2], &mut rx).is_err());
    }

    #[test]
    fn test_transfer_failure_propagates() {
        let mut spi = device(MockBus {
            fail_transfer: true,
            ..Default::default()
        });
        assert!(matches!(
            spi.read_bytes(0x80, 1),
            Err(SpiError::TransferFailed(_))
        ));
    }

    #[test]
    fn test_setup_adopts_driver_values() {
        let mut spi = device(MockBus::default());
        let applied = spi.setup_device().unwrap();
        assert_eq!(applied.bits_per_word, 8);
        assert_eq!(spi.params.speed_hz, 50_000);
        assert_eq!(spi.params.mode, ModeFlags::MODE_0);
        assert_eq!(spi.bus().configured[0].speed_hz, 100_000);
    }

    #[test]
    fn test_register_skips_present_device() {
        let mut spi = device(MockBus {
            present: true,
            ..Default::default()
        })
        .with_registrar(Registrar {
            loader: "false".into(),
            module: "unused".into(),
        });
        assert!(spi.check_device());
        assert_eq!(spi.register_device().unwrap(), Registration::AlreadyPresent);
    }

    #[test]
    fn test_register_runs_loader() {
        let mut spi = device(MockBus::default()).with_registrar(Registrar {
            loader: "true".into(),
            module: "spi-gpio-custom".into(),
        });
        assert_eq!(spi.register_device().unwrap(), Registration::Registered);

        let mut failing = device(MockBus::default()).with_registrar(Registrar {
            loader: "false".into(),
            module: "spi-gpio-custom".into(),
        });
        assert!(failing.register_device().is_err());
    }

    #[test]
    fn test_set_device_and_reset() {
        let mut spi = device(MockBus::default());
        spi.set_device(3, 2);
        spi.params.speed_hz = 1;
        assert_eq!((spi.params.bus, spi.params.device), (3, 2));
        spi.reset();
        assert_eq!(spi.params, SpiParams::default());
    }
}
