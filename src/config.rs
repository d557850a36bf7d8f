use crate::command::{Registrar, DEFAULT_LOADER, DEFAULT_MODULE};
use crate::params::{self, GpioPins, ModeFlags, SpiParams};
use crate::spidev::DEFAULT_DEV_ROOT;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub spi: SpiConfig,
    pub gpio: GpioConfig,
    pub registration: RegistrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpiConfig {
    /// Unset means bus 0, or the demo's own target for `spi-tool demo`
    pub bus: Option<u32>,
    pub device: Option<u32>,
    pub speed_hz: u32,
    pub delay_us: u16,
    pub bits_per_word: u8,
    /// Clock mode 0-3
    pub mode: u8,
    pub three_wire: bool,
    pub no_cs: bool,
    pub cs_high: bool,
    pub lsb_first: bool,
    pub loopback: bool,
    /// Request dual-lane TX/RX
    pub dual: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    pub sck: u32,
    pub mosi: u32,
    pub miso: u32,
    pub cs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Program that loads the kernel module, e.g. `insmod` or `modprobe`
    pub loader: String,
    pub module: String,
    /// Directory holding the spidev nodes
    pub dev_root: String,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            bus: None,
            device: None,
            speed_hz: params::DEFAULT_SPEED_HZ,
            delay_us: 0,
            bits_per_word: params::DEFAULT_BITS_PER_WORD,
            mode: 0,
            three_wire: false,
            no_cs: false,
            cs_high: false,
            lsb_first: false,
            loopback: false,
            dual: true,
        }
    }
}

impl Default for GpioConfig {
    fn default() -> Self {
        let pins = GpioPins::default();
        Self {
            sck: pins.sck,
            mosi: pins.mosi,
            miso: pins.miso,
            cs: pins.cs,
        }
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            loader: DEFAULT_LOADER.to_string(),
            module: DEFAULT_MODULE.to_string(),
            dev_root: DEFAULT_DEV_ROOT.to_string(),
        }
    }
}

impl Config {
    pub fn params(&self) -> SpiParams {
        let spi = &self.spi;
        let mut mode = ModeFlags::MODE_0.with_clock_mode(spi.mode);
        mode.set(ModeFlags::THREE_WIRE, spi.three_wire);
        mode.set(ModeFlags::NO_CS, spi.no_cs);
        mode.set(ModeFlags::CS_HIGH, spi.cs_high);
        mode.set(ModeFlags::LSB_FIRST, spi.lsb_first);
        mode.set(ModeFlags::LOOP, spi.loopback);
        mode.set(ModeFlags::TX_DUAL | ModeFlags::RX_DUAL, spi.dual);

        SpiParams {
            bus: spi.bus.unwrap_or(0),
            device: spi.device.unwrap_or(0),
            speed_hz: spi.speed_hz,
            delay_us: spi.delay_us,
            bits_per_word: spi.bits_per_word,
            mode,
            gpio: GpioPins {
                sck: self.gpio.sck,
                mosi: self.gpio.mosi,
                miso: self.gpio.miso,
                cs: self.gpio.cs,
            },
        }
    }

    pub fn registrar(&self) -> Registrar {
        Registrar {
            loader: self.registration.loader.clone(),
            module: self.registration.module.clone(),
        }
    }
}
