use bitflags::bitflags;
use std::fmt;

pub const DEFAULT_SPEED_HZ: u32 = 100_000;
/// 0 is interpreted by the kernel as 8 bits per word
pub const DEFAULT_BITS_PER_WORD: u8 = 0;

pub const DEFAULT_SCK_GPIO: u32 = 6;
pub const DEFAULT_MOSI_GPIO: u32 = 18;
pub const DEFAULT_MISO_GPIO: u32 = 1;
pub const DEFAULT_CS_GPIO: u32 = 7;

bitflags! {
    /// Mode bits as defined in `linux/spi/spidev.h`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModeFlags: u32 {
        const CPHA = 0x01;
        const CPOL = 0x02;
        const CS_HIGH = 0x04;
        const LSB_FIRST = 0x08;
        const THREE_WIRE = 0x10;
        const LOOP = 0x20;
        const NO_CS = 0x40;
        const READY = 0x80;
        const TX_DUAL = 0x100;
        const TX_QUAD = 0x200;
        const RX_DUAL = 0x400;
        const RX_QUAD = 0x800;
    }
}

impl ModeFlags {
    pub const MODE_0: ModeFlags = ModeFlags::empty();
    pub const MODE_1: ModeFlags = ModeFlags::CPHA;
    pub const MODE_2: ModeFlags = ModeFlags::CPOL;
    pub const MODE_3: ModeFlags = ModeFlags::CPOL.union(ModeFlags::CPHA);

    /// Clock mode 0-3 encoded by CPOL/CPHA
    pub fn clock_mode(self) -> u8 {
        (self.bits() & 0x03) as u8
    }

    /// Replace CPOL/CPHA with the given clock mode, leaving every other bit alone
    pub fn with_clock_mode(self, mode: u8) -> Self {
        let clock = ModeFlags::from_bits_truncate(u32::from(mode & 0x03));
        (self - ModeFlags::MODE_3) | clock
    }
}

impl Default for ModeFlags {
    fn default() -> Self {
        ModeFlags::MODE_0 | ModeFlags::TX_DUAL | ModeFlags::RX_DUAL
    }
}

/// GPIO assignment for a bit-banged bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioPins {
    pub sck: u32,
    pub mosi: u32,
    pub miso: u32,
    pub cs: u32,
}

impl Default for GpioPins {
    fn default() -> Self {
        Self {
            sck: DEFAULT_SCK_GPIO,
            mosi: DEFAULT_MOSI_GPIO,
            miso: DEFAULT_MISO_GPIO,
            cs: DEFAULT_CS_GPIO,
        }
    }
}

/// Everything needed to address and clock one SPI device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiParams {
    pub bus: u32,
    pub device: u32,
    pub speed_hz: u32,
    pub delay_us: u16,
    pub bits_per_word: u8,
    pub mode: ModeFlags,
    pub gpio: GpioPins,
}

impl Default for SpiParams {
    fn default() -> Self {
        Self {
            bus: 0,
            device: 0,
            speed_hz: DEFAULT_SPEED_HZ,
            delay_us: 0,
            bits_per_word: DEFAULT_BITS_PER_WORD,
            mode: ModeFlags::default(),
            gpio: GpioPins::default(),
        }
    }
}

impl SpiParams {
    pub fn new(bus: u32, device: u32) -> Self {
        Self {
            bus,
            device,
            ..Default::default()
        }
    }

    /// Path of the spidev node, relative to `dev_root`
    pub fn device_path(&self, dev_root: &str) -> String {
        format!(
            "{}/spidev{}.{}",
            dev_root.trim_end_matches('/'),
            self.bus,
            self.device
        )
    }

    fn flag(&self, flag: ModeFlags) -> u8 {
        self.mode.contains(flag) as u8
    }
}

impl fmt::Display for SpiParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SPI Device Settings:")?;
        writeln!(f, "  bus:    {}", self.bus)?;
        writeln!(f, "  device: {}", self.device)?;
        writeln!(
            f,
            "  speed:    {} Hz ({} kHz)",
            self.speed_hz,
            self.speed_hz / 1000
        )?;
        writeln!(f, "  delay:    {} us", self.delay_us)?;
        writeln!(f, "  bpw:      {}", self.bits_per_word)?;
        writeln!(
            f,
            "  mode:     {} (0x{:02x})",
            self.mode.clock_mode(),
            self.mode.bits()
        )?;
        writeln!(f, "     3wire:    {}", self.flag(ModeFlags::THREE_WIRE))?;
        writeln!(f, "     lsb:      {}", self.flag(ModeFlags::LSB_FIRST))?;
        writeln!(f, "     loop:     {}", self.flag(ModeFlags::LOOP))?;
        writeln!(f, "     no-cs:    {}", self.flag(ModeFlags::NO_CS))?;
        writeln!(f, "     cs-high:  {}", self.flag(ModeFlags::CS_HIGH))?;
        writeln!(f)?;
        writeln!(f, "GPIO Settings:")?;
        writeln!(f, "  sck:      {}", self.gpio.sck)?;
        writeln!(f, "  mosi:     {}", self.gpio.mosi)?;
        writeln!(f, "  miso:     {}", self.gpio.miso)?;
        writeln!(f, "  cs:       {}", self.gpio.cs)
    }
}
