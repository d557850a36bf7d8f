use clap::{ArgAction, Parser, Subcommand};
use onion_spi::config::SpiConfig;
use onion_spi::{ModeFlags, SpiParams, Verbosity};
use std::path::PathBuf;

use crate::demo::{DEMO_BUS, DEMO_DEVICE};

/// spi-tool: interface devices using the SPI protocol
#[derive(Debug, Parser)]
#[command(name = "spi-tool", version)]
pub struct Args {
    /// More output, repeat for extra debug
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Errors only
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Bus number
    #[arg(short, long)]
    pub bus: Option<u32>,

    /// Device ID
    #[arg(short, long)]
    pub device: Option<u32>,

    /// Max SPI frequency in Hz
    #[arg(short = 's', long, value_name = "HZ")]
    pub frequency: Option<u32>,

    /// Delay in us after the last bit before optionally deselecting the device
    #[arg(short = 'D', long, value_name = "US")]
    pub delay: Option<u16>,

    /// Bits per word
    #[arg(short = 'B', long)]
    pub bpw: Option<u8>,

    /// SPI clock mode
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub mode: Option<u8>,

    /// SI/SO signals shared
    #[arg(long = "3wire")]
    pub three_wire: bool,

    /// No chip select signal
    #[arg(long)]
    pub no_cs: bool,

    /// Chip select active high
    #[arg(long)]
    pub cs_high: bool,

    /// Transmit least significant bit first
    #[arg(long)]
    pub lsb: bool,

    /// Loopback mode
    #[arg(long = "loop")]
    pub loopback: bool,

    /// GPIO for the SCK signal
    #[arg(long, value_name = "GPIO")]
    pub sck: Option<u32>,

    /// GPIO for the MOSI signal
    #[arg(long, value_name = "GPIO")]
    pub mosi: Option<u32>,

    /// GPIO for the MISO signal
    #[arg(long, value_name = "GPIO")]
    pub miso: Option<u32>,

    /// GPIO for the CS signal
    #[arg(long, value_name = "GPIO")]
    pub cs: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Perform a one-byte read
    Read {
        #[arg(value_parser = parse_byte)]
        address: u8,
    },
    /// Perform a write of one value
    Write {
        #[arg(value_parser = parse_byte)]
        address: u8,
        #[arg(value_parser = parse_byte)]
        value: u8,
    },
    /// Register the device if needed and initialize its SPI parameters
    Setup,
    /// Report whether the device node exists
    Check,
    /// Register the device with the kernel
    Register,
    /// Step through the interactive smoke test.
    ///
    /// Targets `-b`/`-d` when given, then the config file's `spi.bus`/`spi.device`,
    /// and otherwise bus 0, device 1.
    Demo {
        /// Do not wait at the prompts
        #[arg(short, long)]
        yes: bool,
    },
}

impl Args {
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            Verbosity::from_level(i32::from(self.verbose))
        }
    }

    /// Bus and device for the demo: options, then config file, then 0/1
    pub fn demo_target(&self, spi: &SpiConfig) -> (u32, u32) {
        (
            self.bus.or(spi.bus).unwrap_or(DEMO_BUS),
            self.device.or(spi.device).unwrap_or(DEMO_DEVICE),
        )
    }

    /// Layer the command-line options over `params`
    pub fn apply(&self, params: &mut SpiParams) {
        if let Some(bus) = self.bus {
            params.bus = bus;
        }
        if let Some(device) = self.device {
            params.device = device;
        }
        if let Some(speed) = self.frequency {
            params.speed_hz = speed;
        }
        if let Some(delay) = self.delay {
            params.delay_us = delay;
        }
        if let Some(bpw) = self.bpw {
            params.bits_per_word = bpw;
        }
        if let Some(mode) = self.mode {
            params.mode = params.mode.with_clock_mode(mode);
        }

        for (enabled, flag) in [
            (self.three_wire, ModeFlags::THREE_WIRE),
            (self.no_cs, ModeFlags::NO_CS),
            (self.cs_high, ModeFlags::CS_HIGH),
            (self.lsb, ModeFlags::LSB_FIRST),
            (self.loopback, ModeFlags::LOOP),
        ] {
            if enabled {
                params.mode |= flag;
            }
        }

        if let Some(gpio) = self.sck {
            params.gpio.sck = gpio;
        }
        if let Some(gpio) = self.mosi {
            params.gpio.mosi = gpio;
        }
        if let Some(gpio) = self.miso {
            params.gpio.miso = gpio;
        }
        if let Some(gpio) = self.cs {
            params.gpio.cs = gpio;
        }
    }
}

/// Hex byte, with or without a leading `0x`
pub fn parse_byte(s: &str) -> Result<u8, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u8::from_str_radix(digits, 16).map_err(|e| format!("invalid hex byte '{}': {}", s, e))
}
