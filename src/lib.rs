//! onion-spi - SPI device access through Linux spidev
//!
//! A `SpiDevice` is addressed by bus and device number (`/dev/spidevX.Y`).
//! It can register a bit-banged bus with the kernel, push mode/speed settings
//! to the driver, and move bytes with full-duplex transfers.

pub mod command;
pub mod config;
pub mod error;
pub mod hexdump;
pub mod params;
pub mod spi;
pub mod spidev;
pub mod verbosity;

// Re-export main types for convenience
pub use command::Registrar;
pub use error::{Result, SpiError};
pub use params::{GpioPins, ModeFlags, SpiParams};
pub use spi::{Registration, SpiDevice};
pub use spidev::{AppliedSettings, SpiBus, Spidev};
pub use verbosity::Verbosity;
