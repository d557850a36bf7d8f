//! Kernel side of the device handle.
//!
//! `SpiBus` is the seam between `SpiDevice` and the kernel; `Spidev` talks to
//! `/dev/spidevX.Y` through the spidev ioctls, opening the node for each call.

use crate::error::{Result, SpiError};
use crate::params::{ModeFlags, SpiParams};

use log::debug;
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;

pub const DEFAULT_DEV_ROOT: &str = "/dev";

/// Linux spidev ioctl definitions
mod ioctl {
    use nix::{ioctl_read, ioctl_write_ptr};

    pub const SPI_IOC_MAGIC: u8 = b'k';

    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;
    const SPI_IOC_TYPE_MODE32: u8 = 5;

    ioctl_read!(spi_ioc_rd_mode32, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE32, u32);
    ioctl_write_ptr!(spi_ioc_wr_mode32, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE32, u32);
    ioctl_read!(
        spi_ioc_rd_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_read!(
        spi_ioc_rd_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    /// SPI_IOC_MESSAGE(n) = _IOW(SPI_IOC_MAGIC, 0, char[n * sizeof(spi_ioc_transfer)])
    pub fn spi_ioc_message(n: usize) -> nix::sys::ioctl::ioctl_num_type {
        nix::request_code_write!(
            SPI_IOC_MAGIC,
            0,
            n * std::mem::size_of::<super::SpiIocTransfer>()
        )
    }
}

/// Must match the kernel's `struct spi_ioc_transfer`
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    _pad: u8,
}

/// Values the driver reports back after setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedSettings {
    pub mode: ModeFlags,
    pub bits_per_word: u8,
    pub speed_hz: u32,
}

pub trait SpiBus {
    /// Whether the device node for `params` is present
    fn exists(&self, params: &SpiParams) -> bool;

    /// Write mode, bits per word and max speed, then read them back
    fn configure(&mut self, params: &SpiParams) -> Result<AppliedSettings>;

    /// Full-duplex transfer of `tx.len()` bytes; returns the byte count moved
    fn transfer(&mut self, params: &SpiParams, tx: &[u8], rx: &mut [u8]) -> Result<usize>;
}

/// spidev character device access
#[derive(Debug, Clone)]
pub struct Spidev {
    dev_root: String,
}

impl Default for Spidev {
    fn default() -> Self {
        Self::new(DEFAULT_DEV_ROOT)
    }
}

impl Spidev {
    pub fn new(dev_root: impl Into<String>) -> Self {
        Self {
            dev_root: dev_root.into(),
        }
    }

    pub fn dev_root(&self) -> &str {
        &self.dev_root
    }

    fn open(&self, params: &SpiParams) -> Result<File> {
        let path = params.device_path(&self.dev_root);
        debug!("onion-spi:: opening {}", path);
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| SpiError::OpenFailed { path, source: e })
    }
}

impl SpiBus for Spidev {
    fn exists(&self, params: &SpiParams) -> bool {
        Path::new(&params.device_path(&self.dev_root)).exists()
    }

    fn configure(&mut self, params: &SpiParams) -> Result<AppliedSettings> {
        let file = self.open(params)?;
        let fd = file.as_raw_fd();

        let mut mode = params.mode.bits();
        let mut bits = params.bits_per_word;
        let mut speed = params.speed_hz;

        let mode_err = |mode: u32| {
            move |e: nix::Error| SpiError::SetModeFailed {
                mode,
                source: e.into(),
            }
        };
        let bits_err = |bits: u8| {
            move |e: nix::Error| SpiError::SetBitsPerWordFailed {
                bits,
                source: e.into(),
            }
        };
        let speed_err = |speed: u32| {
            move |e: nix::Error| SpiError::SetSpeedFailed {
                speed,
                source: e.into(),
            }
        };

        // SAFETY: fd stays open for the lifetime of `file`, and each pointer
        // refers to a live local of the size the ioctl expects.
        unsafe {
            ioctl::spi_ioc_wr_mode32(fd, &mode).map_err(mode_err(mode))?;
            ioctl::spi_ioc_rd_mode32(fd, &mut mode).map_err(mode_err(mode))?;

            ioctl::spi_ioc_wr_bits_per_word(fd, &bits).map_err(bits_err(bits))?;
            ioctl::spi_ioc_rd_bits_per_word(fd, &mut bits).map_err(bits_err(bits))?;

            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed).map_err(speed_err(speed))?;
            ioctl::spi_ioc_rd_max_speed_hz(fd, &mut speed).map_err(speed_err(speed))?;
        }

        Ok(AppliedSettings {
            mode: ModeFlags::from_bits_retain(mode),
            bits_per_word: bits,
            speed_hz: speed,
        })
    }

    fn transfer(&mut self, params: &SpiParams, tx: &[u8], rx: &mut [u8]) -> Result<usize> {
        let file = self.open(params)?;

        let xfer = SpiIocTransfer {
            tx_buf: tx.as_ptr() as u64,
            rx_buf: rx.as_mut_ptr() as u64,
            len: tx.len() as u32,
            speed_hz: params.speed_hz,
            delay_usecs: params.delay_us,
            bits_per_word: params.bits_per_word,
            cs_change: 0,
            ..Default::default()
        };

        // SAFETY: tx and rx are both at least `len` bytes and outlive the call.
        let ret = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                ioctl::spi_ioc_message(1),
                &xfer as *const SpiIocTransfer,
            )
        };

        check_transfer(ret)
    }
}

/// Map an `SPI_IOC_MESSAGE` return value to the byte count moved.
/// Negative is an OS error; zero means nothing was clocked and is an error too.
fn check_transfer(ret: libc::c_int) -> Result<usize> {
    if ret < 0 {
        return Err(SpiError::TransferFailed(std::io::Error::last_os_error()));
    }
    if ret < 1 {
        return Err(SpiError::TransferFailed(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "no data transferred",
        )));
    }
    Ok(ret as usize)
}
