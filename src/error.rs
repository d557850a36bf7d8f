//! Error types for SPI device operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpiError {
    /// Failed to open the spidev node
    #[error("could not open SPI device '{path}': {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot set SPI mode 0x{mode:02x}: {source}")]
    SetModeFailed {
        mode: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot set {bits} bits per word: {source}")]
    SetBitsPerWordFailed {
        bits: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot set max speed {speed} Hz: {source}")]
    SetSpeedFailed {
        speed: u32,
        #[source]
        source: std::io::Error,
    },

    /// The SPI_IOC_MESSAGE ioctl failed or moved no data
    #[error("SPI transfer failed: {0}")]
    TransferFailed(#[source] std::io::Error),

    #[error("invalid transfer: {0}")]
    InvalidTransfer(String),

    /// The module loader could not be started
    #[error("failed to run '{command}': {source}")]
    LoaderSpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}: {stderr}")]
    LoaderFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

pub type Result<T> = std::result::Result<T, SpiError>;
