//! Contract for the command-queue serial engine sitting between the host
//! and the JTAG pins.  Implementations for real hardware live in
//! submodules; the driver in [`crate::jtag`] is generic over this trait so
//! the frame encoding can be exercised without a device attached.

use thiserror::Error;

#[cfg(feature = "ftdi")]
pub mod ftdi;

#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "ftdi")]
    #[error(transparent)]
    Status(#[from] libftd2xx::FtStatus),
    #[cfg(feature = "ftdi")]
    #[error(transparent)]
    Timeout(#[from] libftd2xx::TimeoutError),
    #[error("wrote {got} of {expected} bytes")]
    ShortWrite { expected: usize, got: usize },
    #[error("unsupported configuration: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Initial levels and directions for the two GPIO banks, as programmed
/// into the engine when it enters serial mode.  A `1` in a direction mask
/// makes the corresponding pin an output.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinConfig {
    pub low_value: u8,
    pub low_direction: u8,
    pub high_value: u8,
    pub high_direction: u8,
}

pub trait Engine {
    /// Append raw command bytes to the pending transmit buffer.  Never
    /// blocks and never transmits.
    fn enqueue(&mut self, bytes: &[u8]);

    /// Transmit all pending bytes as one transfer and return the number
    /// of bytes written.  Flushing an empty buffer is a no-op returning
    /// `Ok(0)`.
    fn flush(&mut self) -> Result<usize>;

    /// Block until `buf` is filled or the device gives up, returning the
    /// number of bytes actually received.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Largest number of bytes the engine accepts between flushes.
    fn max_buffer_size(&self) -> usize;

    /// One-time switch into synchronous serial mode with the given pin
    /// configuration and TCK frequency.
    fn configure(&mut self, pins: &PinConfig, clock_hz: u32) -> Result<()>;

    /// The USB product-name string, if the device exposes one.  Used only
    /// to recognize known-buggy bridge variants.
    fn device_identity(&mut self) -> Option<String>;

    /// Whether the device implements the dedicated clock-only commands
    /// (`0x8E`/`0x8F`).  Only certain chip families do.
    fn supports_clock_commands(&self) -> bool;
}
