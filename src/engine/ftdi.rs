//! `Engine` implementation for FTDI USB bridges via `libftd2xx`.

use crate::engine::{Engine, Error, PinConfig, Result};
use crate::mpsse::*;

use std::time::Duration;

use libftd2xx::{BitMode, DeviceType, Ftdi, FtdiCommon};
use log::debug;

/// Direction mask handed to the chip when entering MPSSE mode: TDO is the
/// only input on the low bank.
const MPSSE_DIR_MASK: u8 = 0xfb;

pub struct FtdiEngine<T> {
    ft: T,
    buffer: Vec<u8>,
    device_type: DeviceType,
    description: Option<String>,
}

impl<T: FtdiCommon> FtdiEngine<T> {
    /// Wrap an already-opened FTDI device.  The device descriptor is read
    /// once here; if that fails the device still works, it is just
    /// reported as an unknown variant.
    pub fn new(mut ft: T) -> Self {
        let (device_type, description) = match ft.device_info() {
            Ok(info) => (info.device_type, Some(info.description)),
            Err(_) => (DeviceType::Unknown, None),
        };
        FtdiEngine {
            ft,
            buffer: Vec::new(),
            device_type,
            description,
        }
    }

    fn is_h_type(&self) -> bool {
        matches!(
            self.device_type,
            DeviceType::FT2232H | DeviceType::FT4232H | DeviceType::FT232H
        )
    }
}

impl FtdiEngine<Ftdi> {
    /// Open the first device matching the given USB description string.
    pub fn open(description: &str) -> Result<Self> {
        let ft = Ftdi::with_description(description)?;
        Ok(Self::new(ft))
    }
}

/// TCK divisor for a given base clock: `freq = base / ((1 + div) * 2)`.
fn divisor(base: u32, clock_hz: u32) -> u16 {
    (base / clock_hz.saturating_mul(2)).saturating_sub(1).min(0xffff) as u16
}

impl<T: FtdiCommon> Engine for FtdiEngine<T> {
    fn enqueue(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    fn flush(&mut self) -> Result<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let n = self.ft.write(&self.buffer)?;
        if n != self.buffer.len() {
            return Err(Error::ShortWrite {
                expected: self.buffer.len(),
                got: n,
            });
        }
        self.buffer.clear();
        Ok(n)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.ft.read(buf)?)
    }

    fn max_buffer_size(&self) -> usize {
        if self.is_h_type() {
            4096
        } else {
            512
        }
    }

    fn configure(&mut self, pins: &PinConfig, clock_hz: u32) -> Result<()> {
        if clock_hz == 0 {
            return Err(Error::Unsupported("clock frequency must be > 0"));
        }
        self.ft.purge_all()?;
        self.ft.set_latency_timer(Duration::from_millis(5))?;
        self.ft.set_bit_mode(0, BitMode::Reset)?;
        self.ft.set_bit_mode(MPSSE_DIR_MASK, BitMode::Mpsse)?;

        let mut setup = Vec::with_capacity(16);
        let base = if self.is_h_type() && clock_hz > 6_000_000 {
            setup.push(DIS_DIV_5);
            60_000_000
        } else {
            if self.is_h_type() {
                setup.push(EN_DIV_5);
            }
            12_000_000
        };
        let div = divisor(base, clock_hz);
        debug!(
            "configuring MPSSE: {} Hz requested, base {} Hz, divisor {}",
            clock_hz, base, div
        );
        setup.extend_from_slice(&[TCK_DIVISOR, div as u8, (div >> 8) as u8]);
        setup.push(LOOPBACK_END);
        setup.extend_from_slice(&[SET_BITS_LOW, pins.low_value, pins.low_direction]);
        setup.extend_from_slice(&[SET_BITS_HIGH, pins.high_value, pins.high_direction]);
        self.enqueue(&setup);
        self.flush()?;
        Ok(())
    }

    fn device_identity(&mut self) -> Option<String> {
        self.description.clone()
    }

    fn supports_clock_commands(&self) -> bool {
        // clock output without data transfer only exists on the H parts
        self.is_h_type()
    }
}
