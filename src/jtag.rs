//! The JTAG bit encoder: translates TMS steering sequences and TDI/TDO
//! register shifts into chunked MPSSE command frames, sized to the
//! engine's command buffer and worked around known bridge-chip bugs.

use crate::engine::{self, Engine, PinConfig};
use crate::mpsse::*;

use log::{debug, trace, warn};
use thiserror::Error;

/// USB product-name prefix of boards built on the buggy CH552 bridge.
/// That part silently buffers a response after every write which must be
/// drained before it accepts the next command.
const CH552_PRODUCT: &str = "Sipeed-Debug";

/// TMS waveform bits carried per frame.  Bit 7 of the frame's data byte
/// broadcasts the TDI level for the whole frame, so only 6 bits fit.
const TMS_BITS_PER_FRAME: usize = 6;

#[derive(Error, Debug)]
pub enum Error {
    #[error("engine transport error")]
    Engine(#[from] engine::Error),
    #[error("short transfer: got {got} of {expected} bytes")]
    ShortTransfer { expected: usize, got: usize },
    #[error("inconsistent shift arithmetic: {bytes} bytes + {bits} bits != {len} bits")]
    LengthMismatch {
        bytes: usize,
        bits: usize,
        len: usize,
    },
    #[error("data shift of zero bits")]
    EmptyShift,
    #[error("{name} buffer holds {got} bytes but {len} bits need {need}")]
    BufferTooSmall {
        name: &'static str,
        got: usize,
        need: usize,
        len: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

fn check_capacity(name: &'static str, got: usize, len: usize) -> Result<()> {
    let need = (len + 7) / 8;
    if got < need {
        return Err(Error::BufferTooSmall {
            name,
            got,
            need,
            len,
        });
    }
    Ok(())
}

/// JTAG driver for MPSSE-style serial engines.
///
/// The engine is borrowed, not owned: the caller keeps it alive for the
/// whole session and gets it back once the driver is dropped.  Dropping
/// the driver (or calling [`close`](MpsseJtag::close) explicitly) runs a
/// loopback self-test that forces any still-buffered commands out to the
/// pins.
pub struct MpsseJtag<'e, E: Engine> {
    engine: &'e mut E,
    /// Set once at construction when the quirked bridge is detected,
    /// immutable afterwards.
    ch552_workaround: bool,
    closed: bool,
}

impl<'e, E: Engine> MpsseJtag<'e, E> {
    /// Switch the engine into JTAG mode with the given pin configuration
    /// and TCK frequency, and probe the device identity for known-buggy
    /// bridge variants.  An unreadable identity just leaves the
    /// workaround off.
    pub fn new(engine: &'e mut E, pins: &PinConfig, clock_hz: u32) -> Result<Self> {
        engine.configure(pins, clock_hz)?;

        let ch552_workaround = match engine.device_identity() {
            Some(product) => {
                trace!("device identity: {}", product);
                product.starts_with(CH552_PRODUCT)
            }
            None => false,
        };
        if ch552_workaround {
            debug!("CH552 bridge detected, enabling drain workaround");
        }

        Ok(MpsseJtag {
            engine,
            ch552_workaround,
            closed: false,
        })
    }

    /// Clock out `len` TMS bits, LSB first within each byte of `tms`, to
    /// steer the TAP state machine.  Returns the number of bits shifted.
    pub fn write_tms(&mut self, tms: &[u8], len: usize) -> Result<usize> {
        trace!("write_tms: {} bits", len);
        if len == 0 {
            return Ok(0);
        }
        check_capacity("tms", tms.len(), len)?;

        // each TMS frame is 3 bytes
        let frames_per_flush = self.engine.max_buffer_size() / 3;
        let drain_len = len / 8 + 1;
        let mut remaining = len;
        let mut offset = 0;
        let mut queued = 0;
        while remaining > 0 {
            let bits = remaining.min(TMS_BITS_PER_FRAME);
            let mut data = 0x80u8;
            for i in 0..bits {
                if tms[offset >> 3] & (1 << (offset & 0x07)) != 0 {
                    data |= 1 << i;
                }
                offset += 1;
            }
            self.engine
                .enqueue(&[WRITE_TMS | LSB | BITMODE | WRITE_NEG, (bits - 1) as u8, data]);
            queued += 1;
            if queued == frames_per_flush {
                queued = 0;
                self.engine.flush()?;
                if self.ch552_workaround {
                    self.drain(drain_len);
                }
            }
            remaining -= bits;
        }

        self.engine.flush()?;
        if self.ch552_workaround {
            self.drain(drain_len);
        }
        Ok(len)
    }

    /// Produce exactly `clk_len` clock pulses with TMS held at `tms` and
    /// no data movement.  `tdi` is accepted for signature parity with the
    /// data path but the TDI line does not matter while only clocking.
    ///
    /// Chips with the dedicated clock-only commands get them; everything
    /// else fakes pure clocking by re-driving TMS at a constant level.
    pub fn toggle_clock(&mut self, tms: bool, _tdi: bool, clk_len: u32) -> Result<u32> {
        if clk_len == 0 {
            return Ok(0);
        }

        if self.engine.supports_clock_commands() {
            let mut len = clk_len;
            if len > 8 {
                let mut groups = len / 8;
                len %= 8;
                while groups > 0 {
                    let chunk = groups.min(0x1_0000);
                    // the count field encodes groups-of-8 minus one
                    let count = (chunk - 1) as u16;
                    self.engine
                        .enqueue(&[CLOCK_BYTES_NO_DATA, count as u8, (count >> 8) as u8]);
                    self.engine.flush()?;
                    groups -= chunk;
                }
            }
            if len > 0 {
                self.engine.enqueue(&[CLOCK_BITS_NO_DATA, (len - 1) as u8]);
                self.engine.flush()?;
            }
            Ok(clk_len)
        } else {
            let fill = if tms { 0xff } else { 0x00 };
            let buf = vec![fill; (clk_len as usize + 7) / 8];
            self.write_tms(&buf, clk_len as usize).map(|n| n as u32)
        }
    }

    /// Shift `len` bits between TDI and TDO.  `tdi == None` leaves the
    /// line undriven, `tdo == None` skips capture; `tdo` receives the
    /// bits LSB first.  With `last` set, the final bit is not sent as
    /// plain data: it rides on the same clock edge as the TMS=1 exit
    /// transition, so the TAP leaves its shift state as the register
    /// access completes.
    ///
    /// Both buffers must hold at least `len` bits rounded up to whole
    /// bytes.
    pub fn shift_data(
        &mut self,
        tdi: Option<&[u8]>,
        mut tdo: Option<&mut [u8]>,
        len: usize,
        last: bool,
    ) -> Result<()> {
        if len == 0 {
            return Err(Error::EmptyShift);
        }
        if let Some(tdi) = tdi {
            check_capacity("tdi", tdi.len(), len)?;
        }
        if let Some(tdo) = tdo.as_deref() {
            check_capacity("tdo", tdo.len(), len)?;
        }

        // with `last`, the final bit goes out with the TMS exit frame
        let real_len = if last { len - 1 } else { len };
        let nb_byte = real_len >> 3;
        let nb_bit = real_len & 0x07;
        trace!(
            "shift_data: len {} real_len {} nb_byte {} nb_bit {} last {}",
            len,
            real_len,
            nb_byte,
            nb_bit,
            last
        );
        // recomputed on purpose: a corrupted length must fail here, never
        // be shifted out truncated or padded
        if nb_byte * 8 + nb_bit != real_len {
            return Err(Error::LengthMismatch {
                bytes: nb_byte,
                bits: nb_bit,
                len: real_len,
            });
        }

        let header = LSB
            | if tdi.is_some() { DO_WRITE | WRITE_NEG } else { 0 }
            | if tdo.is_some() { DO_READ } else { 0 };
        let xfer = self.engine.max_buffer_size() - 3;

        let mut tx_offset = 0;
        let mut rx_offset = 0;
        let mut remaining = nb_byte;
        while remaining != 0 {
            let chunk = remaining.min(xfer);
            self.engine.enqueue(&[
                header,
                ((chunk - 1) & 0xff) as u8,
                (((chunk - 1) >> 8) & 0xff) as u8,
            ]);
            if let Some(tdi) = tdi {
                self.engine.enqueue(&tdi[tx_offset..tx_offset + chunk]);
            }
            if let Some(tdo) = tdo.as_deref_mut() {
                self.read_response(&mut tdo[rx_offset..rx_offset + chunk])?;
                rx_offset += chunk;
            } else if self.ch552_workaround {
                self.engine.flush()?;
                self.drain(chunk);
            } else {
                self.engine.flush()?;
            }
            tx_offset += chunk;
            remaining -= chunk;
        }

        if nb_bit != 0 {
            self.engine.enqueue(&[header | BITMODE, (nb_bit - 1) as u8]);
            if let Some(tdi) = tdi {
                self.engine.enqueue(&[tdi[tx_offset]]);
            }
            if let Some(tdo) = tdo.as_deref_mut() {
                let mut byte = [0u8; 1];
                self.read_response(&mut byte)?;
                // partial captures arrive packed against the MSB; realign
                // to the low end
                tdo[rx_offset] = byte[0] >> (8 - nb_bit);
            } else if self.ch552_workaround {
                self.engine.flush()?;
                self.drain(nb_bit);
            } else {
                self.engine.flush()?;
            }
        }

        if last {
            let last_bit = tdi.map_or(false, |t| t[tx_offset] & (1 << nb_bit) != 0);
            trace!("shift_data: exit with last bit {}", last_bit as u8);
            // TMS=1 moves Shift-xR to Exit1-xR; the deferred data bit
            // rides in bit 7 on the identical clock edge
            let cmd = WRITE_TMS
                | LSB
                | BITMODE
                | WRITE_NEG
                | if tdo.is_some() { DO_READ } else { 0 };
            self.engine
                .enqueue(&[cmd, 0, if last_bit { 0x81 } else { 0x01 }]);
            if let Some(tdo) = tdo.as_deref_mut() {
                let mut byte = [0u8; 1];
                self.read_response(&mut byte)?;
                // a single captured bit always lands in bit 7
                let bit = (byte[0] & 0x80) >> (7 - nb_bit);
                if nb_bit != 0 {
                    tdo[rx_offset] |= bit;
                } else {
                    tdo[rx_offset] = bit;
                }
            } else if self.ch552_workaround {
                self.engine.flush()?;
                self.drain(1);
            } else {
                self.engine.flush()?;
            }
        }

        Ok(())
    }

    /// Transmit anything still queued in the engine.
    pub fn flush(&mut self) -> Result<usize> {
        Ok(self.engine.flush()?)
    }

    /// End the session: loop TDO back to TDI inside the chip, push a
    /// known pattern through and wait for it to come back, proving every
    /// previously queued command has physically left the device.
    /// Idempotent; also runs from `Drop`, so it covers early-return
    /// paths.  A mismatch is only a warning since the session is over
    /// either way.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        const PROBE: [u8; 16] = [
            SET_BITS_LOW,
            0xff,
            0x00,
            SET_BITS_HIGH,
            0xff,
            0x00,
            LOOPBACK_START,
            DO_READ | DO_WRITE | WRITE_NEG | LSB,
            0x04,
            0x00,
            0xaa,
            0x55,
            0x00,
            0xff,
            0xaa,
            LOOPBACK_END,
        ];
        self.engine.enqueue(&PROBE);
        if let Err(e) = self.engine.flush() {
            warn!("shutdown loopback flush failed: {}", e);
            return;
        }
        let mut echo = [0u8; 5];
        match self.engine.read(&mut echo) {
            Ok(n) if n == echo.len() => trace!("shutdown loopback complete"),
            Ok(n) => warn!(
                "loopback returned {} of {} bytes, expect problems on later runs",
                n,
                echo.len()
            ),
            Err(e) => warn!("loopback failed ({}), expect problems on later runs", e),
        }
    }

    /// Flush queued frames and block for an exact-length response.
    fn read_response(&mut self, buf: &mut [u8]) -> Result<()> {
        self.engine.flush()?;
        let n = self.engine.read(buf)?;
        if n != buf.len() {
            return Err(Error::ShortTransfer {
                expected: buf.len(),
                got: n,
            });
        }
        Ok(())
    }

    /// Dummy read compensating for bridges that buffer a response after
    /// every write.  The write itself may already have succeeded, so a
    /// shortfall is diagnostic only.
    fn drain(&mut self, count: usize) {
        let mut scratch = vec![0u8; count];
        match self.engine.read(&mut scratch) {
            Ok(n) if n == count => {}
            Ok(n) => warn!("drain read returned {} of {} bytes", n, count),
            Err(e) => warn!("drain read failed: {}", e),
        }
    }
}

impl<E: Engine> Drop for MpsseJtag<'_, E> {
    fn drop(&mut self) {
        self.close();
    }
}
