//! Bit-level encoder for driving a JTAG Test Access Port through an
//! MPSSE-style command-queue engine, the USB-attached serial chip sitting
//! between the host and the JTAG pins.
//!
//! The engine itself is behind the [`engine::Engine`] trait: it accepts
//! queued command bytes, flushes them as one USB transfer and hands back
//! captured response bytes.  On top of that, [`jtag::MpsseJtag`] encodes
//! the two operations every JTAG layer above needs: shifting a TMS
//! waveform to steer the TAP state machine, and shifting data through
//! TDI/TDO with the final bit optionally coupled to the TAP-exit
//! transition so both happen on the same clock edge.  What the shifted
//! bits mean (instruction registers, boundary scans, bitstreams) is the
//! caller's business.
//!
//! An [`engine::ftdi::FtdiEngine`] backend over `libftd2xx` is provided
//! behind the default `ftdi` feature.
//!
//! # Example
//! ```no_run
//! use jtag_mpsse::engine::ftdi::FtdiEngine;
//! use jtag_mpsse::engine::PinConfig;
//! use jtag_mpsse::jtag::MpsseJtag;
//!
//! let mut engine = FtdiEngine::open("Dual RS232-HS A").expect("open");
//! let pins = PinConfig {
//!     low_value: 0x08,
//!     low_direction: 0x0b,
//!     ..Default::default()
//! };
//! let mut jtag = MpsseJtag::new(&mut engine, &pins, 6_000_000).expect("init");
//!
//! // five TMS=1 clocks put the TAP in Test-Logic-Reset
//! jtag.write_tms(&[0x1f], 5).expect("tms");
//! ```

pub mod engine;
pub mod jtag;
pub mod mpsse;
