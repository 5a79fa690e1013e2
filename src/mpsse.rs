//! MPSSE command-set constants.
//!
//! The serial engine consumes a stream of length-prefixed command frames.
//! Shift opcodes are built by OR-ing the flag constants together; the
//! remaining constants are standalone one-byte commands, some followed by
//! fixed-size arguments.

// Shift command flags

/// Clock data out on the negative TCK edge.
pub const WRITE_NEG: u8 = 0x01;
/// Bit mode: the count field is in bits, not bytes.
pub const BITMODE: u8 = 0x02;
/// Sample inbound data on the negative TCK edge.
pub const READ_NEG: u8 = 0x04;
/// Least-significant bit first.
pub const LSB: u8 = 0x08;
/// Clock bytes out on TDI.
pub const DO_WRITE: u8 = 0x10;
/// Capture bytes from TDO.
pub const DO_READ: u8 = 0x20;
/// Clock the data byte out on TMS; TDI is held at bit 7 of the data byte.
pub const WRITE_TMS: u8 = 0x40;

// GPIO and mode commands

/// Set the low GPIO bank: followed by value and direction bytes.
pub const SET_BITS_LOW: u8 = 0x80;
/// Set the high GPIO bank: followed by value and direction bytes.
pub const SET_BITS_HIGH: u8 = 0x82;
/// Connect TDI to TDO inside the chip.
pub const LOOPBACK_START: u8 = 0x84;
/// Disconnect the internal TDI/TDO loopback.
pub const LOOPBACK_END: u8 = 0x85;
/// Set the TCK divisor: followed by a little-endian 16-bit divisor.
pub const TCK_DIVISOR: u8 = 0x86;

// H-family extensions

/// Disable the clock divide-by-5 prescaler (60 MHz base clock).
pub const DIS_DIV_5: u8 = 0x8A;
/// Enable the clock divide-by-5 prescaler (12 MHz base clock).
pub const EN_DIV_5: u8 = 0x8B;
/// Clock pulses with no data transfer, in units of 8: followed by a
/// little-endian 16-bit count; `(count + 1) * 8` pulses are produced.
pub const CLOCK_BYTES_NO_DATA: u8 = 0x8F;
/// Clock 1 to 8 pulses with no data transfer: followed by a count byte;
/// `count + 1` pulses are produced.
pub const CLOCK_BITS_NO_DATA: u8 = 0x8E;
