//! Field widths of the opcode stream and address tables.

use crate::{FIXED_BYTES_ADDR, FIXED_BYTES_OP, FormatError, MAX_FIELD_BYTES};

/// Byte widths used to encode an opcode tag and an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Widths {
    op: u8,
    addr: u8,
}

impl Widths {
    /// Widths implied by the fixed (legacy) layout: 1 byte tags, 2 byte
    /// addresses.
    pub const FIXED: Widths = Widths {
        op: FIXED_BYTES_OP,
        addr: FIXED_BYTES_ADDR,
    };

    /// Creates a new instance, checking both widths are in `1..=8`.
    pub fn new(op: u8, addr: u8) -> Result<Self, FormatError> {
        check_width("opcode", op)?;
        check_width("address", addr)?;
        Ok(Self { op, addr })
    }

    /// Smallest widths able to address `memory` cells.
    pub fn minimal_for(memory: u64) -> Self {
        let max_addr = memory.saturating_sub(1);
        let bits = u64::BITS - max_addr.leading_zeros();
        let addr = bits.div_ceil(8).max(1) as u8;
        Self { op: 1, addr }
    }

    /// Width of an opcode tag in bytes.
    pub fn op(&self) -> u8 {
        self.op
    }

    /// Width of an address in bytes.
    pub fn addr(&self) -> u8 {
        self.addr
    }

    /// Largest value an address field can hold.
    pub fn max_addr(&self) -> u64 {
        max_value(self.addr)
    }

    /// Largest value an opcode field can hold.
    pub fn max_op(&self) -> u64 {
        max_value(self.op)
    }

    /// Checks that `memory` cells can all be addressed with these widths.
    pub fn check_memory(&self, memory: u64) -> Result<(), FormatError> {
        // Addresses are `0..memory`, so `memory - 1` must be representable.
        if memory > 0 && memory - 1 > self.max_addr() {
            return Err(FormatError::MemoryTooLarge {
                memory,
                width: self.addr,
            });
        }
        Ok(())
    }
}

fn check_width(field: &'static str, width: u8) -> Result<(), FormatError> {
    if width == 0 || width > MAX_FIELD_BYTES {
        return Err(FormatError::Width { field, width });
    }
    Ok(())
}

fn max_value(width: u8) -> u64 {
    if width >= MAX_FIELD_BYTES {
        u64::MAX
    } else {
        (1u64 << (8 * width as u32)) - 1
    }
}

/// Reads a little-endian unsigned integer `width` bytes wide.
///
/// `bytes` must hold at least `width` bytes and `width` must be in `1..=8`.
#[inline]
pub fn read_uint(bytes: &[u8], width: u8) -> u64 {
    let mut buf = [0u8; 8];
    let width = width as usize;
    buf[..width].copy_from_slice(&bytes[..width]);
    u64::from_le_bytes(buf)
}

/// Appends `value` as a little-endian unsigned integer `width` bytes wide.
pub fn write_uint(out: &mut Vec<u8>, value: u64, width: u8) -> Result<(), FormatError> {
    if value > max_value(width) {
        return Err(FormatError::Unrepresentable { value, width });
    }
    out.extend_from_slice(&value.to_le_bytes()[..width as usize]);
    Ok(())
}
