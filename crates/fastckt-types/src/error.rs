//! Errors raised while encoding or decoding descriptor fields.

/// A malformed descriptor field.
#[allow(missing_docs, reason = "variants are described by their messages")]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("invalid magic bytes: expected {expected:?}, got {got:?}")]
    Magic { expected: [u8; 4], got: [u8; 4] },

    #[error("unsupported format version {0}")]
    Version(u8),

    #[error("{field} width must be between 1 and 8 bytes, got {width}")]
    Width { field: &'static str, width: u8 },

    #[error("reserved header byte must be zero, got {0:#04x}")]
    Reserved(u8),

    #[error("value {value} does not fit in {width} byte(s)")]
    Unrepresentable { value: u64, width: u8 },

    #[error("invalid opcode tag {tag} at stream offset {offset}")]
    InvalidOpcode { tag: u64, offset: usize },

    #[error("gate record at stream offset {offset} needs {needed} bytes, {available} left")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("{opcodes_size} bytes cannot hold {num_opcodes} gate records")]
    StreamSize { num_opcodes: u64, opcodes_size: u64 },

    #[error("insufficient bytes for header: need {needed}, got {got}")]
    ShortHeader { needed: usize, got: usize },

    #[error("{field} address {addr} exceeds memory size {memory}")]
    AddressOutOfRange {
        field: &'static str,
        addr: u64,
        memory: u64,
    },

    #[error("memory size {memory} is not addressable with {width} byte addresses")]
    MemoryTooLarge { memory: u64, width: u8 },

    #[error("size of {0} overflows")]
    Overflow(&'static str),
}
