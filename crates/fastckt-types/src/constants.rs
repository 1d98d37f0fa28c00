/// Magic bytes for the self-describing layout: "FCkt"
pub const MAGIC: [u8; 4] = *b"FCkt";

/// Version number of the self-describing layout
pub const VERSION: u8 = 0x01;

/// Header size of the self-describing layout (8 byte prefix + 5 × u64)
pub const HEADER_SIZE: usize = 48;

/// Header size of the fixed layout (5 × u64, no prefix)
pub const FIXED_HEADER_SIZE: usize = 40;

/// Opcode tag width of the fixed layout
pub const FIXED_BYTES_OP: u8 = 1;

/// Address width of the fixed layout
pub const FIXED_BYTES_ADDR: u8 = 2;

/// Largest width (in bytes) of an opcode tag or an address
pub const MAX_FIELD_BYTES: u8 = 8;

const _: () = assert!(HEADER_SIZE == FIXED_HEADER_SIZE + 8);
const _: () = assert!(MAX_FIELD_BYTES as usize == size_of::<u64>());
