use crate::{
    FIXED_HEADER_SIZE, FormatError, HEADER_SIZE, MAGIC, OpCode, VERSION, Widths,
};

/// Descriptor layout variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Legacy layout: five u64 header fields, 1 byte tags, 2 byte addresses.
    Fixed,
    /// Canonical layout: magic, version and field widths precede the fields.
    SelfDescribing,
}

impl Format {
    /// Picks the layout from the first four bytes of a descriptor.
    ///
    /// Anything not starting with [`MAGIC`] is read as the fixed layout.
    pub fn detect(prefix: &[u8; 4]) -> Self {
        if *prefix == MAGIC {
            Format::SelfDescribing
        } else {
            Format::Fixed
        }
    }

    /// Size of the header in bytes.
    pub const fn header_size(self) -> usize {
        match self {
            Format::Fixed => FIXED_HEADER_SIZE,
            Format::SelfDescribing => HEADER_SIZE,
        }
    }
}

/// Circuit metadata stored in the descriptor header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitInfo {
    /// Number of boolean input wires
    pub input_size: u64,
    /// Number of boolean output wires
    pub output_size: u64,
    /// Number of gates in the opcode stream
    pub num_opcodes: u64,
    /// Byte length of the opcode stream
    pub opcodes_size: u64,
    /// Number of RAM cells
    pub memory: u64,
    /// Opcode and address widths
    pub widths: Widths,
}

impl CircuitInfo {
    /// Byte width of an opcode tag.
    pub fn bytes_op(&self) -> u8 {
        self.widths.op()
    }

    /// Byte width of an address.
    pub fn bytes_addr(&self) -> u8 {
        self.widths.addr()
    }

    /// Bytes needed to pack one instance's inputs.
    pub fn input_bytes(&self) -> usize {
        (self.input_size as usize).div_ceil(8)
    }

    /// Bytes needed to unpack one instance's outputs.
    pub fn output_bytes(&self) -> usize {
        (self.output_size as usize).div_ceil(8)
    }

    /// Total size of the address tables and the opcode stream.
    pub fn body_size(&self) -> Result<u64, FormatError> {
        let addr = self.widths.addr() as u64;
        self.input_size
            .checked_add(self.output_size)
            .and_then(|n| n.checked_mul(addr))
            .and_then(|n| n.checked_add(self.opcodes_size))
            .ok_or(FormatError::Overflow("descriptor body"))
    }

    /// Validate the header
    pub fn validate(&self) -> Result<(), FormatError> {
        self.widths.check_memory(self.memory)?;

        if usize::try_from(self.memory).is_err() {
            return Err(FormatError::Overflow("memory"));
        }

        // Every record is at least a tag and a destination, at most a tag and
        // three addresses. The exact size only follows from decoding.
        let op = self.widths.op() as u64;
        let addr = self.widths.addr() as u64;
        let (Some(min), Some(max)) = (
            self.num_opcodes.checked_mul(op + addr),
            self.num_opcodes.checked_mul(op + 3 * addr),
        ) else {
            return Err(FormatError::Overflow("opcode stream"));
        };
        if !(min..=max).contains(&self.opcodes_size) {
            return Err(FormatError::StreamSize {
                num_opcodes: self.num_opcodes,
                opcodes_size: self.opcodes_size,
            });
        }

        self.body_size()?;
        Ok(())
    }

    /// Encoded size of a gate record under this header's widths.
    pub fn record_size(&self, op: OpCode) -> usize {
        self.widths.op() as usize + (op.arity() + 1) * self.widths.addr() as usize
    }

    /// Convert header to byte array for writing.
    pub fn to_bytes(&self, format: Format) -> Result<Vec<u8>, FormatError> {
        let mut bytes = Vec::with_capacity(format.header_size());

        match format {
            Format::SelfDescribing => {
                bytes.extend_from_slice(&MAGIC);
                bytes.push(VERSION);
                bytes.push(self.widths.op());
                bytes.push(self.widths.addr());
                bytes.push(0);
            }
            Format::Fixed => {
                if self.widths != Widths::FIXED {
                    return Err(FormatError::Width {
                        field: "address",
                        width: self.widths.addr(),
                    });
                }
            }
        }

        for field in [
            self.input_size,
            self.output_size,
            self.num_opcodes,
            self.opcodes_size,
            self.memory,
        ] {
            bytes.extend_from_slice(&field.to_le_bytes());
        }

        debug_assert_eq!(bytes.len(), format.header_size());
        Ok(bytes)
    }

    /// Create header from bytes, validating it.
    pub fn from_bytes(format: Format, bytes: &[u8]) -> Result<Self, FormatError> {
        let needed = format.header_size();
        if bytes.len() < needed {
            return Err(FormatError::ShortHeader {
                needed,
                got: bytes.len(),
            });
        }

        let (widths, fields) = match format {
            Format::SelfDescribing => {
                let mut magic = [0u8; 4];
                magic.copy_from_slice(&bytes[0..4]);
                if magic != MAGIC {
                    return Err(FormatError::Magic {
                        expected: MAGIC,
                        got: magic,
                    });
                }
                if bytes[4] != VERSION {
                    return Err(FormatError::Version(bytes[4]));
                }
                let widths = Widths::new(bytes[5], bytes[6])?;
                if bytes[7] != 0 {
                    return Err(FormatError::Reserved(bytes[7]));
                }
                (widths, &bytes[8..needed])
            }
            Format::Fixed => (Widths::FIXED, &bytes[..needed]),
        };

        let field = |i: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&fields[i * 8..i * 8 + 8]);
            u64::from_le_bytes(buf)
        };

        let info = Self {
            input_size: field(0),
            output_size: field(1),
            num_opcodes: field(2),
            opcodes_size: field(3),
            memory: field(4),
            widths,
        };

        info.validate()?;
        Ok(info)
    }
}
