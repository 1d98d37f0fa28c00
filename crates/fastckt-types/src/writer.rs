//! Descriptor writer
//!
//! API:
//! - new() → add_input()* / add_output()* / write_gate()* → finalize()
//!
//! Behavior:
//! - Validates every address against the memory size as it is added
//! - Encodes gates immediately, keeping `num_opcodes`/`opcodes_size` exact
//! - Emits either the self-describing or the fixed layout

use std::io::{Error, ErrorKind, Result, Write};

use crate::{CircuitInfo, Format, FormatError, Gate, Widths, write_uint};

/// Serializes an already-built gate list into a descriptor.
#[derive(Debug, Clone)]
pub struct DescriptorWriter {
    format: Format,
    widths: Widths,
    memory: u64,
    input_addr: Vec<u64>,
    output_addr: Vec<u64>,
    opcodes: Vec<u8>,
    num_opcodes: u64,
}

impl DescriptorWriter {
    /// Create a writer for the self-describing layout.
    pub fn new(memory: u64, widths: Widths) -> std::result::Result<Self, FormatError> {
        widths.check_memory(memory)?;
        Ok(Self {
            format: Format::SelfDescribing,
            widths,
            memory,
            input_addr: Vec::new(),
            output_addr: Vec::new(),
            opcodes: Vec::new(),
            num_opcodes: 0,
        })
    }

    /// Create a writer for the fixed layout (at most 2^16 cells).
    pub fn fixed(memory: u64) -> std::result::Result<Self, FormatError> {
        let mut writer = Self::new(memory, Widths::FIXED)?;
        writer.format = Format::Fixed;
        Ok(writer)
    }

    /// Appends the RAM cell receiving the next input bit.
    pub fn add_input(&mut self, addr: u64) -> std::result::Result<(), FormatError> {
        self.check_addr("input", addr)?;
        self.input_addr.push(addr);
        Ok(())
    }

    /// Appends the RAM cell read as the next output bit.
    pub fn add_output(&mut self, addr: u64) -> std::result::Result<(), FormatError> {
        self.check_addr("output", addr)?;
        self.output_addr.push(addr);
        Ok(())
    }

    /// Appends a gate to the opcode stream.
    pub fn write_gate(&mut self, gate: Gate) -> std::result::Result<(), FormatError> {
        gate.validate(self.memory)?;
        gate.encode(self.widths, &mut self.opcodes)?;
        self.num_opcodes += 1;
        Ok(())
    }

    /// Header describing what has been written so far.
    pub fn info(&self) -> CircuitInfo {
        CircuitInfo {
            input_size: self.input_addr.len() as u64,
            output_size: self.output_addr.len() as u64,
            num_opcodes: self.num_opcodes,
            opcodes_size: self.opcodes.len() as u64,
            memory: self.memory,
            widths: self.widths,
        }
    }

    /// Encodes the whole descriptor.
    pub fn to_bytes(&self) -> std::result::Result<Vec<u8>, FormatError> {
        let info = self.info();
        let mut bytes = info.to_bytes(self.format)?;

        for &addr in self.input_addr.iter().chain(&self.output_addr) {
            write_uint(&mut bytes, addr, self.widths.addr())?;
        }
        bytes.extend_from_slice(&self.opcodes);

        Ok(bytes)
    }

    /// Writes the descriptor out, returning its header.
    pub fn finalize<W: Write>(self, mut out: W) -> Result<CircuitInfo> {
        let bytes = self
            .to_bytes()
            .map_err(|e| Error::new(ErrorKind::InvalidInput, e))?;
        out.write_all(&bytes)?;
        out.flush()?;
        Ok(self.info())
    }

    fn check_addr(&self, field: &'static str, addr: u64) -> std::result::Result<(), FormatError> {
        if addr >= self.memory {
            return Err(FormatError::AddressOutOfRange {
                field,
                addr,
                memory: self.memory,
            });
        }
        Ok(())
    }
}
