//! The loaded circuit and its loader.

use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::Path;

use fastckt_types::{CircuitInfo, Format, FormatError, GateDecoder, MAGIC, read_uint};

use crate::error::try_alloc_vec;
use crate::{Lane, LoadError};

/// Number of addresses decoded per read while loading address tables.
const ADDR_CHUNK: usize = 4096;

/// A loaded circuit.
///
/// Owns the input and output address tables, the encoded opcode stream and
/// the working RAM. All four are released together when the circuit is
/// dropped (or passed to [`Circuit::free`]).
///
/// `L` picks the lane width, i.e. how many instances one call evaluates.
#[derive(Debug)]
pub struct Circuit<L: Lane = u64> {
    pub(crate) info: CircuitInfo,
    pub(crate) input_addr: Box<[usize]>,
    pub(crate) output_addr: Box<[usize]>,
    pub(crate) opcodes: Box<[u8]>,
    pub(crate) ram: Box<[L]>,
}

impl<L: Lane> Circuit<L> {
    /// Loads and validates a descriptor file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let file_len = file.metadata()?.len();

        let circuit = Self::from_reader(BufReader::new(file), Some(file_len))?;
        log::debug!("loaded circuit from {}", path.display());
        Ok(circuit)
    }

    /// Loads and validates a descriptor from a stream.
    ///
    /// When `total_len` is given it must match the length the header
    /// declares; this is checked before any body buffer is allocated.
    pub fn from_reader<R: Read>(mut reader: R, total_len: Option<u64>) -> Result<Self, LoadError> {
        let mut header = [0u8; fastckt_types::HEADER_SIZE];
        read_exact(&mut reader, &mut header[..MAGIC.len()], "header")?;
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&header[..4]);

        let format = Format::detect(&prefix);
        let header_size = format.header_size();
        read_exact(&mut reader, &mut header[4..header_size], "header")?;

        let info =
            CircuitInfo::from_bytes(format, &header[..header_size]).map_err(LoadError::Header)?;

        if let Some(actual) = total_len {
            let expected = info
                .body_size()
                .and_then(|body| {
                    body.checked_add(header_size as u64)
                        .ok_or(FormatError::Overflow("descriptor"))
                })
                .map_err(LoadError::Header)?;
            if actual != expected {
                return Err(LoadError::SizeMismatch { expected, actual });
            }
        }

        let input_addr = read_addr_table(&mut reader, &info, "input", info.input_size)?;
        let output_addr = read_addr_table(&mut reader, &info, "output", info.output_size)?;
        let opcodes = read_opcodes(&mut reader, &info)?;

        let mut extra = [0u8; 1];
        if read_some(&mut reader, &mut extra)? != 0 {
            return Err(LoadError::TrailingBytes);
        }

        let mut ram = try_alloc_vec("ram", info.memory)?;
        ram.resize(info.memory as usize, L::ZERO);

        log::debug!(
            "circuit: {:?} layout, inputs={} outputs={} gates={} opcode bytes={} memory={} widths={}/{}",
            format,
            info.input_size,
            info.output_size,
            info.num_opcodes,
            info.opcodes_size,
            info.memory,
            info.bytes_op(),
            info.bytes_addr(),
        );

        Ok(Self {
            info,
            input_addr,
            output_addr,
            opcodes,
            ram: ram.into_boxed_slice(),
        })
    }

    /// Releases the circuit and every buffer it owns.
    ///
    /// Equivalent to dropping it; the handle cannot be used afterwards.
    pub fn free(self) {}

    /// The descriptor header.
    pub fn info(&self) -> &CircuitInfo {
        &self.info
    }

    /// RAM cell receiving input bit `k`, for each `k`.
    pub fn input_addr(&self) -> &[usize] {
        &self.input_addr
    }

    /// RAM cell read as output bit `k`, for each `k`.
    pub fn output_addr(&self) -> &[usize] {
        &self.output_addr
    }

    /// The encoded opcode stream.
    pub fn opcodes(&self) -> &[u8] {
        &self.opcodes
    }

    /// Working memory as left by the last execution.
    pub fn ram(&self) -> &[L] {
        &self.ram
    }

    /// Decodes the opcode stream in program order.
    pub fn gates(&self) -> GateDecoder<'_> {
        GateDecoder::new(&self.opcodes, self.info.widths)
    }
}

fn read_addr_table<R: Read>(
    reader: &mut R,
    info: &CircuitInfo,
    table: &'static str,
    count: u64,
) -> Result<Box<[usize]>, LoadError> {
    let width = info.bytes_addr();
    let mut addrs = try_alloc_vec::<usize>(table, count)?;

    let mut buf = vec![0u8; ADDR_CHUNK * width as usize];
    let mut remaining = count;
    while remaining > 0 {
        let n = remaining.min(ADDR_CHUNK as u64) as usize;
        let chunk = &mut buf[..n * width as usize];
        read_exact(reader, chunk, "address table")?;

        for raw in chunk.chunks_exact(width as usize) {
            let addr = read_uint(raw, width);
            if addr >= info.memory {
                return Err(LoadError::AddressOutOfRange {
                    table,
                    index: addrs.len() as u64,
                    addr,
                    memory: info.memory,
                });
            }
            addrs.push(addr as usize);
        }
        remaining -= n as u64;
    }

    Ok(addrs.into_boxed_slice())
}

fn read_opcodes<R: Read>(reader: &mut R, info: &CircuitInfo) -> Result<Box<[u8]>, LoadError> {
    let mut opcodes = try_alloc_vec::<u8>("opcodes", info.opcodes_size)?;
    reader
        .take(info.opcodes_size)
        .read_to_end(&mut opcodes)?;
    if opcodes.len() as u64 != info.opcodes_size {
        return Err(LoadError::Truncated("opcode stream"));
    }

    // Decode everything once so execution never meets a bad record.
    let mut decoder = GateDecoder::new(&opcodes, info.widths);
    let mut count = 0u64;
    for gate in decoder.by_ref() {
        let gate = gate.map_err(LoadError::Opcodes)?;
        gate.validate(info.memory).map_err(LoadError::Opcodes)?;
        count += 1;
    }
    debug_assert_eq!(decoder.offset(), opcodes.len());

    if count != info.num_opcodes {
        return Err(LoadError::GateCount {
            expected: info.num_opcodes,
            actual: count,
        });
    }

    Ok(opcodes.into_boxed_slice())
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], what: &'static str) -> Result<(), LoadError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => LoadError::Truncated(what),
        _ => LoadError::Io(e),
    })
}

fn read_some<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            res => return res,
        }
    }
}
