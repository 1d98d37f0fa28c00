//! Error types for loading and running circuits.

use std::io;
use std::path::PathBuf;

use fastckt_types::FormatError;

/// A buffer could not be allocated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to allocate {buffer} buffer of {len} elements")]
pub struct AllocationError {
    /// Which buffer
    pub buffer: &'static str,
    /// Requested element count
    pub len: u64,
}

/// Reserves exactly `len` elements, failing instead of aborting.
pub(crate) fn try_alloc_vec<T>(buffer: &'static str, len: u64) -> Result<Vec<T>, AllocationError> {
    let err = AllocationError { buffer, len };
    let n = usize::try_from(len).map_err(|_| err.clone())?;
    let mut v = Vec::new();
    v.try_reserve_exact(n).map_err(|_| err)?;
    Ok(v)
}

/// Failure to load a descriptor. No circuit is produced.
#[allow(missing_docs, reason = "variants are described by their messages")]
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error reading descriptor: {0}")]
    Io(#[from] io::Error),

    #[error("descriptor truncated while reading {0}")]
    Truncated(&'static str),

    #[error("malformed header: {0}")]
    Header(#[source] FormatError),

    #[error("descriptor is {actual} bytes but its header declares {expected}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("{table} address #{index} is {addr}, memory holds {memory} cells")]
    AddressOutOfRange {
        table: &'static str,
        index: u64,
        addr: u64,
        memory: u64,
    },

    #[error("invalid opcode stream: {0}")]
    Opcodes(#[source] FormatError),

    #[error("opcode stream holds {actual} gates but the header declares {expected}")]
    GateCount { expected: u64, actual: u64 },

    #[error("unexpected bytes after the opcode stream")]
    TrailingBytes,

    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

/// Status codes returned across the C boundary.
pub mod status {
    /// Success
    pub const OK: i32 = 0;
    /// The trace file could not be opened
    pub const TRACE_OPEN: i32 = -1;
    /// Writing the trace failed
    pub const TRACE_WRITE: i32 = -2;
    /// Invalid or truncated opcode encountered during decode
    pub const INVALID_OPCODE: i32 = -3;
    /// Bad batch width, buffer or pointer argument
    pub const BAD_ARGUMENT: i32 = -4;
}

/// Failure during [`Circuit::compute`](crate::Circuit::compute).
///
/// Argument and trace-open errors are reported before RAM is touched. Any
/// other error leaves RAM, outputs and the partial trace unspecified.
#[allow(missing_docs, reason = "variants are described by their messages")]
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("batch width {batch} outside 1..={lanes}")]
    BatchWidth { batch: usize, lanes: usize },

    #[error("input buffer holds {got} bytes, need {needed}")]
    InputTooShort { needed: usize, got: usize },

    #[error("output buffer holds {got} bytes, need {needed}")]
    OutputTooShort { needed: usize, got: usize },

    #[error("invalid opcode tag {tag} at stream offset {offset}")]
    InvalidOpcode { tag: u64, offset: usize },

    #[error("opcode stream truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("gate addresses cell {addr}, memory holds {memory} cells")]
    AddressOutOfRange { addr: u64, memory: u64 },

    #[error("malformed opcode stream: {0}")]
    Decode(#[source] FormatError),

    #[error("failed to open trace {path}: {source}")]
    TraceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("trace write failed: {0}")]
    Trace(#[source] io::Error),
}

impl RuntimeError {
    /// Non-zero status code for the C surface.
    pub fn status(&self) -> i32 {
        match self {
            RuntimeError::BatchWidth { .. }
            | RuntimeError::InputTooShort { .. }
            | RuntimeError::OutputTooShort { .. } => status::BAD_ARGUMENT,
            RuntimeError::InvalidOpcode { .. }
            | RuntimeError::Truncated { .. }
            | RuntimeError::AddressOutOfRange { .. }
            | RuntimeError::Decode(_) => status::INVALID_OPCODE,
            RuntimeError::TraceOpen { .. } => status::TRACE_OPEN,
            RuntimeError::Trace(_) => status::TRACE_WRITE,
        }
    }
}

impl From<FormatError> for RuntimeError {
    fn from(e: FormatError) -> Self {
        match e {
            FormatError::InvalidOpcode { tag, offset } => RuntimeError::InvalidOpcode { tag, offset },
            FormatError::Truncated { offset, .. } => RuntimeError::Truncated { offset },
            FormatError::AddressOutOfRange { addr, memory, .. } => {
                RuntimeError::AddressOutOfRange { addr, memory }
            }
            other => RuntimeError::Decode(other),
        }
    }
}
