//! fastckt - binary descriptor format for straight-line boolean circuits.
//!
//! A descriptor is a header ([`CircuitInfo`]) followed by the input address
//! table, the output address table and the opcode stream. Field widths are
//! either fixed (legacy layout) or declared in the header (self-describing
//! layout), see [`Format`].

mod constants;
mod error;
mod gate;
mod header;
mod opcode;
mod widths;
mod writer;

pub use constants::*;
pub use error::*;
pub use gate::*;
pub use header::*;
pub use opcode::*;
pub use widths::*;
pub use writer::*;
