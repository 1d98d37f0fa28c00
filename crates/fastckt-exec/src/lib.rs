//! Batched bit-sliced interpreter for straight-line boolean circuits.
//!
//! A [`Circuit`] is loaded from a descriptor (see [`fastckt_types`]) and run
//! with [`Circuit::compute`]: up to [`Lane::LANES`] independent instances are
//! packed into the bits of each RAM cell and every gate is applied to all of
//! them at once. Intermediate values can be streamed to a [`TraceSink`] for
//! leakage analysis.

mod batch;
mod circuit;
mod error;
mod exec;
pub mod ffi;
mod fingerprint;
mod lane;
mod rng;
pub mod trace;

pub use batch::*;
pub use circuit::*;
pub use error::*;
pub use fingerprint::*;
pub use lane::*;
pub use rng::*;
pub use trace::{TraceReader, TraceSink, TraceWriter};

pub use fastckt_types::{CircuitInfo, Format, Gate, OpCode, Widths};
