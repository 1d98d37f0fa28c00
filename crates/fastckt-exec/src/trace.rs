//! Execution traces.
//!
//! A trace is the sequence of values written by each gate, in program order,
//! one lane register per record. Records are [`Lane::BYTES`] little-endian
//! bytes with no header, so a trace file's length is
//! `num_opcodes * Lane::BYTES`. The destination of record `n` is recovered
//! by decoding gate `n` of the same opcode stream (see [`replay`]).

use std::collections::BTreeMap;
use std::io::{self, ErrorKind, Read, Write};
use std::marker::PhantomData;

use crate::{Circuit, Lane, MAX_LANE_BYTES, RuntimeError};

/// Receives the value written by every executed gate.
pub trait TraceSink<L: Lane> {
    /// Records the post-write value of the gate's destination cell.
    fn record(&mut self, value: L) -> io::Result<()>;

    /// Called once after the last gate.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Keeps the trace in memory.
impl<L: Lane> TraceSink<L> for Vec<L> {
    fn record(&mut self, value: L) -> io::Result<()> {
        self.push(value);
        Ok(())
    }
}

/// Streams records to a writer.
#[derive(Debug)]
pub struct TraceWriter<W> {
    inner: W,
    records: u64,
}

impl<W: Write> TraceWriter<W> {
    /// Creates a new instance.
    pub fn new(inner: W) -> Self {
        Self { inner, records: 0 }
    }

    /// Number of records written so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Unwraps the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<L: Lane, W: Write> TraceSink<L> for TraceWriter<W> {
    #[inline]
    fn record(&mut self, value: L) -> io::Result<()> {
        let mut buf = [0u8; MAX_LANE_BYTES];
        value.write_le(&mut buf);
        self.inner.write_all(&buf[..L::BYTES])?;
        self.records += 1;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Reads records back from a trace stream.
#[derive(Debug)]
pub struct TraceReader<R, L> {
    inner: R,
    _lane: PhantomData<L>,
}

impl<R: Read, L: Lane> TraceReader<R, L> {
    /// Creates a new instance.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            _lane: PhantomData,
        }
    }
}

impl<R: Read, L: Lane> Iterator for TraceReader<R, L> {
    type Item = io::Result<L>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = [0u8; MAX_LANE_BYTES];
        let buf = &mut buf[..L::BYTES];

        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Some(Err(e)),
            }
        }

        match filled {
            0 => None,
            n if n == buf.len() => Some(Ok(L::read_le(buf))),
            _ => Some(Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                "trace ends in the middle of a record",
            ))),
        }
    }
}

/// Replays a trace against the circuit's opcode stream.
///
/// Returns the last value written to every destination cell, which matches
/// the RAM contents a direct execution leaves behind for those cells.
pub fn replay<L, I>(circuit: &Circuit<L>, records: I) -> Result<BTreeMap<usize, L>, RuntimeError>
where
    L: Lane,
    I: IntoIterator<Item = io::Result<L>>,
{
    let mut records = records.into_iter();
    let mut cells = BTreeMap::new();

    for (n, gate) in circuit.gates().enumerate() {
        let gate = gate?;
        let value = records
            .next()
            .ok_or_else(|| {
                RuntimeError::Trace(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("trace ends after {n} records"),
                ))
            })?
            .map_err(RuntimeError::Trace)?;
        cells.insert(gate.out as usize, value);
    }

    if records.next().is_some() {
        return Err(RuntimeError::Trace(io::Error::new(
            ErrorKind::InvalidData,
            "trace has more records than the circuit has gates",
        )));
    }

    Ok(cells)
}

/// Splits a batched trace into one trace per instance.
///
/// Instance `j` gets lane `j` of every record, one bit per gate, packed most
/// significant bit first; the last byte is zero-padded. Returns the number
/// of records read.
pub fn split_batch<R, L, W>(records: TraceReader<R, L>, writers: &mut [W]) -> io::Result<u64>
where
    R: Read,
    L: Lane,
    W: Write,
{
    if writers.len() > L::LANES {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!(
                "{} instances requested from a {} lane trace",
                writers.len(),
                L::LANES
            ),
        ));
    }

    let mut acc = vec![0u8; writers.len()];
    let mut count = 0u64;

    for record in records {
        let record = record?;
        for (j, byte) in acc.iter_mut().enumerate() {
            *byte = (*byte << 1) | record.lane(j) as u8;
        }
        count += 1;

        if count % 8 == 0 {
            for (w, byte) in writers.iter_mut().zip(acc.iter_mut()) {
                w.write_all(&[*byte])?;
                *byte = 0;
            }
        }
    }

    let pending = (count % 8) as u32;
    for (w, byte) in writers.iter_mut().zip(&acc) {
        if pending != 0 {
            w.write_all(&[byte << (8 - pending)])?;
        }
        w.flush()?;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_writer_reader_records() {
        let mut sink = TraceWriter::new(Vec::new());
        for v in [1u32, 0xdead_beef, 0] {
            sink.record(v).unwrap();
        }
        TraceSink::<u32>::finish(&mut sink).unwrap();
        assert_eq!(sink.records(), 3);

        let bytes = sink.into_inner();
        assert_eq!(bytes.len(), 12);

        let back: Vec<u32> = TraceReader::new(Cursor::new(bytes))
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(back, [1, 0xdead_beef, 0]);
    }

    #[test]
    fn test_reader_rejects_partial_record() {
        let mut reader = TraceReader::<_, u16>::new(Cursor::new(vec![1u8, 2, 3]));
        assert_eq!(reader.next().unwrap().unwrap(), 0x0201);
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_split_batch_packs_bits() {
        // Ten records; lane 0 is always set, lane 1 alternates, lane 2 never.
        let mut trace = TraceWriter::new(Vec::new());
        for i in 0..10u8 {
            trace.record(0b001 | ((i % 2) << 1)).unwrap();
        }
        let bytes = trace.into_inner();

        let mut outs: Vec<Vec<u8>> = vec![Vec::new(); 3];
        let n = split_batch(TraceReader::<_, u8>::new(Cursor::new(bytes)), &mut outs).unwrap();
        assert_eq!(n, 10);
        assert_eq!(outs[0], [0xff, 0b1100_0000]);
        assert_eq!(outs[1], [0b0101_0101, 0b0100_0000]);
        assert_eq!(outs[2], [0x00, 0x00]);
    }

    #[test]
    fn test_split_batch_too_many_instances() {
        let mut outs: Vec<Vec<u8>> = vec![Vec::new(); 9];
        let err = split_batch(TraceReader::<_, u8>::new(Cursor::new(Vec::<u8>::new())), &mut outs)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
