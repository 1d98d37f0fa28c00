//! BLAKE3 fingerprints of execution traces.

use std::io;

use crate::{Lane, MAX_LANE_BYTES, TraceSink};

/// Hashes every record on its way to another sink.
///
/// Records are hashed in their on-disk encoding ([`Lane::BYTES`]
/// little-endian bytes), so the fingerprint of a run traced through a
/// [`TraceWriter`](crate::TraceWriter) equals `blake3::hash` of the trace
/// file it produced.
///
/// ```
/// use fastckt_exec::{Fingerprint, TraceSink, TraceWriter};
///
/// let mut sink = Fingerprint::new(TraceWriter::new(Vec::new()));
/// TraceSink::<u16>::record(&mut sink, 0x0102).unwrap();
/// TraceSink::<u16>::finish(&mut sink).unwrap();
///
/// let (writer, hash) = sink.into_parts();
/// assert_eq!(hash, blake3::hash(&writer.into_inner()));
/// ```
#[derive(Debug)]
pub struct Fingerprint<S> {
    inner: S,
    hasher: blake3::Hasher,
    records: u64,
}

impl<S> Fingerprint<S> {
    /// Wraps `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            hasher: blake3::Hasher::new(),
            records: 0,
        }
    }

    /// Digest of the records seen so far.
    pub fn digest(&self) -> blake3::Hash {
        self.hasher.finalize()
    }

    /// Number of records hashed.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Returns the wrapped sink and the final digest.
    pub fn into_parts(self) -> (S, blake3::Hash) {
        let hash = self.hasher.finalize();
        (self.inner, hash)
    }
}

impl<L: Lane, S: TraceSink<L>> TraceSink<L> for Fingerprint<S> {
    #[inline]
    fn record(&mut self, value: L) -> io::Result<()> {
        self.inner.record(value)?;

        let mut buf = [0u8; MAX_LANE_BYTES];
        value.write_le(&mut buf);
        self.hasher.update(&buf[..L::BYTES]);
        self.records += 1;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.inner.finish()
    }
}
