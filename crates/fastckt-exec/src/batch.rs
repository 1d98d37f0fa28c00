//! Moving per-instance bytes in and out of lane registers.
//!
//! Instance `i` occupies `bytes` consecutive bytes starting at `i * bytes`.
//! Wire `k` is bit `7 - k % 8` of byte `k / 8` (most significant bit first),
//! and lives in lane `i` of its RAM cell.

use crate::{Circuit, Lane, RandomSource, RuntimeError, TraceSink};

/// Packs `batch` instances into the input cells.
///
/// Lanes at or above `batch` are left as they are (zero after a RAM reset).
pub fn pack_inputs<L: Lane>(
    ram: &mut [L],
    input_addr: &[usize],
    inputs: &[u8],
    bytes: usize,
    batch: usize,
) {
    if bytes == 0 {
        return;
    }

    for (lane, instance) in inputs.chunks_exact(bytes).take(batch).enumerate() {
        for (k, &addr) in input_addr.iter().enumerate() {
            let bit = (instance[k / 8] >> (7 - k % 8)) & 1 == 1;
            ram[addr].set_lane(lane, bit);
        }
    }
}

/// Unpacks `batch` instances from the output cells. Padding bits are zero.
pub fn unpack_outputs<L: Lane>(
    ram: &[L],
    output_addr: &[usize],
    outputs: &mut [u8],
    bytes: usize,
    batch: usize,
) {
    if bytes == 0 {
        return;
    }

    for (lane, instance) in outputs.chunks_exact_mut(bytes).take(batch).enumerate() {
        instance.fill(0);
        for (k, &addr) in output_addr.iter().enumerate() {
            let bit = ram[addr].lane(lane) as u8;
            instance[k / 8] |= bit << (7 - k % 8);
        }
    }
}

impl<L: Lane> Circuit<L> {
    /// Runs any number of instances, [`Lane::LANES`] at a time.
    ///
    /// Each input must hold at least
    /// [`CircuitInfo::input_bytes`](fastckt_types::CircuitInfo::input_bytes)
    /// bytes. Returns one output vector per input, in order.
    pub fn compute_batches<I: AsRef<[u8]>>(
        &mut self,
        inputs: &[I],
        rng: &mut RandomSource,
    ) -> Result<Vec<Vec<u8>>, RuntimeError> {
        let (outputs, _) = self.compute_batches_traced(inputs, rng, |_| Ok(None::<Vec<L>>))?;
        Ok(outputs)
    }

    /// Like [`Circuit::compute_batches`], asking `sink_for(batch_index)` for a
    /// trace sink before each batch. The sinks are handed back in batch
    /// order.
    pub fn compute_batches_traced<I, S, F>(
        &mut self,
        inputs: &[I],
        rng: &mut RandomSource,
        mut sink_for: F,
    ) -> Result<(Vec<Vec<u8>>, Vec<S>), RuntimeError>
    where
        I: AsRef<[u8]>,
        S: TraceSink<L>,
        F: FnMut(usize) -> Result<Option<S>, RuntimeError>,
    {
        let in_bytes = self.info.input_bytes();
        let out_bytes = self.info.output_bytes();

        if let Some(short) = inputs.iter().map(|i| i.as_ref().len()).find(|&n| n < in_bytes) {
            return Err(RuntimeError::InputTooShort {
                needed: in_bytes,
                got: short,
            });
        }
        if inputs.len() % L::LANES != 0 {
            log::warn!(
                "{} instances do not fill the last batch of {} lanes",
                inputs.len(),
                L::LANES
            );
        }

        let mut packed_in = vec![0u8; L::LANES * in_bytes];
        let mut packed_out = vec![0u8; L::LANES * out_bytes];
        let mut outputs = Vec::with_capacity(inputs.len());
        let mut sinks = Vec::new();

        for (idx, chunk) in inputs.chunks(L::LANES).enumerate() {
            if in_bytes > 0 {
                for (dst, src) in packed_in.chunks_exact_mut(in_bytes).zip(chunk) {
                    dst.copy_from_slice(&src.as_ref()[..in_bytes]);
                }
            }

            let mut sink = sink_for(idx)?;
            self.compute(
                &packed_in,
                &mut packed_out,
                sink.as_mut().map(|s| s as &mut dyn TraceSink<L>),
                chunk.len(),
                rng,
            )?;
            sinks.extend(sink);

            outputs.extend(
                (0..chunk.len()).map(|i| packed_out[i * out_bytes..(i + 1) * out_bytes].to_vec()),
            );
        }

        log::debug!(
            "ran {} instances in {} batches",
            inputs.len(),
            inputs.len().div_ceil(L::LANES)
        );
        Ok((outputs, sinks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_msb_first() {
        let mut ram = [0u8; 10];
        let addrs: Vec<usize> = (0..10).collect();
        // Instance 0 sets wires 0 and 9, instance 1 sets wire 7.
        let inputs = [0b1000_0000, 0b0100_0000, 0b0000_0001, 0b0000_0000];
        pack_inputs(&mut ram, &addrs, &inputs, 2, 2);

        assert_eq!(ram[0], 0b01);
        assert_eq!(ram[7], 0b10);
        assert_eq!(ram[9], 0b01);
        assert!(ram[1..7].iter().all(|&c| c == 0));
        assert_eq!(ram[8], 0);
    }

    #[test]
    fn test_pack_respects_batch() {
        let mut ram = [0u64; 1];
        pack_inputs(&mut ram, &[0], &[0x80, 0x80, 0x80], 1, 2);
        assert_eq!(ram[0], 0b11);
    }

    #[test]
    fn test_unpack_clears_padding() {
        let ram = [0b10u8, 0b11, 0b01];
        let mut out = [0xffu8; 2];
        unpack_outputs(&ram, &[0, 1, 2], &mut out, 1, 2);
        assert_eq!(out, [0b0110_0000, 0b1100_0000]);
    }

    #[test]
    fn test_pack_unpack_scattered_addresses() {
        let mut ram = [0u32; 5];
        let addrs = [4, 0, 2];
        let inputs = [0b1010_0000, 0b0110_0000, 0b1110_0000];
        pack_inputs(&mut ram, &addrs, &inputs, 1, 3);

        let mut out = [0u8; 3];
        unpack_outputs(&ram, &addrs, &mut out, 1, 3);
        assert_eq!(out, inputs);
    }
}
