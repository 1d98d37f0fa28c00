//! Bit-sliced execution of the opcode stream.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use fastckt_types::{GateDecoder, OpCode};

use crate::batch::{pack_inputs, unpack_outputs};
use crate::{Circuit, Lane, RandomSource, RuntimeError, TraceSink, TraceWriter};

impl<L: Lane> Circuit<L> {
    /// Runs `batch_width` instances through the circuit.
    ///
    /// `inputs` holds `batch_width` consecutive instances of
    /// [`CircuitInfo::input_bytes`](fastckt_types::CircuitInfo::input_bytes)
    /// bytes each; `outputs` receives instances of
    /// [`CircuitInfo::output_bytes`](fastckt_types::CircuitInfo::output_bytes)
    /// bytes each (see [`pack_inputs`] for the bit layout). RAM is zeroed
    /// first, then every gate is applied to all lanes in program order. When
    /// `trace` is given it receives the value written by each gate.
    ///
    /// On error after the first gate ran, RAM, `outputs` and the trace are
    /// left in an unspecified state.
    pub fn compute(
        &mut self,
        inputs: &[u8],
        outputs: &mut [u8],
        trace: Option<&mut dyn TraceSink<L>>,
        batch_width: usize,
        rng: &mut RandomSource,
    ) -> Result<(), RuntimeError> {
        self.check_io(inputs.len(), outputs.len(), batch_width)?;

        self.ram.fill(L::ZERO);
        pack_inputs(
            &mut self.ram,
            &self.input_addr,
            inputs,
            self.info.input_bytes(),
            batch_width,
        );

        self.run(trace, rng)?;

        unpack_outputs(
            &self.ram,
            &self.output_addr,
            outputs,
            self.info.output_bytes(),
            batch_width,
        );
        Ok(())
    }

    /// Like [`Circuit::compute`], tracing to a file.
    ///
    /// `None` or an empty path disables tracing. The file is created before
    /// RAM is touched, so failing to open it leaves the circuit as it was.
    pub fn compute_to_path(
        &mut self,
        inputs: &[u8],
        outputs: &mut [u8],
        trace_path: Option<&Path>,
        batch_width: usize,
        rng: &mut RandomSource,
    ) -> Result<(), RuntimeError> {
        let Some(path) = trace_path.filter(|p| !p.as_os_str().is_empty()) else {
            return self.compute(inputs, outputs, None, batch_width, rng);
        };

        self.check_io(inputs.len(), outputs.len(), batch_width)?;
        let file = File::create(path).map_err(|source| RuntimeError::TraceOpen {
            path: path.to_path_buf(),
            source,
        })?;

        let mut sink = TraceWriter::new(BufWriter::new(file));
        self.compute(inputs, outputs, Some(&mut sink), batch_width, rng)?;
        log::debug!(
            "wrote {} trace records to {}",
            sink.records(),
            path.display()
        );
        Ok(())
    }

    pub(crate) fn check_io(
        &self,
        inputs: usize,
        outputs: usize,
        batch_width: usize,
    ) -> Result<(), RuntimeError> {
        if batch_width == 0 || batch_width > L::LANES {
            return Err(RuntimeError::BatchWidth {
                batch: batch_width,
                lanes: L::LANES,
            });
        }

        let needed = batch_width * self.info.input_bytes();
        if inputs < needed {
            return Err(RuntimeError::InputTooShort {
                needed,
                got: inputs,
            });
        }

        let needed = batch_width * self.info.output_bytes();
        if outputs < needed {
            return Err(RuntimeError::OutputTooShort {
                needed,
                got: outputs,
            });
        }

        Ok(())
    }

    /// Single pass over the opcode stream.
    fn run(
        &mut self,
        mut trace: Option<&mut dyn TraceSink<L>>,
        rng: &mut RandomSource,
    ) -> Result<(), RuntimeError> {
        let ram = &mut self.ram;
        let memory = ram.len();
        let cell = |addr: u64| {
            if addr < memory as u64 {
                Ok(addr as usize)
            } else {
                Err(RuntimeError::AddressOutOfRange {
                    addr,
                    memory: memory as u64,
                })
            }
        };

        let mut executed = 0u64;
        for gate in GateDecoder::new(&self.opcodes, self.info.widths) {
            let gate = gate?;
            let out = cell(gate.out)?;

            let value = match gate.op {
                OpCode::XOR => ram[cell(gate.in1)?] ^ ram[cell(gate.in2)?],
                OpCode::AND => ram[cell(gate.in1)?] & ram[cell(gate.in2)?],
                OpCode::OR => ram[cell(gate.in1)?] | ram[cell(gate.in2)?],
                OpCode::NOT => !ram[cell(gate.in1)?],
                OpCode::RANDOM => rng.draw(),
            };
            ram[out] = value;

            if let Some(sink) = trace.as_mut() {
                sink.record(value).map_err(RuntimeError::Trace)?;
            }
            executed += 1;
        }

        if let Some(sink) = trace {
            sink.finish().map_err(RuntimeError::Trace)?;
        }

        log::trace!("executed {executed} gates");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, Write};

    use fastckt_types::{DescriptorWriter, Gate, Widths};

    use super::*;
    use crate::error::status;
    use test_log::test;

    fn build<L: Lane>(memory: u64, inputs: &[u64], outputs: &[u64], gates: &[Gate]) -> Circuit<L> {
        let mut w = DescriptorWriter::new(memory, Widths::minimal_for(memory)).unwrap();
        for &a in inputs {
            w.add_input(a).unwrap();
        }
        for &a in outputs {
            w.add_output(a).unwrap();
        }
        for &g in gates {
            w.write_gate(g).unwrap();
        }
        let bytes = w.to_bytes().unwrap();
        Circuit::from_reader(Cursor::new(&bytes), Some(bytes.len() as u64)).unwrap()
    }

    #[test]
    fn test_xor_truth_table() {
        let mut c = build::<u64>(3, &[0, 1], &[2], &[Gate::xor(0, 1, 2)]);
        let mut rng = RandomSource::new(0);

        for (a, b, expected) in [(0u8, 0u8, 0u8), (1, 0, 1), (0, 1, 1), (1, 1, 0)] {
            let input = [(a << 7) | (b << 6)];
            let mut out = [0xffu8];
            c.compute(&input, &mut out, None, 1, &mut rng).unwrap();
            assert_eq!(out[0] >> 7, expected, "({a},{b})");
            assert_eq!(out[0] & 0x7f, 0);
        }
    }

    #[test]
    fn test_all_operators() {
        // out = [a^b, a&b, a|b, !a]
        let mut c = build::<u8>(
            6,
            &[0, 1],
            &[2, 3, 4, 5],
            &[
                Gate::xor(0, 1, 2),
                Gate::and(0, 1, 3),
                Gate::or(0, 1, 4),
                Gate::not(0, 5),
            ],
        );
        let mut rng = RandomSource::new(0);

        // Four instances: (a,b) = 00, 01, 10, 11
        let inputs = [0b0000_0000, 0b0100_0000, 0b1000_0000, 0b1100_0000];
        let mut outputs = [0u8; 4];
        c.compute(&inputs, &mut outputs, None, 4, &mut rng).unwrap();

        assert_eq!(outputs, [0b0001_0000, 0b1011_0000, 0b1010_0000, 0b0110_0000]);
    }

    #[test]
    fn test_ram_reset_between_calls() {
        // Cell 3 is never written by the stream but is an output.
        let mut c = build::<u64>(4, &[0], &[1, 3], &[Gate::not(0, 1)]);
        let mut rng = RandomSource::new(0);

        c.ram[3] = u64::MAX;
        let mut out = [0u8];
        c.compute(&[0x00], &mut out, None, 1, &mut rng).unwrap();
        assert_eq!(out, [0b1000_0000]);
    }

    #[test]
    fn test_unused_lanes_stay_zero_for_inputs() {
        let mut c = build::<u64>(2, &[0], &[1], &[Gate::xor(0, 0, 1)]);
        let mut rng = RandomSource::new(0);
        let mut out = [0u8; 2];
        c.compute(&[0x80, 0x80], &mut out, None, 2, &mut rng).unwrap();
        assert_eq!(c.ram()[0], 0b11);
    }

    #[test]
    fn test_random_gate_uses_source() {
        let mut c = build::<u64>(1, &[], &[], &[Gate::random(0)]);
        let mut rng = RandomSource::new(9);
        c.compute(&[], &mut [], None, 64, &mut rng).unwrap();

        let expected: u64 = RandomSource::new(9).draw();
        assert_eq!(c.ram()[0], expected);
    }

    #[test]
    fn test_trace_records_every_gate() {
        let mut c = build::<u8>(
            4,
            &[0, 1],
            &[3],
            &[Gate::xor(0, 1, 2), Gate::not(2, 3), Gate::and(3, 0, 2)],
        );
        let mut rng = RandomSource::new(0);
        let mut trace: Vec<u8> = Vec::new();
        let mut out = [0u8; 2];

        // Lane 0: a=1,b=0; lane 1: a=1,b=1
        c.compute(&[0x80, 0xc0], &mut out, Some(&mut trace), 2, &mut rng)
            .unwrap();

        let xor = 0b01;
        let not = !xor;
        assert_eq!(trace, [xor, not, not & 0b11]);
    }

    #[test]
    fn test_argument_checks() {
        let mut c = build::<u8>(3, &[0, 1], &[2], &[Gate::xor(0, 1, 2)]);
        let mut rng = RandomSource::new(0);
        let mut out = [0u8; 9];

        let err = c.compute(&[0; 9], &mut out, None, 0, &mut rng).unwrap_err();
        assert_eq!(err.status(), status::BAD_ARGUMENT);
        assert!(matches!(
            c.compute(&[0; 9], &mut out, None, 9, &mut rng),
            Err(RuntimeError::BatchWidth { batch: 9, lanes: 8 })
        ));
        assert!(matches!(
            c.compute(&[0; 2], &mut out, None, 3, &mut rng),
            Err(RuntimeError::InputTooShort { needed: 3, got: 2 })
        ));
        assert!(matches!(
            c.compute(&[0; 3], &mut out[..1], None, 3, &mut rng),
            Err(RuntimeError::OutputTooShort { needed: 3, got: 1 })
        ));
    }

    #[test]
    fn test_corrupted_stream_is_reported() {
        let mut c = build::<u64>(3, &[0, 1], &[2], &[Gate::xor(0, 1, 2)]);
        c.opcodes[0] = 0x7f;
        let mut rng = RandomSource::new(0);
        let err = c
            .compute(&[0], &mut [0], None, 1, &mut rng)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidOpcode { tag: 0x7f, offset: 0 }));
        assert_eq!(err.status(), status::INVALID_OPCODE);
    }

    #[test]
    fn test_corrupted_record_after_executed_gates() {
        let gates = [Gate::xor(0, 1, 2), Gate::not(2, 3), Gate::and(2, 3, 3)];
        let mut c = build::<u64>(4, &[0, 1], &[3], &gates);
        // One-byte fields: the second record starts after the 4-byte XOR.
        c.opcodes[4] = 0x7f;

        let mut rng = RandomSource::new(0);
        let mut trace = Vec::<u64>::new();
        let err = c
            .compute(&[0b1000_0000], &mut [0], Some(&mut trace), 1, &mut rng)
            .unwrap_err();

        assert!(matches!(err, RuntimeError::InvalidOpcode { tag: 0x7f, offset: 4 }));
        assert_eq!(err.status(), status::INVALID_OPCODE);
        assert_eq!(trace, [1]);
        assert_eq!(c.ram()[2], 1);
    }

    /// Accepts `left` writes, then fails.
    struct FailAfter {
        left: usize,
    }

    impl Write for FailAfter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.left == 0 {
                return Err(io::Error::other("disk full"));
            }
            self.left -= 1;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_trace_write_failure() {
        let gates = [Gate::xor(0, 1, 2), Gate::not(2, 3), Gate::and(2, 3, 3)];
        let mut c = build::<u64>(4, &[0, 1], &[3], &gates);
        let mut rng = RandomSource::new(0);

        let mut sink = TraceWriter::new(FailAfter { left: 1 });
        let err = c
            .compute(&[0b1000_0000], &mut [0], Some(&mut sink), 1, &mut rng)
            .unwrap_err();

        assert!(matches!(err, RuntimeError::Trace(_)));
        assert_eq!(err.status(), status::TRACE_WRITE);
        assert_eq!(sink.records(), 1);
        assert_eq!(c.ram()[2], 1);
    }

    #[test]
    fn test_trace_path_errors_before_mutation() {
        let mut c = build::<u64>(2, &[0], &[1], &[Gate::not(0, 1)]);
        let mut rng = RandomSource::new(0);
        c.ram[1] = 0xdead;

        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("missing").join("trace.bin");
        let err = c
            .compute_to_path(&[0], &mut [0], Some(&bad), 1, &mut rng)
            .unwrap_err();
        assert_eq!(err.status(), status::TRACE_OPEN);
        assert_eq!(c.ram()[1], 0xdead);

        // Empty path means no tracing.
        c.compute_to_path(&[0], &mut [0], Some(Path::new("")), 1, &mut rng)
            .unwrap();
    }

    #[test]
    fn test_trace_path_writes_records() {
        let mut c = build::<u16>(2, &[0], &[1], &[Gate::not(0, 1), Gate::not(1, 0)]);
        let mut rng = RandomSource::new(0);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.bin");

        c.compute_to_path(&[0x80], &mut [0], Some(&path), 1, &mut rng)
            .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, [0xfe, 0xff, 0x01, 0x00]);
    }
}
