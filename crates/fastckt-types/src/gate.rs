use crate::{FormatError, OpCode, Widths, read_uint, write_uint};

/// A single decoded gate.
///
/// Unused source operands are zero: NOT only reads `in1`, RANDOM reads
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gate {
    /// Operator
    pub op: OpCode,
    /// First source address
    pub in1: u64,
    /// Second source address
    pub in2: u64,
    /// Destination address
    pub out: u64,
}

impl Gate {
    /// `out = in1 ^ in2`
    pub fn xor(in1: u64, in2: u64, out: u64) -> Self {
        Gate {
            op: OpCode::XOR,
            in1,
            in2,
            out,
        }
    }

    /// `out = in1 & in2`
    pub fn and(in1: u64, in2: u64, out: u64) -> Self {
        Gate {
            op: OpCode::AND,
            in1,
            in2,
            out,
        }
    }

    /// `out = in1 | in2`
    pub fn or(in1: u64, in2: u64, out: u64) -> Self {
        Gate {
            op: OpCode::OR,
            in1,
            in2,
            out,
        }
    }

    /// `out = !in1`
    pub fn not(in1: u64, out: u64) -> Self {
        Gate {
            op: OpCode::NOT,
            in1,
            in2: 0,
            out,
        }
    }

    /// `out = <fresh random bits>`
    pub fn random(out: u64) -> Self {
        Gate {
            op: OpCode::RANDOM,
            in1: 0,
            in2: 0,
            out,
        }
    }

    /// Source addresses actually read by the gate.
    pub fn sources(&self) -> impl Iterator<Item = u64> {
        [self.in1, self.in2].into_iter().take(self.op.arity())
    }

    /// Validate gate addresses against the memory size
    pub fn validate(&self, memory: u64) -> Result<(), FormatError> {
        for (field, addr) in ["in1", "in2"].into_iter().zip(self.sources()) {
            if addr >= memory {
                return Err(FormatError::AddressOutOfRange {
                    field,
                    addr,
                    memory,
                });
            }
        }

        if self.out >= memory {
            return Err(FormatError::AddressOutOfRange {
                field: "out",
                addr: self.out,
                memory,
            });
        }

        Ok(())
    }

    /// Encoded record size under `widths`.
    pub fn encoded_size(&self, widths: Widths) -> usize {
        widths.op() as usize + (self.op.arity() + 1) * widths.addr() as usize
    }

    /// Appends the encoded record: tag, sources, destination.
    pub fn encode(&self, widths: Widths, out: &mut Vec<u8>) -> Result<(), FormatError> {
        write_uint(out, self.op.tag() as u64, widths.op())?;
        for addr in self.sources() {
            write_uint(out, addr, widths.addr())?;
        }
        write_uint(out, self.out, widths.addr())
    }

    /// Decodes the record starting at `offset`, returning the gate and the
    /// record length.
    #[inline]
    pub fn decode(
        stream: &[u8],
        offset: usize,
        widths: Widths,
    ) -> Result<(Self, usize), FormatError> {
        let op_w = widths.op() as usize;
        let addr_w = widths.addr() as usize;
        let rest = &stream[offset.min(stream.len())..];

        if rest.len() < op_w {
            return Err(FormatError::Truncated {
                offset,
                needed: op_w,
                available: rest.len(),
            });
        }
        let tag = read_uint(rest, widths.op());
        let op = OpCode::from_tag(tag).ok_or(FormatError::InvalidOpcode { tag, offset })?;

        let len = op_w + (op.arity() + 1) * addr_w;
        if rest.len() < len {
            return Err(FormatError::Truncated {
                offset,
                needed: len,
                available: rest.len(),
            });
        }

        let addr = |i: usize| read_uint(&rest[op_w + i * addr_w..], widths.addr());
        let gate = match op.arity() {
            2 => Gate {
                op,
                in1: addr(0),
                in2: addr(1),
                out: addr(2),
            },
            1 => Gate {
                op,
                in1: addr(0),
                in2: 0,
                out: addr(1),
            },
            _ => Gate {
                op,
                in1: 0,
                in2: 0,
                out: addr(0),
            },
        };

        Ok((gate, len))
    }
}

/// Walks an opcode stream front to back, one gate per step.
///
/// Stops after the first error.
#[derive(Debug, Clone)]
pub struct GateDecoder<'s> {
    stream: &'s [u8],
    offset: usize,
    widths: Widths,
    failed: bool,
}

impl<'s> GateDecoder<'s> {
    /// Creates a new instance starting at offset 0.
    pub fn new(stream: &'s [u8], widths: Widths) -> Self {
        Self {
            stream,
            offset: 0,
            widths,
            failed: false,
        }
    }

    /// Byte offset of the next record.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Iterator for GateDecoder<'_> {
    type Item = Result<Gate, FormatError>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.stream.len() {
            return None;
        }

        match Gate::decode(self.stream, self.offset, self.widths) {
            Ok((gate, len)) => {
                self.offset += len;
                Some(Ok(gate))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        let widths = Widths::new(1, 2).unwrap();
        let mut buf = Vec::new();
        Gate::xor(0x0102, 0x0304, 0x0506)
            .encode(widths, &mut buf)
            .unwrap();
        assert_eq!(buf, [1, 0x02, 0x01, 0x04, 0x03, 0x06, 0x05]);

        buf.clear();
        Gate::not(7, 8).encode(widths, &mut buf).unwrap();
        assert_eq!(buf, [4, 7, 0, 8, 0]);

        buf.clear();
        Gate::random(9).encode(widths, &mut buf).unwrap();
        assert_eq!(buf, [5, 9, 0]);
    }

    #[test]
    fn test_decoder_walks_mixed_stream() {
        let widths = Widths::new(2, 3).unwrap();
        let gates = [
            Gate::random(4),
            Gate::and(0, 4, 5),
            Gate::not(5, 6),
            Gate::or(6, 1, 7),
            Gate::xor(7, 2, 70_000),
        ];

        let mut stream = Vec::new();
        for g in &gates {
            g.encode(widths, &mut stream).unwrap();
        }
        let expected_len: usize = gates.iter().map(|g| g.encoded_size(widths)).sum();
        assert_eq!(stream.len(), expected_len);

        let mut decoder = GateDecoder::new(&stream, widths);
        let decoded: Vec<Gate> = decoder.by_ref().map(Result::unwrap).collect();
        assert_eq!(decoded, gates);
        assert_eq!(decoder.offset(), stream.len());
    }

    #[test]
    fn test_decoder_rejects_bad_tag() {
        let widths = Widths::FIXED;
        let mut stream = Vec::new();
        Gate::not(0, 1).encode(widths, &mut stream).unwrap();
        stream.extend_from_slice(&[9, 0, 0, 0, 0]);

        let mut decoder = GateDecoder::new(&stream, widths);
        assert!(decoder.next().unwrap().is_ok());
        assert_eq!(
            decoder.next().unwrap(),
            Err(FormatError::InvalidOpcode { tag: 9, offset: 5 })
        );
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_decoder_rejects_truncated_record() {
        let widths = Widths::FIXED;
        let mut stream = Vec::new();
        Gate::xor(0, 1, 2).encode(widths, &mut stream).unwrap();
        stream.pop();

        let mut decoder = GateDecoder::new(&stream, widths);
        assert_eq!(
            decoder.next().unwrap(),
            Err(FormatError::Truncated {
                offset: 0,
                needed: 7,
                available: 6
            })
        );
    }

    #[test]
    fn test_gate_validate() {
        assert!(Gate::xor(0, 1, 2).validate(3).is_ok());
        assert_eq!(
            Gate::xor(0, 3, 2).validate(3),
            Err(FormatError::AddressOutOfRange {
                field: "in2",
                addr: 3,
                memory: 3
            })
        );
        assert_eq!(
            Gate::random(3).validate(3),
            Err(FormatError::AddressOutOfRange {
                field: "out",
                addr: 3,
                memory: 3
            })
        );
        // Unused operands are never checked.
        let mut g = Gate::not(0, 1);
        g.in2 = 99;
        assert!(g.validate(2).is_ok());
    }
}
