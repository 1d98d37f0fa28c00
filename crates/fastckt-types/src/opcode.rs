//! Opcode tags shared by the fixed and self-describing layouts.

/// Gate operator.
///
/// The discriminant values are the tags stored in the opcode stream:
/// - XOR = 1
/// - AND = 2
/// - OR = 3
/// - NOT = 4
/// - RANDOM = 5
///
/// Tag 0 and anything above 5 are invalid.
#[allow(missing_docs, reason = "operator names are self-describing")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    XOR = 1,
    AND = 2,
    OR = 3,
    NOT = 4,
    RANDOM = 5,
}

impl OpCode {
    /// All opcodes, in tag order.
    pub const ALL: [OpCode; 5] = [
        OpCode::XOR,
        OpCode::AND,
        OpCode::OR,
        OpCode::NOT,
        OpCode::RANDOM,
    ];

    /// Decodes a tag, returning `None` for unknown tags.
    #[inline]
    pub const fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            1 => Some(OpCode::XOR),
            2 => Some(OpCode::AND),
            3 => Some(OpCode::OR),
            4 => Some(OpCode::NOT),
            5 => Some(OpCode::RANDOM),
            _ => None,
        }
    }

    /// The tag stored in the opcode stream.
    #[inline]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Number of source operands read by this operator.
    #[inline]
    pub const fn arity(self) -> usize {
        match self {
            OpCode::XOR | OpCode::AND | OpCode::OR => 2,
            OpCode::NOT => 1,
            OpCode::RANDOM => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_conversions() {
        for op in OpCode::ALL {
            assert_eq!(OpCode::from_tag(op.tag() as u64), Some(op));
        }
        assert_eq!(OpCode::from_tag(0), None);
        assert_eq!(OpCode::from_tag(6), None);
        assert_eq!(OpCode::from_tag(u64::MAX), None);
    }

    #[test]
    fn test_arity() {
        assert_eq!(OpCode::XOR.arity(), 2);
        assert_eq!(OpCode::OR.arity(), 2);
        assert_eq!(OpCode::NOT.arity(), 1);
        assert_eq!(OpCode::RANDOM.arity(), 0);
    }
}
