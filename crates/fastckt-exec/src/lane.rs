//! Lane registers: one RAM cell holding one boolean per batched instance.

use std::fmt::Debug;
use std::ops::{BitAnd, BitOr, BitXor, Not};

use rand::RngCore;

/// Largest [`Lane::BYTES`] of any implementation.
pub const MAX_LANE_BYTES: usize = 16;

/// A register of [`Lane::LANES`] independent boolean values.
///
/// Gates are applied with the bitwise operators, so lane `i` of a result only
/// ever depends on lane `i` of the operands.
pub trait Lane:
    Copy
    + Debug
    + Default
    + Eq
    + Send
    + Sync
    + 'static
    + BitXor<Output = Self>
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + Not<Output = Self>
{
    /// Number of instances evaluated in parallel.
    const LANES: usize;

    /// Size of one trace record in bytes.
    const BYTES: usize;

    /// All lanes false.
    const ZERO: Self;

    /// Value of lane `i`.
    fn lane(self, i: usize) -> bool;

    /// Sets lane `i` without touching the others.
    fn set_lane(&mut self, i: usize, bit: bool);

    /// Draws `LANES` independent uniform bits.
    fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self;

    /// Writes the register as `BYTES` little-endian bytes.
    fn write_le(self, out: &mut [u8]);

    /// Reads a register from `BYTES` little-endian bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_lane {
    ($($ty:ty),*) => {$(
        impl Lane for $ty {
            const LANES: usize = <$ty>::BITS as usize;
            const BYTES: usize = size_of::<$ty>();
            const ZERO: Self = 0;

            #[inline(always)]
            fn lane(self, i: usize) -> bool {
                (self >> i) & 1 == 1
            }

            #[inline(always)]
            fn set_lane(&mut self, i: usize, bit: bool) {
                *self = (*self & !(1 << i)) | ((bit as $ty) << i);
            }

            #[inline]
            fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self {
                let mut bytes = [0u8; size_of::<$ty>()];
                rng.fill_bytes(&mut bytes);
                <$ty>::from_le_bytes(bytes)
            }

            #[inline]
            fn write_le(self, out: &mut [u8]) {
                out[..Self::BYTES].copy_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; size_of::<$ty>()];
                buf.copy_from_slice(&bytes[..Self::BYTES]);
                <$ty>::from_le_bytes(buf)
            }
        }
    )*};
}

impl_lane!(u8, u16, u32, u64, u128);

const _: () = assert!(<u128 as Lane>::BYTES == MAX_LANE_BYTES);

/// Single-lane register, one instance per call. Traced as one byte (0 or 1).
impl Lane for bool {
    const LANES: usize = 1;
    const BYTES: usize = 1;
    const ZERO: Self = false;

    #[inline(always)]
    fn lane(self, _i: usize) -> bool {
        self
    }

    #[inline(always)]
    fn set_lane(&mut self, _i: usize, bit: bool) {
        *self = bit;
    }

    #[inline]
    fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        rng.next_u32() & 1 == 1
    }

    #[inline]
    fn write_le(self, out: &mut [u8]) {
        out[0] = self as u8;
    }

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] & 1 == 1
    }
}
