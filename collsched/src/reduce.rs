//! Element-wise reduction kernels used by local-combine steps and the CPU
//! device adapter.

use crate::error::{CollError, Result};
use crate::types::{DataType, ReduceOp};

/// Types that support the four reduction operations.
trait Reducible: Copy + 'static {
    fn reduce(a: Self, b: Self, op: ReduceOp) -> Self;
}

macro_rules! impl_reducible {
    (int: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => a.wrapping_add(b),
                        ReduceOp::Prod => a.wrapping_mul(b),
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                    }
                }
            }
        )*
    };
    (float: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => a + b,
                        ReduceOp::Prod => a * b,
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                    }
                }
            }
        )*
    };
}

impl_reducible!(int: i8, i32, i64, u8, u32, u64);
impl_reducible!(float: f32, f64);

/// Native-endian element access on unaligned byte slices.
trait NeBytes: Sized {
    const SIZE: usize;
    fn read_ne(bytes: &[u8]) -> Self;
    fn write_ne(self, bytes: &mut [u8]);
}

macro_rules! impl_ne_bytes {
    ($($ty:ty),*) => {
        $(
            impl NeBytes for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn read_ne(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    Self::from_ne_bytes(raw)
                }

                #[inline]
                fn write_ne(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_ne_bytes!(i8, i32, i64, u8, u32, u64, f32, f64);

/// Element-wise `dst[i] = op(dst[i], src[i])` on byte slices interpreted as
/// `count` elements of `dtype`.
///
/// Both slices must hold exactly `count * dtype.size_in_bytes()` bytes.
pub(crate) fn reduce_slice(
    dst: &mut [u8],
    src: &[u8],
    count: usize,
    dtype: DataType,
    op: ReduceOp,
) -> Result<()> {
    let expected = count * dtype.size_in_bytes();
    for actual in [dst.len(), src.len()] {
        if actual != expected {
            return Err(CollError::BufferSizeMismatch { expected, actual });
        }
    }

    match dtype {
        DataType::F32 => reduce_slice_typed::<f32>(dst, src, op),
        DataType::F64 => reduce_slice_typed::<f64>(dst, src, op),
        DataType::I32 => reduce_slice_typed::<i32>(dst, src, op),
        DataType::I64 => reduce_slice_typed::<i64>(dst, src, op),
        DataType::U32 => reduce_slice_typed::<u32>(dst, src, op),
        DataType::U64 => reduce_slice_typed::<u64>(dst, src, op),
        DataType::I8 => reduce_slice_typed::<i8>(dst, src, op),
        DataType::U8 => reduce_slice_typed::<u8>(dst, src, op),
        DataType::F16 | DataType::BF16 => {
            return Err(CollError::UnsupportedDType { dtype, op: "reduce" });
        }
    }
    Ok(())
}

fn reduce_slice_typed<T: Reducible + NeBytes>(dst: &mut [u8], src: &[u8], op: ReduceOp) {
    for (d, s) in dst.chunks_exact_mut(T::SIZE).zip(src.chunks_exact(T::SIZE)) {
        let r = T::reduce(T::read_ne(d), T::read_ne(s), op);
        r.write_ne(d);
    }
}
