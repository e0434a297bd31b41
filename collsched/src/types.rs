use crate::error::{CollError, Result};

/// Rank of a participant in a communicator group (0-indexed).
pub type Rank = u32;

/// Per-invocation message tag.
///
/// Every collective call draws a fresh tag from its communicator, so two
/// outstanding executions of the same cached schedule never match each
/// other's messages.
pub type Tag = u64;

/// Element types understood by the collective layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    F32 = 0,
    F64 = 1,
    F16 = 2,
    BF16 = 3,
    I8 = 4,
    I32 = 5,
    I64 = 6,
    U8 = 7,
    U32 = 8,
    U64 = 9,
}

impl DataType {
    /// Size of one element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DataType::F32 | DataType::I32 | DataType::U32 => 4,
            DataType::F64 | DataType::I64 | DataType::U64 => 8,
            DataType::F16 | DataType::BF16 => 2,
            DataType::I8 | DataType::U8 => 1,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::F16 => "f16",
            DataType::BF16 => "bf16",
            DataType::I8 => "i8",
            DataType::I32 => "i32",
            DataType::I64 => "i64",
            DataType::U8 => "u8",
            DataType::U32 => "u32",
            DataType::U64 => "u64",
        }
    }

    /// Whether the host reduction kernels can combine this type.
    ///
    /// Half-precision types can be moved but not reduced.
    pub const fn is_reducible(self) -> bool {
        !matches!(self, DataType::F16 | DataType::BF16)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Reduction operations for collective communication.
///
/// All operations are commutative and associative, which the dissemination
/// schedules rely on: ranks combine partial results in different orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReduceOp {
    /// Element-wise sum across ranks.
    Sum = 0,
    /// Element-wise product across ranks.
    Prod = 1,
    /// Element-wise minimum across ranks.
    Min = 2,
    /// Element-wise maximum across ranks.
    Max = 3,
}

impl ReduceOp {
    /// Map a raw operator identifier to an operation.
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(ReduceOp::Sum),
            1 => Ok(ReduceOp::Prod),
            2 => Ok(ReduceOp::Min),
            3 => Ok(ReduceOp::Max),
            other => Err(CollError::UnknownReduceOp(other)),
        }
    }

    /// Raw operator identifier, the inverse of [`ReduceOp::from_id`].
    pub const fn id(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReduceOp::Sum => f.write_str("sum"),
            ReduceOp::Prod => f.write_str("prod"),
            ReduceOp::Min => f.write_str("min"),
            ReduceOp::Max => f.write_str("max"),
        }
    }
}
