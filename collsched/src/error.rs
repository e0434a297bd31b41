use crate::types::{DataType, Rank, Tag};

pub type Result<T> = std::result::Result<T, CollError>;

/// Broad failure category of a [`CollError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad call arguments. Detected before any schedule is cached.
    Argument,
    /// Peer unreachable, truncated transfer, resource exhaustion.
    Transport,
    /// A generator or engine defect. Never expected in correct operation.
    Programming,
}

#[derive(Debug, thiserror::Error)]
pub enum CollError {
    #[error("invalid rank {rank}: world size is {world_size}")]
    InvalidRank { rank: Rank, world_size: u32 },

    #[error("unsupported data type: {dtype:?} for operation {op}")]
    UnsupportedDType { dtype: DataType, op: &'static str },

    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("invalid argument to {operation}: {reason}")]
    InvalidArgument {
        operation: &'static str,
        reason: String,
    },

    #[error("unknown reduce operator id {0}")]
    UnknownReduceOp(u8),

    #[error("schedule needs {requested} scratch bytes, limit is {limit}")]
    ScratchLimitExceeded { requested: usize, limit: usize },

    #[error("peer {rank} disconnected unexpectedly")]
    PeerDisconnected { rank: Rank },

    #[error("rank {rank} not found in communicator")]
    UnknownPeer { rank: Rank },

    #[error("truncated transfer from rank {rank}: expected {expected} bytes, got {actual}")]
    Truncated {
        rank: Rank,
        expected: usize,
        actual: usize,
    },

    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{operation} failed at rank {rank}: {reason}")]
    CollectiveFailed {
        operation: &'static str,
        rank: Rank,
        reason: String,
    },

    #[error("execution with tag {tag} already failed")]
    ScheduleFailed { tag: Tag },

    #[error("internal lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("step {step} depends on step {dep}, which does not precede it")]
    DependencyCycle { step: usize, dep: usize },

    #[error("slice {offset}+{len} out of bounds for scratch buffer {index} ({size} bytes)")]
    SliceOutOfBounds {
        index: usize,
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("step {step} moves {src} bytes into a {dst}-byte slice")]
    SliceLengthMismatch { step: usize, src: usize, dst: usize },

    #[error("local combine failed at step {step}: {reason}")]
    InvalidCombine { step: usize, reason: String },

    #[error("transport has no outstanding request {0}")]
    UnknownRequest(u64),
}

impl CollError {
    /// Create a `Transport` error with just a message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a `Transport` error with a message and a source error.
    pub fn transport_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Failure category, used by callers that translate errors into status codes.
    pub fn class(&self) -> ErrorClass {
        match self {
            CollError::InvalidRank { .. }
            | CollError::UnsupportedDType { .. }
            | CollError::BufferSizeMismatch { .. }
            | CollError::InvalidArgument { .. }
            | CollError::UnknownReduceOp(_)
            | CollError::ScratchLimitExceeded { .. } => ErrorClass::Argument,

            CollError::PeerDisconnected { .. }
            | CollError::UnknownPeer { .. }
            | CollError::Truncated { .. }
            | CollError::Transport { .. }
            | CollError::CollectiveFailed { .. }
            | CollError::ScheduleFailed { .. }
            | CollError::LockPoisoned(_) => ErrorClass::Transport,

            CollError::DependencyCycle { .. }
            | CollError::SliceOutOfBounds { .. }
            | CollError::SliceLengthMismatch { .. }
            | CollError::InvalidCombine { .. }
            | CollError::UnknownRequest(_) => ErrorClass::Programming,
        }
    }
}
