//! Schedules: append-only DAGs of communication and local steps.
//!
//! A generator fills a fresh [`Schedule`] for one operation key. Once saved
//! in the cache it is shared as `Arc<Schedule>` and never mutated again; all
//! per-invocation state lives in [`Execution`](crate::progress::Execution).

use crate::error::{CollError, Result};
use crate::types::{DataType, Rank, ReduceOp};

/// Memory a step reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Buffer {
    /// Raw address of caller-owned memory.
    User(u64),
    /// Index of a scratch buffer allocated fresh by each execution.
    Scratch(usize),
}

/// A byte range within a [`Buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub buffer: Buffer,
    pub offset: usize,
    pub len: usize,
}

impl Slice {
    pub fn user(addr: u64, offset: usize, len: usize) -> Self {
        Self {
            buffer: Buffer::User(addr),
            offset,
            len,
        }
    }

    pub fn scratch(index: usize, offset: usize, len: usize) -> Self {
        Self {
            buffer: Buffer::Scratch(index),
            offset,
            len,
        }
    }

    /// Zero-length slice, used for synchronization-only messages.
    pub fn empty() -> Self {
        Self::user(0, 0, 0)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The sub-range `[offset, offset + len)` of this slice.
    pub fn sub(&self, offset: usize, len: usize) -> Self {
        Self {
            buffer: self.buffer,
            offset: self.offset + offset,
            len,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepKind {
    /// Transmit `src` to `peer`.
    Send { peer: Rank, src: Slice },
    /// Receive exactly `dst.len` bytes from `peer` into `dst`.
    Recv { peer: Rank, dst: Slice },
    /// Local byte copy.
    Copy { src: Slice, dst: Slice },
    /// `dst = op(dst, src)` element-wise.
    Combine {
        src: Slice,
        dst: Slice,
        count: usize,
        dtype: DataType,
        op: ReduceOp,
    },
    /// Pure dependency fence.
    NoOp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub kind: StepKind,
    /// Indices of steps that must complete before this one is issued.
    /// Always strictly smaller than this step's own index.
    pub deps: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Schedule {
    label: &'static str,
    steps: Vec<Step>,
    scratch: Vec<usize>,
    scratch_bytes: usize,
    scratch_limit: usize,
}

impl Schedule {
    /// Empty schedule. `label` names the operation in error reports.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            steps: Vec::new(),
            scratch: Vec::new(),
            scratch_bytes: 0,
            scratch_limit: usize::MAX,
        }
    }

    /// Cap the total scratch memory `add_scratch` may hand out.
    pub fn limit_scratch(&mut self, limit: usize) {
        self.scratch_limit = limit;
    }

    /// Reserve a scratch buffer of `len` bytes and return its index.
    pub fn add_scratch(&mut self, len: usize) -> Result<usize> {
        let requested = self.scratch_bytes.saturating_add(len);
        if requested > self.scratch_limit {
            return Err(CollError::ScratchLimitExceeded {
                requested,
                limit: self.scratch_limit,
            });
        }
        self.scratch_bytes = requested;
        self.scratch.push(len);
        Ok(self.scratch.len() - 1)
    }

    /// Append a step and return its index.
    pub fn push(&mut self, kind: StepKind, deps: &[usize]) -> Result<usize> {
        let step = self.steps.len();
        if let Some(&dep) = deps.iter().find(|&&d| d >= step) {
            return Err(CollError::DependencyCycle { step, dep });
        }

        match &kind {
            StepKind::Send { src: slice, .. } | StepKind::Recv { dst: slice, .. } => {
                self.check_slice(slice)?;
            }
            StepKind::Copy { src, dst } => {
                self.check_slice(src)?;
                self.check_slice(dst)?;
                check_lengths(step, src.len, dst.len)?;
            }
            StepKind::Combine {
                src,
                dst,
                count,
                dtype,
                ..
            } => {
                self.check_slice(src)?;
                self.check_slice(dst)?;
                check_lengths(step, src.len, dst.len)?;
                check_lengths(step, count * dtype.size_in_bytes(), dst.len)?;
            }
            StepKind::NoOp => {}
        }

        self.steps.push(Step {
            kind,
            deps: deps.to_vec(),
        });
        Ok(step)
    }

    fn check_slice(&self, slice: &Slice) -> Result<()> {
        let Buffer::Scratch(index) = slice.buffer else {
            return Ok(());
        };
        let size = self.scratch.get(index).copied().unwrap_or(0);
        let in_bounds = index < self.scratch.len()
            && slice
                .offset
                .checked_add(slice.len)
                .is_some_and(|end| end <= size);
        if !in_bounds {
            return Err(CollError::SliceOutOfBounds {
                index,
                offset: slice.offset,
                len: slice.len,
                size,
            });
        }
        Ok(())
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sizes in bytes of the scratch buffers, indexed by `Buffer::Scratch`.
    pub fn scratch_sizes(&self) -> &[usize] {
        &self.scratch
    }

    pub fn scratch_bytes(&self) -> usize {
        self.scratch_bytes
    }

    pub fn sends(&self) -> usize {
        self.count(|k| matches!(k, StepKind::Send { .. }))
    }

    pub fn recvs(&self) -> usize {
        self.count(|k| matches!(k, StepKind::Recv { .. }))
    }

    fn count(&self, pred: impl Fn(&StepKind) -> bool) -> usize {
        self.steps.iter().filter(|s| pred(&s.kind)).count()
    }
}

fn check_lengths(step: usize, src: usize, dst: usize) -> Result<()> {
    if src != dst {
        return Err(CollError::SliceLengthMismatch { step, src, dst });
    }
    Ok(())
}
