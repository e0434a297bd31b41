//! Canonical, comparable signatures of collective calls.
//!
//! An [`OperationKey`] captures everything a generator needs to build a
//! schedule: the operation, its buffers (by raw address), counts, types,
//! operator and root. Equal keys describe the same communication pattern
//! against the same buffers, which is what licenses schedule reuse.
//!
//! Keys hold raw addresses. An allocator that hands a recycled address to a
//! logically unrelated call produces a cache hit; that is harmless because
//! the topology depends only on the key's fields. A buffer that moves forces
//! regeneration.

use crate::error::{CollError, Result};
use crate::types::{DataType, Rank, ReduceOp};

/// The collective operations the generators know how to schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationKind {
    Barrier = 0,
    Bcast = 1,
    Reduce = 2,
    Allreduce = 3,
    Alltoall = 4,
}

impl OperationKind {
    pub const fn name(self) -> &'static str {
        match self {
            OperationKind::Barrier => "barrier",
            OperationKind::Bcast => "bcast",
            OperationKind::Reduce => "reduce",
            OperationKind::Allreduce => "allreduce",
            OperationKind::Alltoall => "alltoall",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Arguments of one collective call, one variant per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationArgs {
    Barrier,
    Bcast {
        buf: u64,
        count: usize,
        dtype: DataType,
        root: Rank,
        segsize: usize,
    },
    Reduce {
        send: u64,
        recv: u64,
        count: usize,
        dtype: DataType,
        op: ReduceOp,
        root: Rank,
    },
    Allreduce {
        send: u64,
        recv: u64,
        count: usize,
        dtype: DataType,
        op: ReduceOp,
    },
    Alltoall {
        send: u64,
        send_count: usize,
        send_type: DataType,
        recv: u64,
        recv_count: usize,
        recv_type: DataType,
    },
}

impl OperationArgs {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationArgs::Barrier => OperationKind::Barrier,
            OperationArgs::Bcast { .. } => OperationKind::Bcast,
            OperationArgs::Reduce { .. } => OperationKind::Reduce,
            OperationArgs::Allreduce { .. } => OperationKind::Allreduce,
            OperationArgs::Alltoall { .. } => OperationKind::Alltoall,
        }
    }

    /// Check the arguments as seen from `rank` in a group of `world_size`.
    ///
    /// Runs before the cache is consulted, so a rejected call allocates no
    /// tag and leaves no schedule behind.
    pub fn validate(&self, rank: Rank, world_size: u32) -> Result<()> {
        let operation = self.kind().name();
        match *self {
            OperationArgs::Barrier => Ok(()),
            OperationArgs::Bcast {
                buf,
                count,
                dtype,
                root,
                ..
            } => {
                check_root(root, world_size)?;
                let bytes = payload_bytes(count, dtype, operation)?;
                check_address(buf, bytes, operation, "buffer")
            }
            OperationArgs::Reduce {
                send,
                recv,
                count,
                dtype,
                root,
                ..
            } => {
                check_root(root, world_size)?;
                check_reducible(dtype, operation)?;
                let bytes = payload_bytes(count, dtype, operation)?;
                check_address(send, bytes, operation, "send buffer")?;
                if rank == root {
                    check_address(recv, bytes, operation, "receive buffer")?;
                }
                Ok(())
            }
            OperationArgs::Allreduce {
                send,
                recv,
                count,
                dtype,
                ..
            } => {
                check_reducible(dtype, operation)?;
                let bytes = payload_bytes(count, dtype, operation)?;
                check_address(send, bytes, operation, "send buffer")?;
                check_address(recv, bytes, operation, "receive buffer")
            }
            OperationArgs::Alltoall {
                send,
                send_count,
                send_type,
                recv,
                recv_count,
                recv_type,
            } => {
                let send_chunk = payload_bytes(send_count, send_type, operation)?;
                let recv_chunk = payload_bytes(recv_count, recv_type, operation)?;
                if send_chunk != recv_chunk {
                    return Err(CollError::BufferSizeMismatch {
                        expected: send_chunk,
                        actual: recv_chunk,
                    });
                }
                let total = send_chunk.checked_mul(world_size as usize).ok_or_else(|| {
                    CollError::InvalidArgument {
                        operation,
                        reason: format!("{send_chunk} bytes x {world_size} ranks overflows"),
                    }
                })?;
                check_address(send, total, operation, "send buffer")?;
                check_address(recv, total, operation, "receive buffer")
            }
        }
    }
}

fn check_root(root: Rank, world_size: u32) -> Result<()> {
    if root >= world_size {
        return Err(CollError::InvalidRank {
            rank: root,
            world_size,
        });
    }
    Ok(())
}

fn check_reducible(dtype: DataType, op: &'static str) -> Result<()> {
    if !dtype.is_reducible() {
        return Err(CollError::UnsupportedDType { dtype, op });
    }
    Ok(())
}

fn payload_bytes(count: usize, dtype: DataType, operation: &'static str) -> Result<usize> {
    count
        .checked_mul(dtype.size_in_bytes())
        .ok_or_else(|| CollError::InvalidArgument {
            operation,
            reason: format!("{count} elements of {dtype} overflows"),
        })
}

fn check_address(ptr: u64, bytes: usize, operation: &'static str, what: &str) -> Result<()> {
    if ptr == 0 && bytes > 0 {
        return Err(CollError::InvalidArgument {
            operation,
            reason: format!("null {what} for a {bytes}-byte payload"),
        });
    }
    Ok(())
}

/// Cache key: the arguments of a call, compared and hashed field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationKey {
    args: OperationArgs,
}

impl OperationKey {
    pub fn new(args: OperationArgs) -> Self {
        Self { args }
    }

    pub fn args(&self) -> &OperationArgs {
        &self.args
    }

    pub fn kind(&self) -> OperationKind {
        self.args.kind()
    }

    /// Size in bytes of [`encode`](Self::encode)'s output. Depends on the variant.
    pub fn encoded_len(&self) -> usize {
        const KIND: usize = 1;
        const ADDR: usize = 8;
        const COUNT: usize = 8;
        const DTYPE: usize = 1;
        const OP: usize = 1;
        const RANK: usize = 4;
        KIND + match self.args {
            OperationArgs::Barrier => 0,
            OperationArgs::Bcast { .. } => ADDR + COUNT + DTYPE + RANK + COUNT,
            OperationArgs::Reduce { .. } => 2 * ADDR + COUNT + DTYPE + OP + RANK,
            OperationArgs::Allreduce { .. } => 2 * ADDR + COUNT + DTYPE + OP,
            OperationArgs::Alltoall { .. } => 2 * (ADDR + COUNT + DTYPE),
        }
    }

    /// Flat little-endian image of the key: the kind byte followed by the
    /// active variant's fields in declaration order.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(self.kind() as u8);
        match self.args {
            OperationArgs::Barrier => {}
            OperationArgs::Bcast {
                buf,
                count,
                dtype,
                root,
                segsize,
            } => {
                out.extend_from_slice(&buf.to_le_bytes());
                out.extend_from_slice(&(count as u64).to_le_bytes());
                out.push(dtype as u8);
                out.extend_from_slice(&root.to_le_bytes());
                out.extend_from_slice(&(segsize as u64).to_le_bytes());
            }
            OperationArgs::Reduce {
                send,
                recv,
                count,
                dtype,
                op,
                root,
            } => {
                out.extend_from_slice(&send.to_le_bytes());
                out.extend_from_slice(&recv.to_le_bytes());
                out.extend_from_slice(&(count as u64).to_le_bytes());
                out.push(dtype as u8);
                out.push(op.id());
                out.extend_from_slice(&root.to_le_bytes());
            }
            OperationArgs::Allreduce {
                send,
                recv,
                count,
                dtype,
                op,
            } => {
                out.extend_from_slice(&send.to_le_bytes());
                out.extend_from_slice(&recv.to_le_bytes());
                out.extend_from_slice(&(count as u64).to_le_bytes());
                out.push(dtype as u8);
                out.push(op.id());
            }
            OperationArgs::Alltoall {
                send,
                send_count,
                send_type,
                recv,
                recv_count,
                recv_type,
            } => {
                out.extend_from_slice(&send.to_le_bytes());
                out.extend_from_slice(&(send_count as u64).to_le_bytes());
                out.push(send_type as u8);
                out.extend_from_slice(&recv.to_le_bytes());
                out.extend_from_slice(&(recv_count as u64).to_le_bytes());
                out.push(recv_type as u8);
            }
        }
        out
    }
}

impl From<OperationArgs> for OperationKey {
    fn from(args: OperationArgs) -> Self {
        Self::new(args)
    }
}
