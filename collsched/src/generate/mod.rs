//! Schedule generators.
//!
//! A generator appends the steps one rank executes for one operation key to
//! an empty [`Schedule`]. Generators are pure: they read the key and the
//! group shape, never the transport, and a failure leaves the schedule to
//! be dropped by the caller.

mod dissem;
mod ring;

use crate::args::{OperationArgs, OperationKey};
use crate::error::Result;
use crate::schedule::Schedule;
use crate::types::Rank;

/// Position of the calling rank in its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupShape {
    pub rank: Rank,
    pub world: u32,
}

impl GroupShape {
    pub fn new(rank: Rank, world: u32) -> Self {
        Self { rank, world }
    }
}

/// Fill `sched` with the steps `shape.rank` runs for `key`.
///
/// Alltoall and broadcast use ring schedules; barrier, reduce and allreduce
/// use dissemination / binomial schedules.
pub fn generate(key: &OperationKey, shape: GroupShape, sched: &mut Schedule) -> Result<()> {
    match *key.args() {
        OperationArgs::Barrier => dissem::barrier(shape, sched)?,
        OperationArgs::Bcast {
            buf,
            count,
            dtype,
            root,
            segsize,
        } => ring::broadcast(
            shape,
            buf,
            count * dtype.size_in_bytes(),
            root,
            segsize,
            sched,
        )?,
        OperationArgs::Reduce {
            send,
            recv,
            count,
            dtype,
            op,
            root,
        } => dissem::reduce(shape, send, recv, count, dtype, op, root, sched)?,
        OperationArgs::Allreduce {
            send,
            recv,
            count,
            dtype,
            op,
        } => dissem::allreduce(shape, send, recv, count, dtype, op, sched)?,
        OperationArgs::Alltoall {
            send,
            send_count,
            send_type,
            recv,
            ..
        } => ring::alltoall(
            shape,
            send,
            recv,
            send_count * send_type.size_in_bytes(),
            sched,
        )?,
    }

    tracing::debug!(
        operation = key.kind().name(),
        rank = shape.rank,
        world = shape.world,
        steps = sched.len(),
        scratch_bytes = sched.scratch_bytes(),
        "generated schedule"
    );
    Ok(())
}

/// Integer ceiling of log2(n). Returns 0 for n <= 1.
pub(crate) fn ceil_log2(n: u32) -> u32 {
    if n <= 1 {
        return 0;
    }
    u32::BITS - (n - 1).leading_zeros()
}

/// Largest power of two not exceeding `n` (`n >= 1`).
pub(crate) fn floor_pow2(n: u32) -> u32 {
    if n.is_power_of_two() {
        n
    } else {
        n.next_power_of_two() >> 1
    }
}
