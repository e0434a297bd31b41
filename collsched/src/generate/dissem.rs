//! Dissemination schedules: barrier, allreduce and rooted reduce.
//!
//! Non-power-of-two groups are handled by folding the ranks above the
//! largest power of two `p2` onto partners below it before the main rounds
//! and, for allreduce, returning the result to them afterwards.

use crate::error::Result;
use crate::generate::{GroupShape, ceil_log2, floor_pow2};
use crate::schedule::{Schedule, Slice, StepKind};
use crate::types::{DataType, Rank, ReduceOp};

/// Dissemination barrier: ⌈log2 N⌉ rounds of empty messages, rank `r`
/// signalling `r + 2^k` and waiting on `r - 2^k`.
pub(super) fn barrier(shape: GroupShape, sched: &mut Schedule) -> Result<()> {
    let n = shape.world;
    let r = shape.rank;

    let mut fence: Vec<usize> = Vec::new();
    for k in 0..ceil_log2(n) {
        let dist = 1 << k;
        let sent = sched.push(
            StepKind::Send {
                peer: (r + dist) % n,
                src: Slice::empty(),
            },
            &fence,
        )?;
        let received = sched.push(
            StepKind::Recv {
                peer: (r + n - dist) % n,
                dst: Slice::empty(),
            },
            &fence,
        )?;
        fence = vec![sched.push(StepKind::NoOp, &[sent, received])?];
    }
    Ok(())
}

/// Dissemination allreduce into `recv`. `send == recv` means in-place.
pub(super) fn allreduce(
    shape: GroupShape,
    send: u64,
    recv: u64,
    count: usize,
    dtype: DataType,
    op: ReduceOp,
    sched: &mut Schedule,
) -> Result<()> {
    let n = shape.world;
    let r = shape.rank;
    let bytes = count * dtype.size_in_bytes();
    let acc = Slice::user(recv, 0, bytes);

    let mut last: Vec<usize> = Vec::new();
    if send != recv {
        last.push(sched.push(
            StepKind::Copy {
                src: Slice::user(send, 0, bytes),
                dst: acc,
            },
            &[],
        )?);
    }
    if n == 1 {
        return Ok(());
    }

    let p2 = floor_pow2(n);
    let excess = n - p2;

    if r >= p2 {
        // Excess rank: hand the vector to the partner, get the result back.
        let partner = r - p2;
        let sent = sched.push(StepKind::Send { peer: partner, src: acc }, &last)?;
        sched.push(StepKind::Recv { peer: partner, dst: acc }, &[sent])?;
        return Ok(());
    }

    let tmp = Slice::scratch(sched.add_scratch(bytes)?, 0, bytes);
    let combine = |src| StepKind::Combine {
        src,
        dst: acc,
        count,
        dtype,
        op,
    };

    if r < excess {
        let received = sched.push(StepKind::Recv { peer: r + p2, dst: tmp }, &[])?;
        let mut deps = last.clone();
        deps.push(received);
        last = vec![sched.push(combine(tmp), &deps)?];
    }

    for k in 0..p2.trailing_zeros() {
        let dist = 1 << k;
        let sent = sched.push(
            StepKind::Send {
                peer: (r + dist) % p2,
                src: acc,
            },
            &last,
        )?;
        let received = sched.push(
            StepKind::Recv {
                peer: (r + p2 - dist) % p2,
                dst: tmp,
            },
            &last,
        )?;
        last = vec![sched.push(combine(tmp), &[sent, received])?];
    }

    if r < excess {
        sched.push(StepKind::Send { peer: r + p2, src: acc }, &last)?;
    }
    Ok(())
}

/// Binomial-tree reduce to `root`. Only the root's `recv` is written.
#[allow(clippy::too_many_arguments)]
pub(super) fn reduce(
    shape: GroupShape,
    send: u64,
    recv: u64,
    count: usize,
    dtype: DataType,
    op: ReduceOp,
    root: Rank,
    sched: &mut Schedule,
) -> Result<()> {
    let n = shape.world;
    let bytes = count * dtype.size_in_bytes();

    if n == 1 {
        if send != recv {
            sched.push(
                StepKind::Copy {
                    src: Slice::user(send, 0, bytes),
                    dst: Slice::user(recv, 0, bytes),
                },
                &[],
            )?;
        }
        return Ok(());
    }

    // Virtual rank 0 is the root.
    let vrank = (shape.rank + n - root) % n;
    let real = |v: u32| (v + root) % n;

    let acc = Slice::scratch(sched.add_scratch(bytes)?, 0, bytes);
    let seed = sched.push(
        StepKind::Copy {
            src: Slice::user(send, 0, bytes),
            dst: acc,
        },
        &[],
    )?;
    let mut last = vec![seed];

    let p2 = floor_pow2(n);
    let excess = n - p2;

    if vrank >= p2 {
        sched.push(
            StepKind::Send {
                peer: real(vrank - p2),
                src: acc,
            },
            &last,
        )?;
        return Ok(());
    }

    let mut tmp = None;
    let mut absorb = |sched: &mut Schedule, from: u32, last: &[usize]| -> Result<usize> {
        let tmp = match tmp {
            Some(t) => t,
            None => {
                let t = Slice::scratch(sched.add_scratch(bytes)?, 0, bytes);
                tmp = Some(t);
                t
            }
        };
        let received = sched.push(StepKind::Recv { peer: real(from), dst: tmp }, last)?;
        let mut deps = last.to_vec();
        deps.push(received);
        sched.push(
            StepKind::Combine {
                src: tmp,
                dst: acc,
                count,
                dtype,
                op,
            },
            &deps,
        )
    };

    if vrank < excess {
        last = vec![absorb(&mut *sched, vrank + p2, &last)?];
    }

    for k in 0..p2.trailing_zeros() {
        let mask = 1 << k;
        if vrank & mask != 0 {
            sched.push(
                StepKind::Send {
                    peer: real(vrank ^ mask),
                    src: acc,
                },
                &last,
            )?;
            return Ok(());
        }
        last = vec![absorb(&mut *sched, vrank | mask, &last)?];
    }

    // Only the root survives every round.
    sched.push(
        StepKind::Copy {
            src: acc,
            dst: Slice::user(recv, 0, bytes),
        },
        &last,
    )?;
    Ok(())
}
