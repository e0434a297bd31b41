//! Ring schedules: store-and-forward alltoall and pipelined broadcast.

use crate::error::Result;
use crate::generate::GroupShape;
use crate::schedule::{Schedule, Slice, StepKind};
use crate::types::Rank;

/// Ring alltoall.
///
/// Each rank packs the chunks for its successors into one bundle and sends
/// it around the ring. At every hop the receiver peels off the leading
/// chunk (its own) and forwards the rest, so step `i` moves `N-1-i` chunks.
/// Sends to the successor are chained to leave in order; receives are all
/// posted up front, each into its own inbox.
pub(super) fn alltoall(
    shape: GroupShape,
    send: u64,
    recv: u64,
    chunk: usize,
    sched: &mut Schedule,
) -> Result<()> {
    let n = shape.world as usize;
    let r = shape.rank as usize;

    sched.push(
        StepKind::Copy {
            src: Slice::user(send, r * chunk, chunk),
            dst: Slice::user(recv, r * chunk, chunk),
        },
        &[],
    )?;
    if n == 1 {
        return Ok(());
    }

    let next = ((r + 1) % n) as Rank;
    let prev = ((r + n - 1) % n) as Rank;

    // Forward buffer: chunks for r+1 .. N-1, then 0 .. r-1.
    let forward = sched.add_scratch((n - 1) * chunk)?;
    let tail = n - 1 - r;
    let mut seeds = Vec::with_capacity(2);
    if tail > 0 {
        seeds.push(sched.push(
            StepKind::Copy {
                src: Slice::user(send, (r + 1) * chunk, tail * chunk),
                dst: Slice::scratch(forward, 0, tail * chunk),
            },
            &[],
        )?);
    }
    if r > 0 {
        seeds.push(sched.push(
            StepKind::Copy {
                src: Slice::user(send, 0, r * chunk),
                dst: Slice::scratch(forward, tail * chunk, r * chunk),
            },
            &[],
        )?);
    }

    let mut outgoing = Slice::scratch(forward, 0, (n - 1) * chunk);
    let mut ready = seeds;
    let mut last_send = None;
    for i in 0..n - 1 {
        let width = (n - 1 - i) * chunk;

        let mut deps = ready.clone();
        deps.extend(last_send);
        last_send = Some(sched.push(
            StepKind::Send {
                peer: next,
                src: outgoing,
            },
            &deps,
        )?);

        let inbox = Slice::scratch(sched.add_scratch(width)?, 0, width);
        let received = sched.push(
            StepKind::Recv {
                peer: prev,
                dst: inbox,
            },
            &[],
        )?;

        let origin = (r + n - i - 1) % n;
        sched.push(
            StepKind::Copy {
                src: inbox.sub(0, chunk),
                dst: Slice::user(recv, origin * chunk, chunk),
            },
            &[received],
        )?;

        outgoing = inbox.sub(chunk, width - chunk);
        ready = vec![received];
    }
    Ok(())
}

/// Pipelined ring broadcast of `bytes` bytes at `buf`.
///
/// The buffer is cut into `segsize` segments (`0` means one segment).
/// Ranks are arranged in a ring starting at `root`; every non-root rank
/// receives each segment from its predecessor directly into `buf`, and
/// every rank except the last forwards it to its successor as soon as it
/// has arrived.
pub(super) fn broadcast(
    shape: GroupShape,
    buf: u64,
    bytes: usize,
    root: Rank,
    segsize: usize,
    sched: &mut Schedule,
) -> Result<()> {
    let n = shape.world;
    if n == 1 || bytes == 0 {
        return Ok(());
    }

    let seg = if segsize == 0 {
        bytes
    } else {
        segsize.min(bytes)
    };
    let whole = Slice::user(buf, 0, bytes);
    let segments: Vec<Slice> = (0..bytes.div_ceil(seg))
        .map(|k| {
            let offset = k * seg;
            whole.sub(offset, seg.min(bytes - offset))
        })
        .collect();

    let logical = (shape.rank + n - root) % n;
    let prev = (shape.rank + n - 1) % n;
    let next = (shape.rank + 1) % n;

    let mut received = Vec::with_capacity(segments.len());
    if logical > 0 {
        for &dst in &segments {
            received.push(sched.push(StepKind::Recv { peer: prev, dst }, &[])?);
        }
    }

    if logical < n - 1 {
        let mut last_send = None;
        for (k, &src) in segments.iter().enumerate() {
            let mut deps: Vec<usize> = received.get(k).copied().into_iter().collect();
            deps.extend(last_send);
            last_send = Some(sched.push(StepKind::Send { peer: next, src }, &deps)?);
        }
    }
    Ok(())
}
