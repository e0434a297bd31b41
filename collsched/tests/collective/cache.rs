use std::collections::HashSet;

use collsched::{CollError, DataType, ErrorClass, OperationArgs, OperationKey, ReduceOp};

use super::helpers::{Comm, communicators, drive, drive_ok};

fn launch_allreduce(comms: &mut [Comm], bufs: &mut [Vec<i32>], count: usize) {
    let handles = comms
        .iter_mut()
        .zip(bufs.iter_mut())
        .map(|(comm, buf)| unsafe {
            let ptr = buf.as_mut_ptr() as u64;
            comm.all_reduce_nb(ptr, ptr, count, DataType::I32, ReduceOp::Sum)
                .unwrap()
        })
        .collect();
    drive_ok(comms, handles);
}

#[test]
fn test_repeat_call_misses_then_hits() {
    let world = 5;
    let (_fabric, mut comms) = communicators(world);
    let mut bufs: Vec<Vec<i32>> = (0..world).map(|r| vec![r as i32; 6]).collect();

    launch_allreduce(&mut comms, &mut bufs, 6);
    assert!(bufs.iter().all(|b| b == &vec![10; 6]));

    // Same buffers, new contents: the cached schedule still computes afresh.
    for (r, buf) in bufs.iter_mut().enumerate() {
        buf.fill(r as i32 * 2);
    }
    launch_allreduce(&mut comms, &mut bufs, 6);
    assert!(bufs.iter().all(|b| b == &vec![20; 6]));

    for comm in &comms {
        let cache = comm.cache();
        assert_eq!((cache.misses(), cache.hits(), cache.len()), (1, 1, 1));
    }
}

#[test]
fn test_tags_unique_across_invocations() {
    let world = 3;
    let (_fabric, mut comms) = communicators(world);
    let mut bufs: Vec<Vec<i32>> = (0..world).map(|_| vec![1; 4]).collect();
    let mut seen: Vec<HashSet<u64>> = vec![HashSet::new(); world as usize];

    for i in 0..12 {
        let handles: Vec<_> = comms
            .iter_mut()
            .zip(bufs.iter_mut())
            .map(|(comm, buf)| unsafe {
                if i % 3 == 0 {
                    comm.barrier_nb().unwrap()
                } else {
                    // Alternate two counts so both hits and misses occur.
                    let count = if i % 2 == 0 { 4 } else { 2 };
                    let ptr = buf.as_mut_ptr() as u64;
                    comm.all_reduce_nb(ptr, ptr, count, DataType::I32, ReduceOp::Max)
                        .unwrap()
                }
            })
            .collect();
        for (rank, h) in handles.iter().enumerate() {
            assert!(seen[rank].insert(h.tag()), "tag {} reused", h.tag());
        }
        drive_ok(&mut comms, handles);
    }

    for (comm, tags) in comms.iter().zip(&seen) {
        assert_eq!(tags.len(), 12);
        assert!(comm.cache().hits() > 0 && comm.cache().misses() > 0);
    }
}

#[test]
fn test_argument_error_consumes_nothing() {
    let (_fabric, mut comms) = communicators(4);
    let comm = &mut comms[0];
    let before = comm.cache().peek_tag();

    let mut buf = [0u16; 4];
    let err = unsafe { comm.broadcast(buf.as_mut_ptr() as u64, 4, DataType::F16, 9) }.unwrap_err();
    assert!(matches!(err, CollError::InvalidRank { rank: 9, .. }));
    assert_eq!(err.class(), ErrorClass::Argument);

    let err = unsafe {
        comm.all_reduce(
            buf.as_ptr() as u64,
            buf.as_mut_ptr() as u64,
            4,
            DataType::BF16,
            ReduceOp::Sum,
        )
    }
    .unwrap_err();
    assert!(matches!(err, CollError::UnsupportedDType { .. }));

    assert!(comm.cache().is_empty());
    assert_eq!(comm.cache().peek_tag(), before);
    assert_eq!(comm.cache().misses(), 0);
}

#[test]
fn test_generation_failure_then_retry_misses() {
    let world = 4;
    let (_fabric, mut comms) = communicators(world);
    for comm in &mut comms {
        comm.config_mut().max_scratch_bytes = 8;
    }
    let sends: Vec<Vec<i64>> = (0..world).map(|r| vec![r as i64; 4]).collect();
    let mut recvs: Vec<Vec<i64>> = vec![vec![0; 4]; world as usize];
    let args: Vec<OperationArgs> = sends
        .iter()
        .zip(recvs.iter_mut())
        .map(|(s, r)| OperationArgs::Reduce {
            send: s.as_ptr() as u64,
            recv: r.as_mut_ptr() as u64,
            count: 4,
            dtype: DataType::I64,
            op: ReduceOp::Sum,
            root: 0,
        })
        .collect();

    let launch = |comm: &mut Comm, args: &OperationArgs| match *args {
        OperationArgs::Reduce {
            send,
            recv,
            count,
            dtype,
            op,
            root,
        } => unsafe { comm.reduce_nb(send, recv, count, dtype, op, root) },
        _ => unreachable!(),
    };

    for (comm, a) in comms.iter_mut().zip(&args) {
        let err = launch(comm, a).unwrap_err();
        assert!(matches!(err, CollError::ScratchLimitExceeded { limit: 8, .. }));
        assert!(!comm.cache().contains(&OperationKey::new(*a)));
        // The tag was drawn before generation failed.
        assert_eq!(comm.cache().peek_tag(), 2);
    }

    for comm in &mut comms {
        comm.config_mut().max_scratch_bytes = 1 << 20;
    }
    let handles = comms
        .iter_mut()
        .zip(&args)
        .map(|(comm, a)| launch(comm, a).unwrap())
        .collect();
    drive_ok(&mut comms, handles);

    for (comm, a) in comms.iter().zip(&args) {
        assert_eq!(comm.cache().misses(), 2);
        assert!(comm.cache().contains(&OperationKey::new(*a)));
    }
    assert_eq!(recvs[0], vec![6; 4]);
}

#[test]
fn test_recycled_address_hits_and_moved_buffer_misses() {
    let world = 3;
    let (_fabric, mut comms) = communicators(world);
    let mut bufs: Vec<Vec<i32>> = (0..world).map(|r| vec![r as i32 + 1; 4]).collect();
    launch_allreduce(&mut comms, &mut bufs, 4);

    // Logically unrelated data placed at the same addresses.
    for (r, buf) in bufs.iter_mut().enumerate() {
        buf.clear();
        buf.extend([100 * (r as i32 + 1); 4]);
    }
    launch_allreduce(&mut comms, &mut bufs, 4);
    assert!(bufs.iter().all(|b| b == &vec![600; 4]));
    assert!(comms.iter().all(|c| c.cache().hits() == 1));

    // Fresh allocations at new addresses force regeneration.
    let keep = bufs;
    let mut moved: Vec<Vec<i32>> = (0..world).map(|_| vec![1; 4]).collect();
    launch_allreduce(&mut comms, &mut moved, 4);
    assert!(moved.iter().all(|b| b == &vec![3; 4]));
    for comm in &comms {
        assert_eq!((comm.cache().misses(), comm.cache().len()), (2, 2));
    }
    drop(keep);
}

#[test]
fn test_failed_execution_keeps_schedule() {
    let (fabric, mut comms) = communicators(2);
    let handles = comms.iter_mut().map(|c| c.barrier_nb().unwrap()).collect();
    drive_ok(&mut comms, handles);

    fabric.disconnect(1).unwrap();
    let handle = comms[0].barrier_nb().unwrap();
    let results = drive(&mut comms[..1], vec![handle]);
    assert!(results[0].is_err());
    assert_eq!(comms[0].cache().len(), 1);
    assert_eq!(comms[0].cache().hits(), 1);
}
