use super::helpers::{communicators, drive_ok, run_collective, run_threads};

fn ceil_log2(n: u32) -> u64 {
    if n <= 1 { 0 } else { u64::from(u32::BITS - (n - 1).leading_zeros()) }
}

#[tokio::test]
async fn test_barrier_4_nodes() {
    run_collective(4, |mut comm| async move {
        let h = comm.barrier_nb().unwrap();
        comm.wait_async(h).await.unwrap();
    })
    .await;
}

#[tokio::test]
async fn test_barrier_5_nodes_dissemination() {
    run_collective(5, |mut comm| async move {
        let h = comm.barrier_nb().unwrap();
        comm.wait_async(h).await.unwrap();
    })
    .await;
}

#[test]
fn test_barrier_2_nodes_double() {
    run_threads(2, |mut comm| {
        comm.barrier().unwrap();
        comm.barrier().unwrap();
    });
}

#[test]
fn test_barrier_sends_per_rank() {
    for world in 1..=9u32 {
        let (fabric, mut comms) = communicators(world);
        let handles = comms.iter_mut().map(|c| c.barrier_nb().unwrap()).collect();
        drive_ok(&mut comms, handles);
        for rank in 0..world {
            assert_eq!(
                fabric.delivered_from(rank).unwrap(),
                ceil_log2(world),
                "rank {rank}/{world}"
            );
        }
    }
}

#[test]
fn test_barrier_waits_for_late_rank() {
    for world in [2u32, 3, 5, 8] {
        let late = world - 1;
        let (fabric, mut comms) = communicators(world);
        fabric.pause(late).unwrap();

        let mut handles: Vec<_> = comms.iter_mut().map(|c| c.barrier_nb().unwrap()).collect();
        for _ in 0..50 {
            for (comm, handle) in comms.iter_mut().zip(handles.iter_mut()) {
                let done = comm.test(handle).unwrap();
                // The late rank may finish once it has heard from everyone.
                if comm.rank() != late {
                    assert!(!done, "rank {} left early", comm.rank());
                }
            }
        }
        assert_eq!(fabric.delivered_from(late).unwrap(), 0);

        fabric.resume(late).unwrap();
        drive_ok(&mut comms, handles);
    }
}

#[test]
fn test_barrier_schedule_reused() {
    let (_fabric, mut comms) = communicators(3);
    for _ in 0..3 {
        let handles = comms.iter_mut().map(|c| c.barrier_nb().unwrap()).collect();
        drive_ok(&mut comms, handles);
    }
    for comm in &comms {
        assert_eq!(comm.cache().len(), 1);
        assert_eq!((comm.cache().misses(), comm.cache().hits()), (1, 2));
    }
}

#[test]
fn test_barrier_waits_for_absent_rank() {
    for world in [2u32, 4, 7] {
        let absent = world / 2;
        let (_fabric, mut comms) = communicators(world);

        let mut early: Vec<_> = comms
            .iter_mut()
            .filter(|c| c.rank() != absent)
            .map(|c| (c.rank(), c.barrier_nb().unwrap()))
            .collect();
        for _ in 0..50 {
            for (rank, handle) in early.iter_mut() {
                let comm = &mut comms[*rank as usize];
                assert!(!comm.test(handle).unwrap(), "rank {rank} passed an incomplete barrier");
            }
        }

        let mut handles: Vec<Option<_>> = (0..world).map(|_| None).collect();
        for (rank, handle) in early {
            handles[rank as usize] = Some(handle);
        }
        handles[absent as usize] = Some(comms[absent as usize].barrier_nb().unwrap());
        let handles = handles.into_iter().map(Option::unwrap).collect();
        drive_ok(&mut comms, handles);
    }
}
