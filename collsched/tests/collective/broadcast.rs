use collsched::{DataType, GroupShape, OperationArgs, OperationKey, Schedule, generate};

use super::helpers::{communicators, drive_ok, run_collective, run_threads};

#[test]
fn test_broadcast_pair_count() {
    for world in 1..=6u32 {
        for (count, segsize) in [(10usize, 3usize), (12, 4), (12, 0), (7, 64), (1, 1)] {
            let (mut sends, mut recvs) = (0, 0);
            for rank in 0..world {
                let key = OperationKey::new(OperationArgs::Bcast {
                    buf: 0x1000,
                    count,
                    dtype: DataType::U8,
                    root: world / 2,
                    segsize,
                });
                let mut sched = Schedule::new("bcast");
                generate(&key, GroupShape::new(rank, world), &mut sched).unwrap();
                sends += sched.sends();
                recvs += sched.recvs();
            }
            let segments = if segsize == 0 { 1 } else { count.div_ceil(segsize) };
            let expected = segments * (world as usize - 1);
            assert_eq!(sends, expected, "world={world} count={count} seg={segsize}");
            assert_eq!(recvs, expected, "world={world} count={count} seg={segsize}");
        }
    }
}

#[test]
fn test_broadcast_segmented_every_root() {
    for world in 1..=6u32 {
        for root in 0..world {
            run_threads(world, move |mut comm| {
                let mut buf: Vec<u8> = if comm.rank() == root {
                    (0..10).map(|i| i * 7 + root as u8).collect()
                } else {
                    vec![0; 10]
                };
                unsafe {
                    comm.broadcast_segmented(buf.as_mut_ptr() as u64, 10, DataType::U8, root, 3)
                        .unwrap();
                }
                let expected: Vec<u8> = (0..10).map(|i| i * 7 + root as u8).collect();
                assert_eq!(buf, expected, "rank {} root {root}", comm.rank());
            });
        }
    }
}

#[test]
fn test_broadcast_default_segment_size() {
    run_threads(4, |mut comm| {
        let mut data: Vec<f32> = if comm.rank() == 2 {
            (0..1000).map(|i| i as f32 * 0.5).collect()
        } else {
            vec![0.0; 1000]
        };
        comm.broadcast_host(&mut data, 2).unwrap();
        let expected: Vec<f32> = (0..1000).map(|i| i as f32 * 0.5).collect();
        assert_eq!(data, expected);
    });
}

#[test]
fn test_broadcast_segment_size_from_config() {
    let (_fabric, mut comms) = communicators(3);
    for comm in &mut comms {
        comm.config_mut().bcast_segment_bytes = 8;
    }
    let mut bufs: Vec<Vec<u64>> = (0..3)
        .map(|r| if r == 0 { vec![11, 22, 33, 44, 55] } else { vec![0; 5] })
        .collect();
    let handles = comms
        .iter_mut()
        .zip(bufs.iter_mut())
        .map(|(comm, buf)| unsafe {
            comm.broadcast_nb(buf.as_mut_ptr() as u64, 5, DataType::U64, 0).unwrap()
        })
        .collect();
    drive_ok(&mut comms, handles);
    for buf in &bufs {
        assert_eq!(buf, &vec![11, 22, 33, 44, 55]);
    }
}

#[test]
fn test_broadcast_empty() {
    run_threads(3, |mut comm| {
        let mut empty: Vec<i32> = Vec::new();
        comm.broadcast_host(&mut empty, 1).unwrap();
    });
}

#[tokio::test]
async fn test_broadcast_async_nonzero_root() {
    run_collective(4, |mut comm| async move {
        let mut buf: Vec<i64> = if comm.rank() == 3 {
            vec![-1, 2, -3, 4]
        } else {
            vec![0; 4]
        };
        let handle = unsafe {
            comm.broadcast_segmented_nb(buf.as_mut_ptr() as u64, 4, DataType::I64, 3, 16)
                .unwrap()
        };
        comm.wait_async(handle).await.unwrap();
        assert_eq!(buf, vec![-1, 2, -3, 4]);
    })
    .await;
}
