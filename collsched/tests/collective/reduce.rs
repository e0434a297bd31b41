use collsched::{DataType, ReduceOp};

use super::allreduce::{OPS, reference, value};
use super::helpers::{communicators, drive_ok, run_collective};

const SENTINEL: i64 = i64::MIN + 7;

#[test]
fn test_reduce_every_root_and_op() {
    for world in 1..=9u32 {
        for root in 0..world {
            for op in OPS {
                let (_fabric, mut comms) = communicators(world);
                let sends: Vec<Vec<i64>> = (0..world)
                    .map(|r| (0..4).map(|j| value(r, j)).collect())
                    .collect();
                let mut recvs = vec![vec![SENTINEL; 4]; world as usize];

                let handles = comms
                    .iter_mut()
                    .zip(sends.iter().zip(recvs.iter_mut()))
                    .map(|(comm, (send, recv))| unsafe {
                        comm.reduce_nb(
                            send.as_ptr() as u64,
                            recv.as_mut_ptr() as u64,
                            4,
                            DataType::I64,
                            op,
                            root,
                        )
                        .unwrap()
                    })
                    .collect();
                drive_ok(&mut comms, handles);

                for (rank, recv) in recvs.iter().enumerate() {
                    if rank as u32 == root {
                        let expected = reference(world, 4, op);
                        assert_eq!(recv, &expected, "world {world} root {root} {op}");
                    } else {
                        assert_eq!(recv, &vec![SENTINEL; 4], "non-root {rank} was written");
                    }
                }
            }
        }
    }
}

#[test]
fn test_reduce_non_root_null_recv() {
    let (_fabric, mut comms) = communicators(3);
    let sends: Vec<Vec<u32>> = (0..3).map(|r| vec![r + 1; 2]).collect();
    let mut root_recv = vec![0u32; 2];
    let handles = comms
        .iter_mut()
        .zip(&sends)
        .map(|(comm, send)| {
            let recv = if comm.rank() == 1 {
                root_recv.as_mut_ptr() as u64
            } else {
                0
            };
            unsafe {
                comm.reduce_nb(send.as_ptr() as u64, recv, 2, DataType::U32, ReduceOp::Prod, 1)
                    .unwrap()
            }
        })
        .collect();
    drive_ok(&mut comms, handles);
    assert_eq!(root_recv, vec![6, 6]);
}

#[tokio::test]
async fn test_reduce_3_nodes_nonzero_root() {
    run_collective(3, |mut comm| async move {
        let rank = comm.rank();
        let send = vec![(rank + 1) as f32; 4];
        let mut recv = vec![0.0f32; 4];
        let handle = unsafe {
            comm.reduce_nb(
                send.as_ptr() as u64,
                recv.as_mut_ptr() as u64,
                4,
                DataType::F32,
                ReduceOp::Sum,
                2,
            )
            .unwrap()
        };
        comm.wait_async(handle).await.unwrap();
        if rank == 2 {
            assert_eq!(recv, vec![6.0f32; 4], "root reduce failed");
        }
    })
    .await;
}

#[test]
fn test_reduce_host_single_rank() {
    let (_fabric, mut comms) = communicators(1);
    let mut out = [0i8; 3];
    comms[0].reduce_host(&[1i8, -2, 3], &mut out, ReduceOp::Min, 0).unwrap();
    assert_eq!(out, [1, -2, 3]);
}
