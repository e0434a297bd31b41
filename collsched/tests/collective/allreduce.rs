use collsched::{DataType, ReduceOp};

use super::helpers::{communicators, drive_ok, run_collective, run_threads};

pub const OPS: [ReduceOp; 4] = [ReduceOp::Sum, ReduceOp::Prod, ReduceOp::Min, ReduceOp::Max];

/// Element `j` contributed by `rank`.
pub fn value(rank: u32, j: usize) -> i64 {
    (rank as i64 + 1) * (j as i64 + 1) - 2 * (rank as i64 % 3)
}

pub fn apply(op: ReduceOp, a: i64, b: i64) -> i64 {
    match op {
        ReduceOp::Sum => a.wrapping_add(b),
        ReduceOp::Prod => a.wrapping_mul(b),
        ReduceOp::Min => a.min(b),
        ReduceOp::Max => a.max(b),
    }
}

/// Sequential reference reduction over ranks `0..world`.
pub fn reference(world: u32, count: usize, op: ReduceOp) -> Vec<i64> {
    (0..count)
        .map(|j| {
            (1..world).fold(value(0, j), |acc, r| apply(op, acc, value(r, j)))
        })
        .collect()
}

#[test]
fn test_allreduce_matches_reference() {
    for world in 1..=9u32 {
        for op in OPS {
            run_threads(world, move |mut comm| {
                let send: Vec<i64> = (0..5).map(|j| value(comm.rank(), j)).collect();
                let mut recv = vec![0i64; 5];
                comm.all_reduce_host(&send, &mut recv, op).unwrap();
                let rank = comm.rank();
                assert_eq!(recv, reference(world, 5, op), "rank {rank} world {world} {op}");
            });
        }
    }
}

#[test]
fn test_allreduce_in_place_round_robin() {
    for world in [3u32, 6, 7] {
        let (_fabric, mut comms) = communicators(world);
        let mut bufs: Vec<Vec<f32>> = (0..world).map(|r| vec![(r + 1) as f32; 8]).collect();
        let handles = comms
            .iter_mut()
            .zip(bufs.iter_mut())
            .map(|(comm, buf)| unsafe {
                let ptr = buf.as_mut_ptr() as u64;
                comm.all_reduce_nb(ptr, ptr, 8, DataType::F32, ReduceOp::Sum).unwrap()
            })
            .collect();
        drive_ok(&mut comms, handles);

        let total = (world * (world + 1) / 2) as f32;
        for buf in &bufs {
            assert_eq!(buf, &vec![total; 8]);
        }
    }
}

#[test]
fn test_allreduce_send_buffer_untouched() {
    run_threads(5, |mut comm| {
        let send = vec![comm.rank() as u32; 3];
        let mut recv = vec![0u32; 3];
        comm.all_reduce_host(&send, &mut recv, ReduceOp::Max).unwrap();
        assert_eq!(recv, vec![4; 3]);
        assert_eq!(send, vec![comm.rank() as u32; 3]);
    });
}

#[test]
fn test_allreduce_empty() {
    run_threads(4, |mut comm| {
        let mut recv: Vec<f64> = Vec::new();
        comm.all_reduce_host(&[], &mut recv, ReduceOp::Sum).unwrap();
    });
}

#[tokio::test]
async fn test_allreduce_async_6_nodes() {
    run_collective(6, |mut comm| async move {
        let send: Vec<f64> = vec![(comm.rank() + 1) as f64; 4];
        let mut recv = vec![0.0f64; 4];
        let handle = unsafe {
            comm.all_reduce_nb(
                send.as_ptr() as u64,
                recv.as_mut_ptr() as u64,
                4,
                DataType::F64,
                ReduceOp::Sum,
            )
            .unwrap()
        };
        comm.wait_async(handle).await.unwrap();
        assert_eq!(recv, vec![21.0; 4]);
    })
    .await;
}
