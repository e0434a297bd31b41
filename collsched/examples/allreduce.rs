//! Dissemination allreduce across 5 ranks, one tokio task per rank.
//!
//! Each rank starts with its own data. After allreduce(Sum), every rank holds
//! the element-wise sum of all inputs. The second round reuses the cached
//! schedule; run with `RUST_LOG=collsched=debug` to see the cache hit.
//!
//! ```bash
//! RUST_LOG=collsched=debug cargo run --example allreduce
//! ```

use collsched::{Communicator, CpuAdapter, DataType, DeviceAdapter, LocalFabric, ReduceOp};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> collsched::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let world_size = 5u32;
    let count = 8usize;
    let fabric = LocalFabric::new(world_size);
    let adapter: Arc<dyn DeviceAdapter> = Arc::new(CpuAdapter::new());

    let mut handles = Vec::new();
    for endpoint in fabric.endpoints()? {
        let mut comm = Communicator::new(endpoint, Arc::clone(&adapter))?;
        handles.push(tokio::spawn(async move {
            let rank = comm.rank();
            // rank 0: [0.0, 0.0, ...], rank 1: [1.0, 1.0, ...], etc.
            let mut data = vec![rank as f32; count];
            let ptr = data.as_mut_ptr() as u64;

            for _ in 0..2 {
                let handle =
                    unsafe { comm.all_reduce_nb(ptr, ptr, count, DataType::F32, ReduceOp::Sum)? };
                comm.wait_async(handle).await?;
            }
            // Two rounds of Sum: 5 * (0 + 1 + 2 + 3 + 4) = 50.0
            collsched::Result::Ok((rank, data, comm.cache().hits()))
        }));
    }

    for h in handles {
        let (rank, data, hits) = h.await.map_err(|e| {
            collsched::CollError::transport_with_source("rank task failed", e)
        })??;
        println!("rank {rank}: {data:?} (cache hits: {hits})");
    }
    Ok(())
}
