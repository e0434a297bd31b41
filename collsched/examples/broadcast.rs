//! Pipelined ring broadcast from rank 2 to 4 ranks, one OS thread per rank.
//!
//! ```bash
//! COLLSCHED_BCAST_SEGMENT_BYTES=16 cargo run --example broadcast
//! ```

use collsched::{Communicator, CpuAdapter, DeviceAdapter, LocalFabric};
use std::sync::Arc;

fn main() -> collsched::Result<()> {
    tracing_subscriber::fmt::init();

    let root = 2u32;
    let fabric = LocalFabric::new(4);
    let adapter: Arc<dyn DeviceAdapter> = Arc::new(CpuAdapter::new());

    let threads: Vec<_> = fabric
        .endpoints()?
        .into_iter()
        .map(|endpoint| {
            let adapter = Arc::clone(&adapter);
            std::thread::spawn(move || -> collsched::Result<(u32, Vec<u32>)> {
                let mut comm = Communicator::new(endpoint, adapter)?;
                let mut data: Vec<u32> = if comm.rank() == root {
                    (0..16).collect()
                } else {
                    vec![0; 16]
                };
                comm.broadcast_host(&mut data, root)?;
                comm.barrier()?;
                Ok((comm.rank(), data))
            })
        })
        .collect();

    for t in threads {
        let (rank, data) = t
            .join()
            .map_err(|_| collsched::CollError::transport("rank thread panicked"))??;
        println!("rank {rank}: {data:?}");
    }
    Ok(())
}
