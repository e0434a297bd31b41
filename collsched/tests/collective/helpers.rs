use collsched::{
    CollConfig, CollectiveHandle, Communicator, CpuAdapter, DeviceAdapter, LocalEndpoint,
    LocalFabric, Result,
};
use std::sync::Arc;

pub type Comm = Communicator<LocalEndpoint>;

/// Rounds the round-robin driver runs before declaring a hang.
const MAX_ROUNDS: usize = 10_000;

/// One communicator per rank over a fresh in-memory fabric.
pub fn communicators(world_size: u32) -> (LocalFabric, Vec<Comm>) {
    communicators_with(world_size, CollConfig::default())
}

pub fn communicators_with(world_size: u32, config: CollConfig) -> (LocalFabric, Vec<Comm>) {
    let fabric = LocalFabric::new(world_size);
    let adapter: Arc<dyn DeviceAdapter> = Arc::new(CpuAdapter::new());
    let comms = fabric
        .endpoints()
        .unwrap()
        .into_iter()
        .map(|ep| Communicator::with_config(0, ep, Arc::clone(&adapter), config.clone()).unwrap())
        .collect();
    (fabric, comms)
}

/// Helper: run a collective on every rank in its own tokio task.
/// Bodies must progress through `wait_async` so tasks can interleave.
pub async fn run_collective<F, Fut>(world_size: u32, f: F)
where
    F: Fn(Comm) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let (_fabric, comms) = communicators(world_size);
    let f = Arc::new(f);
    let mut handles = Vec::new();
    for comm in comms {
        let f = Arc::clone(&f);
        handles.push(tokio::spawn(async move { f(comm).await }));
    }
    for result in futures::future::join_all(handles).await {
        result.unwrap();
    }
}

/// Helper: run a collective on every rank in its own OS thread, using the
/// blocking API. Panics in any rank fail the test.
pub fn run_threads<F>(world_size: u32, f: F)
where
    F: Fn(Comm) + Send + Sync + 'static,
{
    let (_fabric, comms) = communicators(world_size);
    let f = Arc::new(f);
    let threads: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            let f = Arc::clone(&f);
            std::thread::spawn(move || f(comm))
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
}

/// Progress one handle per rank from a single thread, rank by rank, until
/// every handle has finished or failed.
pub fn drive(comms: &mut [Comm], handles: Vec<CollectiveHandle>) -> Vec<Result<()>> {
    assert_eq!(comms.len(), handles.len());
    let mut slots: Vec<Option<CollectiveHandle>> = handles.into_iter().map(Some).collect();
    let mut results: Vec<Option<Result<()>>> = (0..comms.len()).map(|_| None).collect();

    for _ in 0..MAX_ROUNDS {
        for (rank, comm) in comms.iter_mut().enumerate() {
            let Some(handle) = slots[rank].as_mut() else {
                continue;
            };
            match comm.test(handle) {
                Ok(false) => {}
                Ok(true) => {
                    slots[rank] = None;
                    results[rank] = Some(Ok(()));
                }
                Err(e) => {
                    slots[rank] = None;
                    results[rank] = Some(Err(e));
                }
            }
        }
        if slots.iter().all(Option::is_none) {
            return results.into_iter().map(|r| r.unwrap()).collect();
        }
    }
    panic!("collective did not finish within {MAX_ROUNDS} rounds");
}

/// Like [`drive`], but every rank must succeed.
pub fn drive_ok(comms: &mut [Comm], handles: Vec<CollectiveHandle>) {
    for (rank, result) in drive(comms, handles).into_iter().enumerate() {
        if let Err(e) = result {
            panic!("rank {rank} failed: {e}");
        }
    }
}
