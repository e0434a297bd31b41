use std::sync::Arc;

use crate::args::{OperationArgs, OperationKey};
use crate::cache::{Checkout, ScheduleCache};
use crate::comm::handle::{CollectiveGroup, CollectiveHandle};
use crate::config::CollConfig;
use crate::device::DeviceAdapter;
use crate::error::{CollError, Result};
use crate::generate::{GroupShape, generate};
use crate::progress::{Execution, Progress};
use crate::transport::Transport;
use crate::types::Rank;

/// A group of ranks running collectives over one transport.
///
/// Owns the schedule cache and tag counter for the group. Collectives are
/// issued and progressed through `&mut self`, so one communicator is driven
/// by one thread at a time; many non-blocking operations may be in flight.
pub struct Communicator<T: Transport> {
    comm_id: u64,
    transport: T,
    adapter: Arc<dyn DeviceAdapter>,
    cache: ScheduleCache,
    config: CollConfig,
}

impl<T: Transport> Communicator<T> {
    /// Communicator 0 with configuration read from the environment.
    pub fn new(transport: T, adapter: Arc<dyn DeviceAdapter>) -> Result<Self> {
        Self::with_config(0, transport, adapter, CollConfig::from_env())
    }

    /// Bind `transport` to `comm_id` and build a communicator on it.
    pub fn with_config(
        comm_id: u64,
        mut transport: T,
        adapter: Arc<dyn DeviceAdapter>,
        config: CollConfig,
    ) -> Result<Self> {
        transport.bind(comm_id)?;
        tracing::debug!(
            comm_id,
            rank = transport.rank(),
            world = transport.world_size(),
            "communicator bound"
        );
        Ok(Self {
            comm_id,
            transport,
            adapter,
            cache: ScheduleCache::new(config.initial_tag),
            config,
        })
    }

    pub fn rank(&self) -> Rank {
        self.transport.rank()
    }

    pub fn world_size(&self) -> u32 {
        self.transport.world_size()
    }

    pub fn comm_id(&self) -> u64 {
        self.comm_id
    }

    pub fn config(&self) -> &CollConfig {
        &self.config
    }

    /// Tuning changes apply to schedules generated afterwards.
    pub fn config_mut(&mut self) -> &mut CollConfig {
        &mut self.config
    }

    pub fn cache(&self) -> &ScheduleCache {
        &self.cache
    }

    /// Drop every cached schedule. Tags keep counting.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Validate, look up or generate the schedule, and start an execution.
    ///
    /// Validation runs before the cache is touched. A generation failure
    /// consumes the tag but leaves the cache without an entry for the key.
    pub(crate) fn launch(&mut self, args: OperationArgs) -> Result<CollectiveHandle> {
        let rank = self.rank();
        let world = self.world_size();
        args.validate(rank, world)?;

        let key = OperationKey::new(args);
        let operation = key.kind().name();
        let (tag, schedule) = match self.cache.get_or_create(&key) {
            Checkout::Hit { tag, schedule } => {
                tracing::debug!(operation, rank, tag, "schedule cache hit");
                (tag, schedule)
            }
            Checkout::Miss { tag, mut schedule } => {
                tracing::debug!(operation, rank, tag, "schedule cache miss");
                schedule.limit_scratch(self.config.max_scratch_bytes);
                generate(&key, GroupShape::new(rank, world), &mut schedule)?;
                (tag, self.cache.save(key, schedule))
            }
        };

        Ok(CollectiveHandle::new(
            key.kind(),
            self.comm_id,
            Execution::new(schedule, tag),
        ))
    }

    fn check_handle(&self, handle: &CollectiveHandle) -> Result<()> {
        if handle.comm_id() != self.comm_id {
            return Err(CollError::InvalidArgument {
                operation: handle.kind().name(),
                reason: format!(
                    "handle belongs to communicator {}, not {}",
                    handle.comm_id(),
                    self.comm_id
                ),
            });
        }
        Ok(())
    }

    /// Make one round of progress on `handle`. Returns `true` once finished.
    pub fn test(&mut self, handle: &mut CollectiveHandle) -> Result<bool> {
        self.check_handle(handle)?;
        if handle.is_finished() {
            return Ok(true);
        }
        // SAFETY: buffer validity was promised by the caller of the unsafe
        // entry point that created the handle.
        let progress = unsafe {
            handle
                .execution
                .advance(&mut self.transport, self.adapter.as_ref())?
        };
        Ok(progress == Progress::Completed)
    }

    /// Block the calling thread until `handle` finishes.
    pub fn wait(&mut self, mut handle: CollectiveHandle) -> Result<()> {
        self.check_handle(&handle)?;
        // SAFETY: see `test`.
        unsafe {
            handle.execution.wait(
                &mut self.transport,
                self.adapter.as_ref(),
                self.config.spin_before_yield,
            )
        }
    }

    /// Drive `handle` to completion, yielding to the tokio scheduler between
    /// progress scans.
    pub async fn wait_async(&mut self, mut handle: CollectiveHandle) -> Result<()> {
        while !self.test(&mut handle)? {
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    /// Give up on an unfinished collective and withdraw its posted sends
    /// and receives from the transport. Peers still running the same
    /// collective will not complete it.
    pub fn cancel(&mut self, mut handle: CollectiveHandle) -> Result<()> {
        self.check_handle(&handle)?;
        handle.execution.abandon(&mut self.transport);
        Ok(())
    }

    /// Wait for every collective in the group, progressing them together.
    ///
    /// Returns the first error encountered. Every handle is driven until it
    /// completes or fails regardless of errors on the others.
    pub fn wait_all(&mut self, group: CollectiveGroup) -> Result<()> {
        let mut pending = group.handles;
        for h in &pending {
            self.check_handle(h)?;
        }

        let mut first_err = None;
        let mut spins = 0u32;
        while !pending.is_empty() {
            pending.retain_mut(|h| match self.test(h) {
                Ok(done) => !done,
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                    false
                }
            });
            spins += 1;
            if spins >= self.config.spin_before_yield {
                spins = 0;
                std::thread::yield_now();
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<T: Transport> Drop for Communicator<T> {
    fn drop(&mut self) {
        self.transport.unbind();
    }
}

impl<T: Transport> std::fmt::Debug for Communicator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communicator")
            .field("comm_id", &self.comm_id)
            .field("rank", &self.rank())
            .field("world_size", &self.world_size())
            .field("cached_schedules", &self.cache.len())
            .finish()
    }
}
