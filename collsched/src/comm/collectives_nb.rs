//! Non-blocking collectives. Each call validates its arguments, checks out
//! a schedule and returns a handle; no communication happens until the
//! handle is progressed.

use crate::args::OperationArgs;
use crate::comm::{CollectiveHandle, Communicator};
use crate::error::Result;
use crate::transport::Transport;
use crate::types::{DataType, Rank, ReduceOp};

impl<T: Transport> Communicator<T> {
    /// Non-blocking barrier.
    pub fn barrier_nb(&mut self) -> Result<CollectiveHandle> {
        self.launch(OperationArgs::Barrier)
    }

    /// Non-blocking broadcast, segmented by `config().bcast_segment_bytes`.
    ///
    /// # Safety
    /// `ptr` must point to `count` elements of `dtype` and remain valid
    /// until the handle completes or is dropped.
    pub unsafe fn broadcast_nb(
        &mut self,
        ptr: u64,
        count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<CollectiveHandle> {
        let segsize = self.config().bcast_segment_bytes;
        unsafe { self.broadcast_segmented_nb(ptr, count, dtype, root, segsize) }
    }

    /// Non-blocking broadcast with an explicit segment size in bytes.
    /// Zero sends the whole buffer as one segment.
    ///
    /// # Safety
    /// Same as [`broadcast_nb`](Self::broadcast_nb).
    pub unsafe fn broadcast_segmented_nb(
        &mut self,
        ptr: u64,
        count: usize,
        dtype: DataType,
        root: Rank,
        segsize: usize,
    ) -> Result<CollectiveHandle> {
        self.launch(OperationArgs::Bcast {
            buf: ptr,
            count,
            dtype,
            root,
            segsize,
        })
    }

    /// Non-blocking reduce to `root`.
    ///
    /// # Safety
    /// `send_ptr` (and `recv_ptr` at the root) must point to `count`
    /// elements of `dtype` and remain valid until the handle completes or
    /// is dropped.
    pub unsafe fn reduce_nb(
        &mut self,
        send_ptr: u64,
        recv_ptr: u64,
        count: usize,
        dtype: DataType,
        op: ReduceOp,
        root: Rank,
    ) -> Result<CollectiveHandle> {
        self.launch(OperationArgs::Reduce {
            send: send_ptr,
            recv: recv_ptr,
            count,
            dtype,
            op,
            root,
        })
    }

    /// Non-blocking allreduce. Pass the same pointer twice for in-place.
    ///
    /// # Safety
    /// Both pointers must point to `count` elements of `dtype` and remain
    /// valid until the handle completes or is dropped.
    pub unsafe fn all_reduce_nb(
        &mut self,
        send_ptr: u64,
        recv_ptr: u64,
        count: usize,
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<CollectiveHandle> {
        self.launch(OperationArgs::Allreduce {
            send: send_ptr,
            recv: recv_ptr,
            count,
            dtype,
            op,
        })
    }

    /// Non-blocking all-to-all. Chunk `i` of the send buffer goes to rank `i`.
    ///
    /// # Safety
    /// Both buffers must hold `world_size` chunks and remain valid until the
    /// handle completes or is dropped.
    pub unsafe fn all_to_all_nb(
        &mut self,
        send_ptr: u64,
        send_count: usize,
        send_type: DataType,
        recv_ptr: u64,
        recv_count: usize,
        recv_type: DataType,
    ) -> Result<CollectiveHandle> {
        self.launch(OperationArgs::Alltoall {
            send: send_ptr,
            send_count,
            send_type,
            recv: recv_ptr,
            recv_count,
            recv_type,
        })
    }
}
