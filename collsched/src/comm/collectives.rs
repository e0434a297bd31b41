use crate::comm::Communicator;
use crate::error::Result;
use crate::transport::Transport;
use crate::types::{DataType, Rank, ReduceOp};

impl<T: Transport> Communicator<T> {
    /// Block until every rank has entered the barrier.
    pub fn barrier(&mut self) -> Result<()> {
        let handle = self.barrier_nb()?;
        self.wait(handle)
    }

    /// Broadcast `count` elements at `ptr` from `root` to all ranks.
    ///
    /// # Safety
    /// `ptr` must point to at least `count * dtype.size_in_bytes()` bytes.
    pub unsafe fn broadcast(
        &mut self,
        ptr: u64,
        count: usize,
        dtype: DataType,
        root: Rank,
    ) -> Result<()> {
        let handle = unsafe { self.broadcast_nb(ptr, count, dtype, root)? };
        self.wait(handle)
    }

    /// Broadcast with an explicit pipeline segment size in bytes.
    ///
    /// # Safety
    /// `ptr` must point to at least `count * dtype.size_in_bytes()` bytes.
    pub unsafe fn broadcast_segmented(
        &mut self,
        ptr: u64,
        count: usize,
        dtype: DataType,
        root: Rank,
        segsize: usize,
    ) -> Result<()> {
        let handle = unsafe { self.broadcast_segmented_nb(ptr, count, dtype, root, segsize)? };
        self.wait(handle)
    }

    /// Reduce `count` elements from every rank into `recv_ptr` at `root`.
    /// `recv_ptr` is ignored on the other ranks.
    ///
    /// # Safety
    /// `send_ptr`, and `recv_ptr` at the root, must point to at least
    /// `count * dtype.size_in_bytes()` bytes.
    pub unsafe fn reduce(
        &mut self,
        send_ptr: u64,
        recv_ptr: u64,
        count: usize,
        dtype: DataType,
        op: ReduceOp,
        root: Rank,
    ) -> Result<()> {
        let handle = unsafe { self.reduce_nb(send_ptr, recv_ptr, count, dtype, op, root)? };
        self.wait(handle)
    }

    /// Reduce across all ranks; every rank receives the result.
    ///
    /// # Safety
    /// Both pointers must point to at least `count * dtype.size_in_bytes()` bytes.
    pub unsafe fn all_reduce(
        &mut self,
        send_ptr: u64,
        recv_ptr: u64,
        count: usize,
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<()> {
        let handle = unsafe { self.all_reduce_nb(send_ptr, recv_ptr, count, dtype, op)? };
        self.wait(handle)
    }

    /// Personalized exchange: chunk `i` of the send buffer ends up in chunk
    /// `rank` of rank `i`'s receive buffer.
    ///
    /// # Safety
    /// Both buffers must hold `world_size` chunks of their count and type.
    pub unsafe fn all_to_all(
        &mut self,
        send_ptr: u64,
        send_count: usize,
        send_type: DataType,
        recv_ptr: u64,
        recv_count: usize,
        recv_type: DataType,
    ) -> Result<()> {
        let handle = unsafe {
            self.all_to_all_nb(
                send_ptr, send_count, send_type, recv_ptr, recv_count, recv_type,
            )?
        };
        self.wait(handle)
    }
}
