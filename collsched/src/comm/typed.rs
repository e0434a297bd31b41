//! Safe slice wrappers for the blocking collectives.
//!
//! The element type fixes the [`DataType`] and the slices fix the counts,
//! so these methods need no `unsafe`: every blocking call finishes touching
//! the buffers before it returns.

use crate::comm::Communicator;
use crate::error::{CollError, Result};
use crate::transport::Transport;
use crate::types::{DataType, Rank, ReduceOp};

mod private {
    pub trait Sealed {}
}

/// Element types with a matching [`DataType`].
pub trait Element: private::Sealed + Copy + Send + Sync + 'static {
    const DTYPE: DataType;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl private::Sealed for $ty {}
            impl Element for $ty {
                const DTYPE: DataType = DataType::$dtype;
            }
        )*
    };
}

impl_element!(
    f32 => F32,
    f64 => F64,
    i8 => I8,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u32 => U32,
    u64 => U64,
);

fn same_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(CollError::BufferSizeMismatch { expected, actual });
    }
    Ok(())
}

impl<T: Transport> Communicator<T> {
    /// Broadcast `buf` from `root`.
    pub fn broadcast_host<E: Element>(&mut self, buf: &mut [E], root: Rank) -> Result<()> {
        unsafe { self.broadcast(buf.as_mut_ptr() as u64, buf.len(), E::DTYPE, root) }
    }

    /// Reduce into `recv` at `root`. Other ranks may pass an empty `recv`.
    pub fn reduce_host<E: Element>(
        &mut self,
        send: &[E],
        recv: &mut [E],
        op: ReduceOp,
        root: Rank,
    ) -> Result<()> {
        if self.rank() == root {
            same_len(send.len(), recv.len())?;
        }
        unsafe {
            self.reduce(
                send.as_ptr() as u64,
                recv.as_mut_ptr() as u64,
                send.len(),
                E::DTYPE,
                op,
                root,
            )
        }
    }

    /// Allreduce `send` into `recv`.
    pub fn all_reduce_host<E: Element>(
        &mut self,
        send: &[E],
        recv: &mut [E],
        op: ReduceOp,
    ) -> Result<()> {
        same_len(send.len(), recv.len())?;
        unsafe {
            self.all_reduce(
                send.as_ptr() as u64,
                recv.as_mut_ptr() as u64,
                send.len(),
                E::DTYPE,
                op,
            )
        }
    }

    /// Allreduce `buf` in place.
    pub fn all_reduce_in_place_host<E: Element>(
        &mut self,
        buf: &mut [E],
        op: ReduceOp,
    ) -> Result<()> {
        let ptr = buf.as_mut_ptr() as u64;
        unsafe { self.all_reduce(ptr, ptr, buf.len(), E::DTYPE, op) }
    }

    /// All-to-all: both slices hold `world_size` equal chunks.
    pub fn all_to_all_host<E: Element>(&mut self, send: &[E], recv: &mut [E]) -> Result<()> {
        same_len(send.len(), recv.len())?;
        let world = self.world_size() as usize;
        if send.len() % world != 0 {
            return Err(CollError::InvalidArgument {
                operation: "alltoall",
                reason: format!("{} elements do not split into {world} chunks", send.len()),
            });
        }
        let count = send.len() / world;
        unsafe {
            self.all_to_all(
                send.as_ptr() as u64,
                count,
                E::DTYPE,
                recv.as_mut_ptr() as u64,
                count,
                E::DTYPE,
            )
        }
    }
}
