use crate::error::Result;
use crate::types::{DataType, ReduceOp};

/// Bridges user memory with the progress engine.
///
/// Schedules refer to user buffers by raw `u64` address. The engine never
/// dereferences those addresses itself; it asks the adapter to stage bytes
/// out for a send, write received bytes back, and combine in place.
///
/// - `CpuAdapter` (built-in): direct pointer access for host memory.
/// - Accelerator adapters: device-to-host / host-to-device copies
///   (implemented externally).
pub trait DeviceAdapter: Send + Sync {
    /// Copy `size_bytes` bytes starting at `ptr` into a host buffer.
    ///
    /// # Safety
    /// `ptr` must be a valid pointer to at least `size_bytes` bytes.
    unsafe fn stage_for_send(&self, ptr: u64, size_bytes: usize) -> Result<Vec<u8>>;

    /// Copy host bytes into user memory at `dst_ptr`.
    ///
    /// # Safety
    /// `dst_ptr` must be a valid pointer to at least `data.len()` writable bytes.
    unsafe fn receive_to_device(&self, data: &[u8], dst_ptr: u64) -> Result<()>;

    /// In-place reduce: `dst[i] = op(dst[i], src[i])` for each element.
    ///
    /// # Safety
    /// `dst_ptr` must be a valid pointer to at least `count * dtype.size_in_bytes()` bytes.
    unsafe fn reduce_inplace(
        &self,
        dst_ptr: u64,
        src: &[u8],
        count: usize,
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<()>;
}
