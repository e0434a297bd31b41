use crate::device::adapter::DeviceAdapter;
use crate::error::{CollError, Result};
use crate::reduce::reduce_slice;
use crate::types::{DataType, ReduceOp};

/// DeviceAdapter for host (CPU) memory. Direct pointer access, no copies needed.
#[derive(Debug, Clone, Default)]
pub struct CpuAdapter;

impl CpuAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceAdapter for CpuAdapter {
    unsafe fn stage_for_send(&self, ptr: u64, size_bytes: usize) -> Result<Vec<u8>> {
        if size_bytes == 0 {
            return Ok(Vec::new());
        }
        let slice = unsafe { std::slice::from_raw_parts(ptr as *const u8, size_bytes) };
        Ok(slice.to_vec())
    }

    unsafe fn receive_to_device(&self, data: &[u8], dst_ptr: u64) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let dst = dst_ptr as *mut u8;
        // `copy` rather than `copy_nonoverlapping`: a staged slice may alias
        // the destination when a schedule copies within one user buffer.
        unsafe {
            std::ptr::copy(data.as_ptr(), dst, data.len());
        }
        Ok(())
    }

    unsafe fn reduce_inplace(
        &self,
        dst_ptr: u64,
        src: &[u8],
        count: usize,
        dtype: DataType,
        op: ReduceOp,
    ) -> Result<()> {
        let expected = count * dtype.size_in_bytes();
        if src.len() != expected {
            return Err(CollError::BufferSizeMismatch {
                expected,
                actual: src.len(),
            });
        }
        if expected == 0 {
            return Ok(());
        }

        let dst = unsafe { std::slice::from_raw_parts_mut(dst_ptr as *mut u8, expected) };
        reduce_slice(dst, src, count, dtype, op)
    }
}
