//! Progress engine: drives one execution of a schedule over a transport.

use std::ops::Range;
use std::sync::Arc;

use crate::device::DeviceAdapter;
use crate::error::{CollError, ErrorClass, Result};
use crate::reduce::reduce_slice;
use crate::schedule::{Buffer, Schedule, Slice, Step, StepKind};
use crate::transport::{Completion, RequestId, Transport};
use crate::types::{DataType, Rank, ReduceOp, Tag};

/// Result of one progress scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Issued(RequestId),
    Complete,
    Failed,
}

/// Per-invocation state of a shared schedule.
///
/// Creating an execution resets every step to `Pending` and allocates fresh
/// scratch memory; the schedule itself is never touched.
#[derive(Debug)]
pub struct Execution {
    schedule: Arc<Schedule>,
    tag: Tag,
    states: Vec<StepState>,
    scratch: Vec<Vec<u8>>,
    remaining: usize,
    failed: bool,
}

impl Execution {
    pub fn new(schedule: Arc<Schedule>, tag: Tag) -> Self {
        let scratch = schedule
            .scratch_sizes()
            .iter()
            .map(|&len| vec![0u8; len])
            .collect();
        Self {
            states: vec![StepState::Pending; schedule.len()],
            remaining: schedule.len(),
            schedule,
            tag,
            scratch,
            failed: false,
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn schedule(&self) -> &Arc<Schedule> {
        &self.schedule
    }

    pub fn states(&self) -> &[StepState] {
        &self.states
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0 && !self.failed
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// One scan over the steps in index order.
    ///
    /// Pending steps whose dependencies are complete are issued; issued
    /// steps are polled. A step finished during the scan can unlock later
    /// steps in the same scan. Any error fails the whole execution.
    ///
    /// # Safety
    /// Every user address in the schedule must be valid for the access its
    /// step performs until the execution completes or fails.
    pub unsafe fn advance<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        adapter: &dyn DeviceAdapter,
    ) -> Result<Progress> {
        if self.failed {
            return Err(CollError::ScheduleFailed { tag: self.tag });
        }

        let schedule = Arc::clone(&self.schedule);
        for (index, step) in schedule.steps().iter().enumerate() {
            let outcome = match self.states[index] {
                StepState::Complete | StepState::Failed => continue,
                StepState::Pending => {
                    if !self.ready(step) {
                        continue;
                    }
                    unsafe { self.issue(index, step, transport, adapter) }
                }
                StepState::Issued(req) => unsafe {
                    self.poll(index, step, req, transport, adapter)
                },
            };
            if let Err(e) = outcome {
                self.fail(index, &e, transport);
                return Err(e);
            }
        }

        Ok(if self.remaining == 0 {
            Progress::Completed
        } else {
            Progress::InProgress
        })
    }

    /// Advance until complete, yielding the thread after every
    /// `spin_before_yield` scans.
    ///
    /// # Safety
    /// Same contract as [`advance`](Self::advance).
    pub unsafe fn wait<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        adapter: &dyn DeviceAdapter,
        spin_before_yield: u32,
    ) -> Result<()> {
        let mut spins = 0u32;
        loop {
            if unsafe { self.advance(transport, adapter)? } == Progress::Completed {
                return Ok(());
            }
            spins += 1;
            if spins >= spin_before_yield {
                spins = 0;
                std::thread::yield_now();
            }
        }
    }

    fn ready(&self, step: &Step) -> bool {
        step.deps
            .iter()
            .all(|&d| self.states[d] == StepState::Complete)
    }

    unsafe fn issue<T: Transport + ?Sized>(
        &mut self,
        index: usize,
        step: &Step,
        transport: &mut T,
        adapter: &dyn DeviceAdapter,
    ) -> Result<()> {
        let label = self.schedule.label();
        match step.kind {
            StepKind::Send { peer, src } => {
                let data = unsafe { self.read(&src, adapter)? };
                let req = transport
                    .isend(peer, self.tag, data)
                    .map_err(|e| collective_failed(label, peer, e))?;
                tracing::trace!(tag = self.tag, step = index, peer, bytes = src.len, "send issued");
                self.states[index] = StepState::Issued(req);
                unsafe { self.poll(index, step, req, transport, adapter) }
            }
            StepKind::Recv { peer, dst } => {
                let req = transport
                    .irecv(peer, self.tag, dst.len)
                    .map_err(|e| collective_failed(label, peer, e))?;
                tracing::trace!(tag = self.tag, step = index, peer, bytes = dst.len, "recv issued");
                self.states[index] = StepState::Issued(req);
                unsafe { self.poll(index, step, req, transport, adapter) }
            }
            StepKind::Copy { src, dst } => {
                let data = unsafe { self.read(&src, adapter)? };
                unsafe { self.write(&dst, &data, adapter)? };
                self.complete(index);
                Ok(())
            }
            StepKind::Combine {
                src,
                dst,
                count,
                dtype,
                op,
            } => {
                let data = unsafe { self.read(&src, adapter)? };
                unsafe { self.combine(&dst, &data, count, dtype, op, adapter) }.map_err(|e| {
                    CollError::InvalidCombine {
                        step: index,
                        reason: e.to_string(),
                    }
                })?;
                self.complete(index);
                Ok(())
            }
            StepKind::NoOp => {
                self.complete(index);
                Ok(())
            }
        }
    }

    unsafe fn poll<T: Transport + ?Sized>(
        &mut self,
        index: usize,
        step: &Step,
        req: RequestId,
        transport: &mut T,
        adapter: &dyn DeviceAdapter,
    ) -> Result<()> {
        let peer = match step.kind {
            StepKind::Send { peer, .. } | StepKind::Recv { peer, .. } => peer,
            _ => return Err(CollError::UnknownRequest(req.0)),
        };
        let label = self.schedule.label();
        let completion = transport
            .test(req)
            .map_err(|e| collective_failed(label, peer, e))?;

        match (completion, step.kind) {
            (None, _) => Ok(()),
            (Some(Completion::Sent), StepKind::Send { .. }) => {
                self.complete(index);
                Ok(())
            }
            (Some(Completion::Received(data)), StepKind::Recv { dst, .. }) => {
                if data.len() != dst.len {
                    return Err(CollError::Truncated {
                        rank: peer,
                        expected: dst.len,
                        actual: data.len(),
                    });
                }
                unsafe { self.write(&dst, &data, adapter)? };
                self.complete(index);
                Ok(())
            }
            (Some(_), _) => Err(CollError::CollectiveFailed {
                operation: label,
                rank: peer,
                reason: format!("completion of request {} does not match its step", req.0),
            }),
        }
    }

    fn complete(&mut self, index: usize) {
        tracing::trace!(tag = self.tag, step = index, "step complete");
        self.states[index] = StepState::Complete;
        self.remaining -= 1;
    }

    fn fail<T: Transport + ?Sized>(
        &mut self,
        index: usize,
        error: &CollError,
        transport: &mut T,
    ) {
        tracing::warn!(
            operation = self.schedule.label(),
            tag = self.tag,
            step = index,
            error = %error,
            "execution failed"
        );
        self.withdraw(transport);
        self.states[index] = StepState::Failed;
    }

    /// Cancel every issued request and mark the execution failed.
    fn withdraw<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        self.failed = true;
        for state in &mut self.states {
            if let StepState::Issued(req) = *state {
                transport.cancel(req);
                *state = StepState::Failed;
            }
        }
    }

    /// Stop the execution, withdrawing its outstanding sends and receives
    /// from the transport. Steps that never ran stay `Pending`; the
    /// execution reports failure afterwards.
    pub fn abandon<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        if self.failed || self.remaining == 0 {
            return;
        }
        tracing::debug!(
            operation = self.schedule.label(),
            tag = self.tag,
            remaining = self.remaining,
            "execution abandoned"
        );
        self.withdraw(transport);
    }

    fn scratch_range(&self, index: usize, slice: &Slice) -> Result<Range<usize>> {
        let size = self.scratch.get(index).map_or(0, Vec::len);
        let end = slice.offset.saturating_add(slice.len);
        if index >= self.scratch.len() || end > size {
            return Err(CollError::SliceOutOfBounds {
                index,
                offset: slice.offset,
                len: slice.len,
                size,
            });
        }
        Ok(slice.offset..end)
    }

    unsafe fn read(&self, slice: &Slice, adapter: &dyn DeviceAdapter) -> Result<Vec<u8>> {
        if slice.is_empty() {
            return Ok(Vec::new());
        }
        match slice.buffer {
            Buffer::User(addr) => unsafe {
                adapter.stage_for_send(addr + slice.offset as u64, slice.len)
            },
            Buffer::Scratch(i) => {
                let range = self.scratch_range(i, slice)?;
                Ok(self.scratch[i][range].to_vec())
            }
        }
    }

    unsafe fn write(
        &mut self,
        slice: &Slice,
        data: &[u8],
        adapter: &dyn DeviceAdapter,
    ) -> Result<()> {
        if slice.is_empty() {
            return Ok(());
        }
        match slice.buffer {
            Buffer::User(addr) => unsafe {
                adapter.receive_to_device(data, addr + slice.offset as u64)
            },
            Buffer::Scratch(i) => {
                let range = self.scratch_range(i, slice)?;
                self.scratch[i][range].copy_from_slice(data);
                Ok(())
            }
        }
    }

    unsafe fn combine(
        &mut self,
        dst: &Slice,
        src: &[u8],
        count: usize,
        dtype: DataType,
        op: ReduceOp,
        adapter: &dyn DeviceAdapter,
    ) -> Result<()> {
        if dst.is_empty() {
            return Ok(());
        }
        match dst.buffer {
            Buffer::User(addr) => unsafe {
                adapter.reduce_inplace(addr + dst.offset as u64, src, count, dtype, op)
            },
            Buffer::Scratch(i) => {
                let range = self.scratch_range(i, dst)?;
                reduce_slice(&mut self.scratch[i][range], src, count, dtype, op)
            }
        }
    }
}

/// Wrap a transport failure with the operation and peer it hit.
/// Programming errors pass through unchanged.
fn collective_failed(operation: &'static str, rank: Rank, error: CollError) -> CollError {
    if error.class() == ErrorClass::Programming {
        return error;
    }
    CollError::CollectiveFailed {
        operation,
        rank,
        reason: error.to_string(),
    }
}
