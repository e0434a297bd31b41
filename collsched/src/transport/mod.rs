//! The point-to-point capability the progress engine runs on.
//!
//! The engine only ever posts non-blocking sends and receives and polls
//! them; it never blocks inside the transport. [`LocalFabric`] is an
//! in-process implementation used for tests and single-process groups.

mod local;

pub use local::{LocalEndpoint, LocalFabric};

use crate::error::Result;
use crate::types::{Rank, Tag};

/// Handle to an outstanding send or receive, unique per transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

/// Outcome of a finished request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Sent,
    Received(Vec<u8>),
}

/// Tagged, non-blocking point-to-point messaging between the ranks of a group.
///
/// Messages from one source with one tag are matched to receives for that
/// source and tag in the order the receives were posted.
pub trait Transport {
    fn rank(&self) -> Rank;

    fn world_size(&self) -> u32;

    /// Attach the transport to a communicator. Messages sent under one
    /// communicator id never match receives posted under another.
    fn bind(&mut self, comm_id: u64) -> Result<()> {
        let _ = comm_id;
        Ok(())
    }

    /// Detach from the communicator bound last.
    fn unbind(&mut self) {}

    /// Post a send of `data` to `dest`.
    fn isend(&mut self, dest: Rank, tag: Tag, data: Vec<u8>) -> Result<RequestId>;

    /// Post a receive of exactly `len` bytes from `src`.
    fn irecv(&mut self, src: Rank, tag: Tag, len: usize) -> Result<RequestId>;

    /// Poll a request. `Ok(None)` means still in flight. A completed
    /// request is forgotten; testing it again is an error.
    fn test(&mut self, req: RequestId) -> Result<Option<Completion>>;

    /// Withdraw a request that will never be tested again. A receive that
    /// has not matched a message yet no longer consumes one. Unknown or
    /// already completed ids are ignored.
    fn cancel(&mut self, req: RequestId) {
        let _ = req;
    }
}
