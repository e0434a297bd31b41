use crate::args::OperationKind;
use crate::progress::Execution;
use crate::types::Tag;

/// A non-blocking collective in flight on a [`Communicator`](super::Communicator).
///
/// The operation only advances when the owning communicator's `test`,
/// `wait`, `wait_async` or `wait_all` is called with it. Pass an unwanted
/// handle to `Communicator::cancel`; dropping an unfinished handle leaves
/// its posted receives with the transport and logs a warning.
#[derive(Debug)]
pub struct CollectiveHandle {
    kind: OperationKind,
    comm_id: u64,
    pub(crate) execution: Execution,
}

impl CollectiveHandle {
    pub(crate) fn new(kind: OperationKind, comm_id: u64, execution: Execution) -> Self {
        Self {
            kind,
            comm_id,
            execution,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Message tag this invocation was given.
    pub fn tag(&self) -> Tag {
        self.execution.tag()
    }

    pub fn comm_id(&self) -> u64 {
        self.comm_id
    }

    /// Whether every step has completed.
    pub fn is_finished(&self) -> bool {
        self.execution.is_complete()
    }

    pub fn has_failed(&self) -> bool {
        self.execution.has_failed()
    }
}

impl Drop for CollectiveHandle {
    fn drop(&mut self) {
        if !self.execution.is_complete() && !self.execution.has_failed() {
            tracing::warn!(
                operation = self.kind.name(),
                tag = self.execution.tag(),
                comm_id = self.comm_id,
                "collective handle dropped before completion; abandoning"
            );
        }
    }
}

/// A group of non-blocking collectives that can be waited on together.
#[derive(Debug)]
pub struct CollectiveGroup {
    pub(crate) handles: Vec<CollectiveHandle>,
}

impl CollectiveGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    /// Add a handle to the group.
    pub fn push(&mut self, h: CollectiveHandle) {
        self.handles.push(h);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Default for CollectiveGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<CollectiveHandle> for CollectiveGroup {
    fn from_iter<I: IntoIterator<Item = CollectiveHandle>>(iter: I) -> Self {
        Self {
            handles: iter.into_iter().collect(),
        }
    }
}
