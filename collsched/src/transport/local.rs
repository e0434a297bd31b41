use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{CollError, Result};
use crate::transport::{Completion, RequestId, Transport};
use crate::types::{Rank, Tag};

/// Mailbox address: (source, destination, communicator id, tag).
type Lane = (Rank, Rank, u64, Tag);

struct FabricState {
    world: u32,
    mailboxes: HashMap<Lane, VecDeque<Vec<u8>>>,
    /// Messages sent by a paused rank, in send order.
    held: HashMap<Rank, VecDeque<(Lane, Vec<u8>)>>,
    paused: HashSet<Rank>,
    disconnected: HashSet<Rank>,
    delivered: Vec<u64>,
}

impl FabricState {
    fn check_rank(&self, rank: Rank) -> Result<()> {
        if rank >= self.world {
            return Err(CollError::UnknownPeer { rank });
        }
        Ok(())
    }

    fn deliver(&mut self, lane: Lane, data: Vec<u8>) {
        self.delivered[lane.0 as usize] += 1;
        self.mailboxes.entry(lane).or_default().push_back(data);
    }
}

/// Shared in-memory mailboxes connecting the ranks of one process.
///
/// Sends are eager: a message is queued at the destination the moment it is
/// posted. The fabric also exposes delivery controls used to exercise
/// ordering and failure paths.
#[derive(Clone)]
pub struct LocalFabric {
    state: Arc<Mutex<FabricState>>,
}

impl LocalFabric {
    pub fn new(world: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(FabricState {
                world,
                mailboxes: HashMap::new(),
                held: HashMap::new(),
                paused: HashSet::new(),
                disconnected: HashSet::new(),
                delivered: vec![0; world as usize],
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, FabricState>> {
        self.state
            .lock()
            .map_err(|_| CollError::LockPoisoned("local fabric"))
    }

    pub fn world_size(&self) -> Result<u32> {
        Ok(self.lock()?.world)
    }

    /// Transport endpoint for `rank`.
    pub fn endpoint(&self, rank: Rank) -> Result<LocalEndpoint> {
        let world = {
            let state = self.lock()?;
            state.check_rank(rank)?;
            state.world
        };
        Ok(LocalEndpoint {
            rank,
            world,
            fabric: self.clone(),
            comm_id: 0,
            next_request: 0,
            requests: HashMap::new(),
            posted: HashMap::new(),
            matched: HashMap::new(),
        })
    }

    /// One endpoint per rank, in rank order.
    pub fn endpoints(&self) -> Result<Vec<LocalEndpoint>> {
        (0..self.world_size()?).map(|r| self.endpoint(r)).collect()
    }

    /// Hold back every message `rank` sends until [`resume`](Self::resume).
    pub fn pause(&self, rank: Rank) -> Result<()> {
        let mut state = self.lock()?;
        state.check_rank(rank)?;
        state.paused.insert(rank);
        Ok(())
    }

    /// Deliver the messages held for `rank`, in the order they were sent.
    pub fn resume(&self, rank: Rank) -> Result<()> {
        let mut state = self.lock()?;
        state.check_rank(rank)?;
        state.paused.remove(&rank);
        let held = state.held.remove(&rank).unwrap_or_default();
        for (lane, data) in held {
            state.deliver(lane, data);
        }
        Ok(())
    }

    /// Make `rank` unreachable. Later sends to it and receives from it fail.
    pub fn disconnect(&self, rank: Rank) -> Result<()> {
        let mut state = self.lock()?;
        state.check_rank(rank)?;
        state.disconnected.insert(rank);
        Ok(())
    }

    /// Mailbox lanes with messages no receive has consumed yet.
    pub fn queued_lanes(&self) -> Result<usize> {
        Ok(self.lock()?.mailboxes.len())
    }

    /// Messages from `rank` that have reached their destination mailbox.
    pub fn delivered_from(&self, rank: Rank) -> Result<u64> {
        let state = self.lock()?;
        state.check_rank(rank)?;
        Ok(state.delivered[rank as usize])
    }
}

impl std::fmt::Debug for LocalFabric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFabric").finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum Request {
    Send,
    Recv { src: Rank, tag: Tag, len: usize },
}

/// One rank's view of a [`LocalFabric`].
#[derive(Debug)]
pub struct LocalEndpoint {
    rank: Rank,
    world: u32,
    fabric: LocalFabric,
    comm_id: u64,
    next_request: u64,
    requests: HashMap<u64, Request>,
    /// Outstanding receive ids per (source, tag), oldest first.
    posted: HashMap<(Rank, Tag), VecDeque<u64>>,
    /// Receives that consumed a message but have not been tested yet.
    matched: HashMap<u64, Result<Vec<u8>>>,
}

impl LocalEndpoint {
    /// Forget every outstanding request.
    fn reset(&mut self) {
        self.requests.clear();
        self.posted.clear();
        self.matched.clear();
    }

    fn register(&mut self, request: Request) -> RequestId {
        let id = self.next_request;
        self.next_request += 1;
        self.requests.insert(id, request);
        RequestId(id)
    }

    /// Hand queued messages for (src, tag) to posted receives in posting order.
    fn match_posted(&mut self, state: &mut FabricState, src: Rank, tag: Tag) {
        let lane = (src, self.rank, self.comm_id, tag);
        let Some(queue) = self.posted.get_mut(&(src, tag)) else {
            return;
        };
        while let Some(&id) = queue.front() {
            let Some(data) = state.mailboxes.get_mut(&lane).and_then(VecDeque::pop_front) else {
                break;
            };
            queue.pop_front();
            let expected = match self.requests.get(&id) {
                Some(Request::Recv { len, .. }) => *len,
                _ => data.len(),
            };
            let outcome = if data.len() == expected {
                Ok(data)
            } else {
                Err(CollError::Truncated {
                    rank: src,
                    expected,
                    actual: data.len(),
                })
            };
            self.matched.insert(id, outcome);
        }
        if queue.is_empty() {
            self.posted.remove(&(src, tag));
        }
        if state.mailboxes.get(&lane).is_some_and(VecDeque::is_empty) {
            state.mailboxes.remove(&lane);
        }
    }

    /// Sends and receives posted but not yet tested to completion.
    pub fn outstanding(&self) -> usize {
        self.requests.len()
    }
}

impl Transport for LocalEndpoint {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn world_size(&self) -> u32 {
        self.world
    }

    fn bind(&mut self, comm_id: u64) -> Result<()> {
        self.reset();
        self.comm_id = comm_id;
        Ok(())
    }

    fn unbind(&mut self) {
        self.reset();
        self.comm_id = 0;
    }

    fn isend(&mut self, dest: Rank, tag: Tag, data: Vec<u8>) -> Result<RequestId> {
        {
            let mut state = self.fabric.lock()?;
            state.check_rank(dest)?;
            if state.disconnected.contains(&dest) {
                return Err(CollError::PeerDisconnected { rank: dest });
            }
            let lane = (self.rank, dest, self.comm_id, tag);
            if state.paused.contains(&self.rank) {
                state
                    .held
                    .entry(self.rank)
                    .or_default()
                    .push_back((lane, data));
            } else {
                state.deliver(lane, data);
            }
        }
        Ok(self.register(Request::Send))
    }

    fn irecv(&mut self, src: Rank, tag: Tag, len: usize) -> Result<RequestId> {
        if src >= self.world {
            return Err(CollError::UnknownPeer { rank: src });
        }
        let id = self.register(Request::Recv { src, tag, len });
        self.posted.entry((src, tag)).or_default().push_back(id.0);
        Ok(id)
    }

    fn test(&mut self, req: RequestId) -> Result<Option<Completion>> {
        let (src, tag) = match self.requests.get(&req.0) {
            None => return Err(CollError::UnknownRequest(req.0)),
            Some(Request::Send) => {
                self.requests.remove(&req.0);
                return Ok(Some(Completion::Sent));
            }
            Some(Request::Recv { src, tag, .. }) => (*src, *tag),
        };

        if !self.matched.contains_key(&req.0) {
            let fabric = self.fabric.clone();
            let mut state = fabric.lock()?;
            if state.disconnected.contains(&src) {
                return Err(CollError::PeerDisconnected { rank: src });
            }
            self.match_posted(&mut state, src, tag);
        }

        match self.matched.remove(&req.0) {
            Some(outcome) => {
                self.requests.remove(&req.0);
                outcome.map(|data| Some(Completion::Received(data)))
            }
            None => Ok(None),
        }
    }

    fn cancel(&mut self, req: RequestId) {
        self.matched.remove(&req.0);
        let Some(Request::Recv { src, tag, .. }) = self.requests.remove(&req.0) else {
            return;
        };
        if let Some(queue) = self.posted.get_mut(&(src, tag)) {
            queue.retain(|&id| id != req.0);
            if queue.is_empty() {
                self.posted.remove(&(src, tag));
            }
        }
    }
}
