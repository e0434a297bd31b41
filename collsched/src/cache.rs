//! Per-communicator schedule cache and tag allocator.

use std::collections::HashMap;
use std::sync::Arc;

use crate::args::OperationKey;
use crate::schedule::Schedule;
use crate::types::Tag;

/// Result of a cache lookup. Every lookup carries a freshly allocated tag.
#[derive(Debug)]
pub enum Checkout {
    /// A schedule for this key exists; execute it as-is.
    Hit { tag: Tag, schedule: Arc<Schedule> },
    /// No schedule yet. The caller fills `schedule` and hands it to
    /// [`ScheduleCache::save`].
    Miss { tag: Tag, schedule: Schedule },
}

impl Checkout {
    pub fn tag(&self) -> Tag {
        match self {
            Checkout::Hit { tag, .. } | Checkout::Miss { tag, .. } => *tag,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Checkout::Miss { .. })
    }
}

/// Maps operation keys to generated schedules. Entries live as long as the
/// cache; nothing is evicted.
#[derive(Debug)]
pub struct ScheduleCache {
    schedules: HashMap<OperationKey, Arc<Schedule>>,
    next_tag: Tag,
    hits: u64,
    misses: u64,
}

impl ScheduleCache {
    /// Cache whose first lookup draws `initial_tag`. The reserved tag 0
    /// is replaced by 1.
    pub fn new(initial_tag: Tag) -> Self {
        Self {
            schedules: HashMap::new(),
            next_tag: initial_tag.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Allocate a tag and look `key` up.
    ///
    /// The tag is consumed on hits and misses alike, so every invocation
    /// gets a distinct tag even when it reuses a schedule.
    pub fn get_or_create(&mut self, key: &OperationKey) -> Checkout {
        let tag = self.next_tag;
        // Tag 0 is reserved; skip it when the counter wraps.
        self.next_tag = self.next_tag.checked_add(1).unwrap_or(1);

        match self.schedules.get(key) {
            Some(schedule) => {
                self.hits += 1;
                Checkout::Hit {
                    tag,
                    schedule: Arc::clone(schedule),
                }
            }
            None => {
                self.misses += 1;
                Checkout::Miss {
                    tag,
                    schedule: Schedule::new(key.kind().name()),
                }
            }
        }
    }

    /// Store a generated schedule, replacing any previous entry for `key`.
    pub fn save(&mut self, key: OperationKey, schedule: Schedule) -> Arc<Schedule> {
        let schedule = Arc::new(schedule);
        self.schedules.insert(key, Arc::clone(&schedule));
        schedule
    }

    pub fn get(&self, key: &OperationKey) -> Option<Arc<Schedule>> {
        self.schedules.get(key).cloned()
    }

    pub fn contains(&self, key: &OperationKey) -> bool {
        self.schedules.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }

    /// Drop every schedule. The tag counter keeps running.
    pub fn clear(&mut self) {
        self.schedules.clear();
    }

    /// The tag the next lookup will receive.
    pub fn peek_tag(&self) -> Tag {
        self.next_tag
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for ScheduleCache {
    fn default() -> Self {
        Self::new(1)
    }
}
