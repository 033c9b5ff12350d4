use super::state::{JobId, Priority, Timestamp};
use keyed_priority_queue::KeyedPriorityQueue;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

/// Queue position: higher priority wins, then the earlier arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rank {
    pub priority: Priority,
    pub seq: u64,
}

// KeyedPriorityQueue pops the greatest element, so arrival order is flipped
impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReadyNode {
    pub job: JobId,
    pub priority: Priority,
    pub last_stopped_at: Timestamp,
}

#[derive(Debug)]
pub struct ReadyQueue {
    ranks: KeyedPriorityQueue<JobId, Rank>,
    stopped_at: FxHashMap<JobId, Timestamp>,
    next_seq: u64,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self {
            ranks: KeyedPriorityQueue::new(),
            stopped_at: FxHashMap::default(),
            next_seq: 0,
        }
    }

    pub fn enqueue(&mut self, job: JobId, priority: Priority, now: Timestamp) {
        assert!(
            !self.stopped_at.contains_key(&job),
            "Job {job:?} already present in the ready queue"
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        self.ranks.push(job, Rank { priority, seq });
        self.stopped_at.insert(job, now);
    }

    pub fn dequeue(&mut self) -> Option<ReadyNode> {
        let (job, rank) = self.ranks.pop()?;
        Some(self.node(job, rank))
    }

    /// Takes a specific job out of the queue regardless of its position.
    pub fn remove(&mut self, job: JobId) -> Option<ReadyNode> {
        let rank = self.ranks.remove(&job)?;
        Some(self.node(job, rank))
    }

    fn node(&mut self, job: JobId, rank: Rank) -> ReadyNode {
        let last_stopped_at = self
            .stopped_at
            .remove(&job)
            .expect("Queued job missing its stop timestamp");
        ReadyNode {
            job,
            priority: rank.priority,
            last_stopped_at,
        }
    }

    pub fn peek_priority(&self) -> Option<Priority> {
        self.ranks.peek().map(|(_, rank)| rank.priority)
    }

    pub fn contains(&self, job: JobId) -> bool {
        self.stopped_at.contains_key(&job)
    }

    pub fn jobs(&self) -> impl Iterator<Item = JobId> + '_ {
        self.stopped_at.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}
