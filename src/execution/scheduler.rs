//! Admission control - decides which queued task may start next

use crate::core::state::TaskState;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Identifier of a submitted task
pub type TaskId = Uuid;

/// Identifier of a submitted batch
pub type BatchId = Uuid;

/// Final tally of a batch, sent once every member is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub id: BatchId,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl BatchSummary {
    fn empty(id: BatchId) -> Self {
        Self {
            id,
            total: 0,
            succeeded: 0,
            failed: 0,
            cancelled: 0,
        }
    }

    fn record(&mut self, state: TaskState) {
        match state {
            TaskState::Succeeded => self.succeeded += 1,
            TaskState::Failed => self.failed += 1,
            TaskState::Cancelled => self.cancelled += 1,
            TaskState::Queued | TaskState::Running => {}
        }
    }
}

struct BatchSlot {
    limit: usize,
    running: usize,
    outstanding: usize,
    summary: BatchSummary,
}

struct Entry<J> {
    id: TaskId,
    batch: Option<BatchId>,
    job: J,
}

/// A task allowed to start
#[derive(Debug)]
pub struct Admitted<J> {
    pub id: TaskId,
    pub batch: Option<BatchId>,
    pub job: J,
}

/// FIFO queue bounded by a global slot count and per-batch limits
///
/// The queue only does bookkeeping; the caller starts admitted jobs and
/// reports back through [`AdmissionQueue::complete`].
pub struct AdmissionQueue<J> {
    capacity: usize,
    running: usize,
    queue: VecDeque<Entry<J>>,
    batches: HashMap<BatchId, BatchSlot>,
}

impl<J> AdmissionQueue<J> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            running: 0,
            queue: VecDeque::new(),
            batches: HashMap::new(),
        }
    }

    /// Queue a standalone task, limited only by the global capacity
    pub fn push(&mut self, id: TaskId, job: J) {
        self.queue.push_back(Entry {
            id,
            batch: None,
            job,
        });
    }

    /// Queue a batch; returns its summary right away if it has no members
    pub fn push_batch(
        &mut self,
        batch: BatchId,
        limit: usize,
        jobs: Vec<(TaskId, J)>,
    ) -> Option<BatchSummary> {
        if jobs.is_empty() {
            return Some(BatchSummary::empty(batch));
        }

        let mut summary = BatchSummary::empty(batch);
        summary.total = jobs.len();
        self.batches.insert(
            batch,
            BatchSlot {
                limit,
                running: 0,
                outstanding: jobs.len(),
                summary,
            },
        );
        self.queue.extend(jobs.into_iter().map(|(id, job)| Entry {
            id,
            batch: Some(batch),
            job,
        }));
        None
    }

    /// Take the earliest queued task that fits under both limits
    pub fn admit(&mut self) -> Option<Admitted<J>> {
        if self.running >= self.capacity {
            return None;
        }

        let position = self.queue.iter().position(|entry| match entry.batch {
            None => true,
            Some(batch) => self
                .batches
                .get(&batch)
                .map_or(true, |slot| slot.running < slot.limit),
        })?;

        let entry = self.queue.remove(position)?;
        self.running += 1;
        if let Some(slot) = entry.batch.and_then(|b| self.batches.get_mut(&b)) {
            slot.running += 1;
        }
        Some(Admitted {
            id: entry.id,
            batch: entry.batch,
            job: entry.job,
        })
    }

    /// Record that an admitted task reached `state`
    ///
    /// Returns the batch summary when this was the batch's last member.
    pub fn complete(&mut self, batch: Option<BatchId>, state: TaskState) -> Option<BatchSummary> {
        self.running = self.running.saturating_sub(1);
        let batch = batch?;
        let slot = self.batches.get_mut(&batch)?;
        slot.running = slot.running.saturating_sub(1);
        self.settle(batch, state)
    }

    /// Remove a task that has not started yet
    pub fn cancel(&mut self, id: TaskId) -> Option<(J, Option<BatchSummary>)> {
        let position = self.queue.iter().position(|entry| entry.id == id)?;
        let entry = self.queue.remove(position)?;
        let finished = entry
            .batch
            .and_then(|batch| self.settle(batch, TaskState::Cancelled));
        Some((entry.job, finished))
    }

    fn settle(&mut self, batch: BatchId, state: TaskState) -> Option<BatchSummary> {
        let slot = self.batches.get_mut(&batch)?;
        slot.summary.record(state);
        slot.outstanding = slot.outstanding.saturating_sub(1);
        if slot.outstanding > 0 {
            return None;
        }
        self.batches.remove(&batch).map(|slot| slot.summary)
    }

    pub fn running(&self) -> usize {
        self.running
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Nothing queued and nothing running
    pub fn is_idle(&self) -> bool {
        self.running == 0 && self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<TaskId> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_global_capacity() {
        let mut queue = AdmissionQueue::new(2);
        for (i, id) in ids(3).into_iter().enumerate() {
            queue.push(id, i);
        }

        assert_eq!(queue.admit().unwrap().job, 0);
        assert_eq!(queue.admit().unwrap().job, 1);
        assert!(queue.admit().is_none());

        queue.complete(None, TaskState::Succeeded);
        assert_eq!(queue.admit().unwrap().job, 2);
        assert_eq!(queue.queued(), 0);
    }

    #[test]
    fn test_batch_limit_keeps_fifo_order() {
        let mut queue = AdmissionQueue::new(8);
        let batch = Uuid::new_v4();
        let jobs: Vec<_> = ids(4).into_iter().zip(["t1", "t2", "t3", "t4"]).collect();
        assert!(queue.push_batch(batch, 1, jobs).is_none());

        let mut started = Vec::new();
        while let Some(admitted) = queue.admit() {
            started.push(admitted.job);
            assert!(queue.admit().is_none(), "limit of one must hold");
            queue.complete(admitted.batch, TaskState::Succeeded);
        }
        assert_eq!(started, vec!["t1", "t2", "t3", "t4"]);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_blocked_batch_does_not_block_others() {
        let mut queue = AdmissionQueue::new(4);
        let first = Uuid::new_v4();
        queue.push_batch(first, 1, ids(2).into_iter().zip(["a1", "a2"]).collect());
        queue.push(Uuid::new_v4(), "solo");

        assert_eq!(queue.admit().unwrap().job, "a1");
        assert_eq!(queue.admit().unwrap().job, "solo");
        assert!(queue.admit().is_none());
    }

    #[test]
    fn test_summary_after_last_member() {
        let mut queue = AdmissionQueue::new(2);
        let batch = Uuid::new_v4();
        queue.push_batch(batch, 2, ids(2).into_iter().zip([1, 2]).collect());

        let a = queue.admit().unwrap();
        let b = queue.admit().unwrap();
        assert!(queue.complete(a.batch, TaskState::Failed).is_none());
        let summary = queue.complete(b.batch, TaskState::Succeeded).unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_cancel_only_queued() {
        let mut queue = AdmissionQueue::new(1);
        let batch = Uuid::new_v4();
        let members = ids(2);
        queue.push_batch(batch, 1, members.iter().copied().zip(["run", "wait"]).collect());

        let running = queue.admit().unwrap();
        assert!(queue.cancel(running.id).is_none(), "running tasks cannot be cancelled");

        let (job, finished) = queue.cancel(members[1]).unwrap();
        assert_eq!(job, "wait");
        assert!(finished.is_none());

        let summary = queue.complete(running.batch, TaskState::Succeeded).unwrap();
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.succeeded, 1);
    }

    #[test]
    fn test_empty_batch_completes_immediately() {
        let mut queue: AdmissionQueue<()> = AdmissionQueue::new(1);
        let batch = Uuid::new_v4();
        let summary = queue.push_batch(batch, 1, Vec::new()).unwrap();
        assert_eq!(summary.total, 0);
        assert!(queue.is_idle());
    }
}
