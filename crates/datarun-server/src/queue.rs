//! Dispatch queue - orders pending tasks for assignment.
//!
//! Entries are keyed by the task's creation sequence so the queue stays FIFO
//! by creation time even when a released task is put back. The queue can hold
//! stale entries (a task that was claimed some other way); the store's
//! compare-and-swap at claim time is what decides ownership.

use std::collections::BTreeMap;

use tokio::sync::Mutex;

use datarun_core::{CapabilitySet, OperationCode, TaskId};

/// A queued task reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub task_id: TaskId,
    pub operation_code: OperationCode,
    /// Creation sequence assigned by the task store.
    pub seq: u64,
}

/// FIFO queue of pending task ids, filterable by operation code.
#[derive(Default)]
pub struct DispatchQueue {
    entries: Mutex<BTreeMap<u64, QueueEntry>>,
}

impl DispatchQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. Returns false if it was already queued.
    pub async fn enqueue(&self, entry: QueueEntry) -> bool {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(&entry.seq) {
            return false;
        }
        entries.insert(entry.seq, entry);
        true
    }

    /// Remove and return the oldest task whose operation the caller can run.
    pub async fn dequeue_for_capability(&self, capabilities: &CapabilitySet) -> Option<TaskId> {
        let mut entries = self.entries.lock().await;
        let seq = entries
            .values()
            .find(|e| capabilities.supports(e.operation_code))
            .map(|e| e.seq)?;
        entries.remove(&seq).map(|e| e.task_id)
    }

    /// Number of queued tasks.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn entry(id: &str, code: OperationCode, seq: u64) -> QueueEntry {
        QueueEntry {
            task_id: TaskId::new(id),
            operation_code: code,
            seq,
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = DispatchQueue::new();
        queue.enqueue(entry("a", OperationCode::FetchRawData, 1)).await;
        queue.enqueue(entry("b", OperationCode::FetchRawData, 2)).await;

        let all = CapabilitySet::all();
        assert_eq!(queue.dequeue_for_capability(&all).await, Some(TaskId::new("a")));
        assert_eq!(queue.dequeue_for_capability(&all).await, Some(TaskId::new("b")));
        assert_eq!(queue.dequeue_for_capability(&all).await, None);
    }

    #[tokio::test]
    async fn test_requeued_task_keeps_creation_position() {
        let queue = DispatchQueue::new();
        queue.enqueue(entry("late", OperationCode::FilterData, 5)).await;
        queue.enqueue(entry("early", OperationCode::FilterData, 2)).await;

        let all = CapabilitySet::all();
        assert_eq!(queue.dequeue_for_capability(&all).await, Some(TaskId::new("early")));
    }

    #[tokio::test]
    async fn test_capability_filter_skips_unsupported() {
        let queue = DispatchQueue::new();
        queue.enqueue(entry("fetch", OperationCode::FetchRawData, 1)).await;
        queue.enqueue(entry("ml", OperationCode::MlAnalysis, 2)).await;

        let ml_only: CapabilitySet = [OperationCode::MlAnalysis].into_iter().collect();
        assert_eq!(queue.dequeue_for_capability(&ml_only).await, Some(TaskId::new("ml")));
        assert_eq!(queue.dequeue_for_capability(&ml_only).await, None);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_enqueue_is_noop() {
        let queue = DispatchQueue::new();
        assert!(queue.enqueue(entry("a", OperationCode::ExportReport, 1)).await);
        assert!(!queue.enqueue(entry("a", OperationCode::ExportReport, 1)).await);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dequeues_are_disjoint() {
        let queue = Arc::new(DispatchQueue::new());
        for seq in 0..50u64 {
            queue
                .enqueue(entry(&format!("t{seq}"), OperationCode::FilterData, seq))
                .await;
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let all = CapabilitySet::all();
                let mut got = Vec::new();
                while let Some(id) = queue.dequeue_for_capability(&all).await {
                    got.push(id);
                }
                got
            }));
        }

        let mut seen = HashSet::new();
        let mut total = 0;
        for handle in handles {
            for id in handle.await.unwrap() {
                total += 1;
                seen.insert(id);
            }
        }
        assert_eq!(total, 50);
        assert_eq!(seen.len(), 50);
    }
}
