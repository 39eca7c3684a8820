use async_trait::async_trait;
use chrono::Utc;

use crate::core::MatchError;
use crate::models::{QueueEntry, SearchScope, UserId};

/// Eligibility check applied to each queued candidate during a scan.
///
/// The matchmaker builds one per search request with the requester's scope
/// and district baked in; the checks need profile and blacklist reads, hence
/// the async seam.
#[async_trait]
pub trait CandidateFilter: Send + Sync {
    async fn eligible(&self, candidate: UserId) -> bool;
}

/// Ordered queue of users waiting for a partner.
///
/// Insertion order is preserved; the candidate scan returns the earliest
/// eligible entry, so matching is FIFO among eligible candidates. The scan
/// is a linear O(n) pass per match attempt, which is fine at the intended
/// single-process scale.
#[derive(Debug, Default)]
pub struct WaitQueue {
    entries: Vec<QueueEntry>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.entries.iter().any(|e| e.user_id == user_id)
    }

    /// 1-indexed queue position, for display.
    pub fn position(&self, user_id: UserId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.user_id == user_id)
            .map(|i| i + 1)
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.entries.iter().map(|e| e.user_id).collect()
    }

    /// Append a waiting user; a user id may appear at most once.
    ///
    /// Returns the 1-indexed position of the new entry.
    pub fn enqueue(&mut self, user_id: UserId, scope: SearchScope) -> Result<usize, MatchError> {
        if self.contains(user_id) {
            return Err(MatchError::AlreadyQueued);
        }
        self.entries.push(QueueEntry {
            user_id,
            scope,
            enqueued_at: Utc::now(),
        });
        Ok(self.entries.len())
    }

    /// Remove a user if present; absent is a no-op, not an error.
    pub fn dequeue(&mut self, user_id: UserId) -> bool {
        self.take(user_id).is_some()
    }

    /// Remove a user and hand back their entry, so a failed pairing can
    /// return it with [`restore`](Self::restore).
    pub fn take(&mut self, user_id: UserId) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|e| e.user_id == user_id)?;
        Some(self.entries.remove(index))
    }

    /// Put a taken entry back at its original position relative to the
    /// entries still waiting. No-op if the user re-queued in the meantime.
    pub fn restore(&mut self, entry: QueueEntry) {
        if self.contains(entry.user_id) {
            return;
        }
        let index = self
            .entries
            .iter()
            .position(|e| e.enqueued_at > entry.enqueued_at)
            .unwrap_or(self.entries.len());
        self.entries.insert(index, entry);
    }

    /// Scan in insertion order and return the first eligible candidate.
    pub async fn find_candidate(
        &self,
        requester: UserId,
        filter: &dyn CandidateFilter,
    ) -> Option<UserId> {
        for entry in &self.entries {
            if entry.user_id == requester {
                continue;
            }
            if filter.eligible(entry.user_id).await {
                return Some(entry.user_id);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct AllowList(HashSet<UserId>);

    #[async_trait]
    impl CandidateFilter for AllowList {
        async fn eligible(&self, candidate: UserId) -> bool {
            self.0.contains(&candidate)
        }
    }

    fn allow(ids: &[UserId]) -> AllowList {
        AllowList(ids.iter().copied().collect())
    }

    #[test]
    fn test_enqueue_is_fifo_and_unique() {
        let mut queue = WaitQueue::new();
        assert_eq!(queue.enqueue(1, SearchScope::Global).unwrap(), 1);
        assert_eq!(queue.enqueue(2, SearchScope::District).unwrap(), 2);
        assert!(matches!(
            queue.enqueue(1, SearchScope::Global),
            Err(MatchError::AlreadyQueued)
        ));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.position(2), Some(2));
    }

    #[test]
    fn test_dequeue_absent_is_noop() {
        let mut queue = WaitQueue::new();
        queue.enqueue(1, SearchScope::Global).unwrap();
        assert!(queue.dequeue(1));
        assert!(!queue.dequeue(1));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_take_and_restore_preserve_order() {
        let base = Utc::now();
        let mut queue = WaitQueue::new();
        for (offset, id) in [(0, 1), (1, 2), (2, 3)] {
            queue.restore(QueueEntry {
                user_id: id,
                scope: SearchScope::Global,
                enqueued_at: base + chrono::Duration::seconds(offset),
            });
        }

        let taken = queue.take(2).expect("entry present");
        assert_eq!(taken.user_id, 2);
        assert_eq!(queue.user_ids(), vec![1, 3]);

        queue.restore(taken);
        assert_eq!(queue.user_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_restore_ignores_requeued_user() {
        let mut queue = WaitQueue::new();
        queue.enqueue(5, SearchScope::Global).unwrap();
        let taken = queue.take(5).expect("entry present");

        queue.enqueue(5, SearchScope::District).unwrap();
        queue.restore(taken);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_find_candidate_returns_earliest_eligible() {
        let mut queue = WaitQueue::new();
        queue.enqueue(10, SearchScope::Global).unwrap();
        queue.enqueue(11, SearchScope::Global).unwrap();
        queue.enqueue(12, SearchScope::Global).unwrap();

        // 10 is filtered out, so the scan lands on 11 even though 10 queued first.
        let found = queue.find_candidate(99, &allow(&[11, 12])).await;
        assert_eq!(found, Some(11));
    }

    #[tokio::test]
    async fn test_find_candidate_skips_requester() {
        let mut queue = WaitQueue::new();
        queue.enqueue(7, SearchScope::Global).unwrap();

        let found = queue.find_candidate(7, &allow(&[7])).await;
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_find_candidate_none_eligible() {
        let mut queue = WaitQueue::new();
        queue.enqueue(1, SearchScope::Global).unwrap();
        queue.enqueue(2, SearchScope::Global).unwrap();

        let found = queue.find_candidate(99, &allow(&[])).await;
        assert_eq!(found, None);
    }
}
