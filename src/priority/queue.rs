//! Priority-ordered request queue.
//!
//! Requests are kept sorted by descending priority value. A new request is
//! inserted after every entry that outranks or ties it, so equal priorities
//! dequeue in arrival order (FIFO) without consulting the clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PriorityToken;

/// Processing status of a queued request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Rejected,
}

/// A queued request with its priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry<T> {
    /// `req_{uuid}`.
    pub id: String,
    pub request: T,
    pub priority: PriorityToken,
    pub added_at: DateTime<Utc>,
    pub status: RequestStatus,
}

/// Queue of pending scheduling requests.
#[derive(Debug, Clone)]
pub struct PriorityQueueManager<T> {
    entries: Vec<QueueEntry<T>>,
}

impl<T> Default for PriorityQueueManager<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> PriorityQueueManager<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a request and returns its id. `None` priority means NORMAL.
    pub fn enqueue(&mut self, request: T, priority: Option<PriorityToken>) -> String {
        let priority = priority.unwrap_or_default();
        let entry = QueueEntry {
            id: format!("req_{}", Uuid::new_v4().simple()),
            request,
            priority,
            added_at: Utc::now(),
            status: RequestStatus::Pending,
        };

        // After every entry that outranks or ties it.
        let value = entry.priority.value();
        let pos = self
            .entries
            .partition_point(|e| e.priority.value() >= value);
        let id = entry.id.clone();
        self.entries.insert(pos, entry);
        id
    }

    /// Removes and returns the highest-priority request.
    pub fn dequeue(&mut self) -> Option<QueueEntry<T>> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    /// The highest-priority request, without removing it.
    pub fn peek(&self) -> Option<&QueueEntry<T>> {
        self.entries.first()
    }

    /// Requests still pending, in queue order.
    pub fn pending_requests(&self) -> Vec<&QueueEntry<T>> {
        self.entries
            .iter()
            .filter(|e| e.status == RequestStatus::Pending)
            .collect()
    }

    /// Updates a request's status. Returns false for an unknown id.
    pub fn update_status(&mut self, request_id: &str, status: RequestStatus) -> bool {
        match self.entries.iter_mut().find(|e| e.id == request_id) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    /// Drops requests whose priority token has expired. Returns how many.
    pub fn remove_expired(&mut self) -> usize {
        self.remove_expired_at(Utc::now())
    }

    /// [`remove_expired`](Self::remove_expired) evaluated at `now`.
    pub fn remove_expired_at(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !e.priority.is_expired_at(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in queue order.
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry<T>> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::PriorityLevel;
    use chrono::Duration;

    fn token(level: PriorityLevel) -> Option<PriorityToken> {
        Some(PriorityToken::new(level, ""))
    }

    #[test]
    fn test_priority_then_fifo() {
        let mut q = PriorityQueueManager::new();
        q.enqueue("normal-1", None);
        q.enqueue("urgent-1", token(PriorityLevel::Urgent));
        q.enqueue("normal-2", token(PriorityLevel::Normal));
        q.enqueue("emergency", token(PriorityLevel::Emergency));
        q.enqueue("urgent-2", token(PriorityLevel::Urgent));
        q.enqueue("low", token(PriorityLevel::Low));

        let order: Vec<&str> = std::iter::from_fn(|| q.dequeue().map(|e| e.request)).collect();
        assert_eq!(
            order,
            vec!["emergency", "urgent-1", "urgent-2", "normal-1", "normal-2", "low"]
        );
        assert!(q.is_empty());
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn test_peek_and_status() {
        let mut q = PriorityQueueManager::new();
        let a = q.enqueue(1, token(PriorityLevel::High));
        let b = q.enqueue(2, None);
        assert_eq!(q.peek().map(|e| e.id.as_str()), Some(a.as_str()));
        assert_ne!(a, b);

        assert!(q.update_status(&a, RequestStatus::Processing));
        assert!(!q.update_status("req_missing", RequestStatus::Completed));
        let pending: Vec<i32> = q.pending_requests().iter().map(|e| e.request).collect();
        assert_eq!(pending, vec![2]);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_remove_expired() {
        let now = Utc::now();
        let mut q = PriorityQueueManager::new();
        q.enqueue(
            "stale",
            Some(
                PriorityToken::new(PriorityLevel::Urgent, "")
                    .with_expiry(now - Duration::hours(1)),
            ),
        );
        q.enqueue("fresh", None);
        assert_eq!(q.remove_expired_at(now), 1);
        assert_eq!(q.iter().map(|e| e.request).collect::<Vec<_>>(), vec!["fresh"]);
    }

    #[test]
    fn test_equal_priority_ties_keep_arrival_order() {
        let mut q = PriorityQueueManager::new();
        for n in 0..5 {
            q.enqueue(n, token(PriorityLevel::High));
        }
        q.enqueue(99, token(PriorityLevel::Emergency));
        q.enqueue(5, token(PriorityLevel::High));

        let order: Vec<i32> = q.iter().map(|e| e.request).collect();
        assert_eq!(order, vec![99, 0, 1, 2, 3, 4, 5]);
    }
}
