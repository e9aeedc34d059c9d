use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::domain::QueueSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Normal,
}

/// Two-level FIFO; high-priority entries are always taken first.
#[derive(Debug)]
pub struct RequestQueue<T> {
    high: Mutex<VecDeque<T>>,
    normal: Mutex<VecDeque<T>>,
    notify: Notify,
}

impl<T> RequestQueue<T> {
    pub fn new() -> Self {
        Self {
            high: Mutex::new(VecDeque::new()),
            normal: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, priority: Priority, value: T) {
        match priority {
            Priority::High => self.high.lock().push_back(value),
            Priority::Normal => self.normal.lock().push_back(value),
        }
        self.notify.notify_one();
    }

    /// Push unless an entry matching `same` is already waiting at that
    /// priority. Returns whether the value was queued.
    pub fn push_unique(&self, priority: Priority, value: T, same: impl Fn(&T) -> bool) -> bool {
        self.push_capped(priority, value, same, 1)
    }

    /// Push unless `cap` entries matching `same` are already waiting at that
    /// priority. Returns whether the value was queued.
    pub fn push_capped(
        &self,
        priority: Priority,
        value: T,
        same: impl Fn(&T) -> bool,
        cap: usize,
    ) -> bool {
        let queued = {
            let mut lane = self.lane(priority);
            if lane.iter().filter(|queued| same(*queued)).count() >= cap {
                false
            } else {
                lane.push_back(value);
                true
            }
        };
        if queued {
            self.notify.notify_one();
        }
        queued
    }

    /// Entries matching `same` waiting at `priority`.
    pub fn count(&self, priority: Priority, same: impl Fn(&T) -> bool) -> usize {
        self.lane(priority).iter().filter(|queued| same(*queued)).count()
    }

    fn lane(&self, priority: Priority) -> parking_lot::MutexGuard<'_, VecDeque<T>> {
        match priority {
            Priority::High => self.high.lock(),
            Priority::Normal => self.normal.lock(),
        }
    }

    pub fn pop(&self) -> Option<T> {
        if let Some(value) = self.high.lock().pop_front() {
            return Some(value);
        }
        self.normal.lock().pop_front()
    }

    /// Resolves after the next push, or immediately if a push happened since
    /// the last wait.
    pub async fn notified(&self) {
        self.notify.notified().await
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            high_priority: self.high.lock().len(),
            normal_priority: self.normal.lock().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_priority_is_served_first() {
        let queue = RequestQueue::new();
        queue.push(Priority::Normal, "news-1");
        queue.push(Priority::High, "doc-1");
        queue.push(Priority::Normal, "news-2");

        assert_eq!(queue.snapshot().high_priority, 1);
        assert_eq!(queue.pop(), Some("doc-1"));
        assert_eq!(queue.pop(), Some("news-1"));
        assert_eq!(queue.pop(), Some("news-2"));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn duplicates_are_not_queued_twice() {
        let queue = RequestQueue::new();
        assert!(queue.push_unique(Priority::Normal, 42_i64, |v| *v == 42));
        assert!(!queue.push_unique(Priority::Normal, 42_i64, |v| *v == 42));
        assert!(queue.push_unique(Priority::High, 42_i64, |v| *v == 42));
        assert_eq!(queue.snapshot().normal_priority, 1);
    }

    #[test]
    fn capped_pushes_stop_at_the_cap() {
        let queue = RequestQueue::new();
        let chat_one = |v: &i64| *v == 1;
        assert!(queue.push_capped(Priority::High, 1_i64, chat_one, 2));
        assert!(queue.push_capped(Priority::High, 1_i64, chat_one, 2));
        assert!(!queue.push_capped(Priority::High, 1_i64, chat_one, 2));
        assert!(queue.push_capped(Priority::High, 2_i64, |v: &i64| *v == 2, 2));
        assert_eq!(queue.count(Priority::High, chat_one), 2);
        assert_eq!(queue.snapshot().high_priority, 3);

        queue.pop();
        assert!(queue.push_capped(Priority::High, 1_i64, chat_one, 2));
    }

    #[tokio::test]
    async fn push_wakes_a_waiter() {
        let queue = std::sync::Arc::new(RequestQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue.notified().await;
                queue.pop()
            })
        };
        tokio::task::yield_now().await;
        queue.push(Priority::Normal, 7);
        assert_eq!(waiter.await.unwrap(), Some(7));
    }
}
