//! Bounded, blocking, order-preserving handoff queue built from three
//! [`Monitor`]s and a mutex.
//!
//! Intended usage is single-producer / single-consumer per queue (one stage's
//! worker draining it, one predecessor feeding it), though the implementation
//! itself tolerates arbitrary producer/consumer counts contending on the mutex.

use crate::monitor::Monitor;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A capacity-bounded FIFO of owned [`String`] records.
///
/// `submit` blocks while the queue is full; `dequeue` blocks while it is empty.
/// A separate `finished` signal lets a consumer announce it has drained the
/// sentinel and will not dequeue again, independent of fullness/emptiness.
pub struct BoundedQueue {
    capacity: usize,
    items: Mutex<VecDeque<String>>,
    not_full: Monitor,
    not_empty: Monitor,
    finished: Monitor,
}

impl BoundedQueue {
    /// Creates a queue that holds at most `capacity` records.
    ///
    /// Fails with an error string if `capacity` is zero; this implementation
    /// grows its backing storage lazily so there is no allocation to roll back
    /// on failure (unlike the manually-managed circular buffer this queue
    /// replaces, see `DESIGN.md`).
    pub fn new(capacity: usize) -> Result<Self, String> {
        if capacity == 0 {
            return Err("invalid capacity".to_string());
        }

        let not_full = Monitor::new();
        // The queue starts empty, so producers must not block immediately.
        not_full.signal();

        Ok(BoundedQueue {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_full,
            not_empty: Monitor::new(),
            finished: Monitor::new(),
        })
    }

    /// The capacity this queue was constructed with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Inserts `item` at the tail, blocking while the queue is full.
    ///
    /// Ownership of `item` transfers to the queue on return.
    pub fn submit(&self, item: String) {
        loop {
            let mut items = self.items.lock().unwrap();
            if items.len() < self.capacity {
                items.push_back(item);
                self.not_empty.signal();
                let now_full = items.len() == self.capacity;
                drop(items);
                // Reset happens after unlock: any producer or consumer that
                // enters between the unlock and this reset re-observes the
                // correct count under the mutex, so no wakeup is lost.
                if now_full {
                    self.not_full.reset();
                }
                return;
            }
            drop(items);
            self.not_full.wait();
        }
    }

    /// Removes and returns the head of the queue, blocking while empty.
    ///
    /// Ownership of the returned record transfers to the caller.
    pub fn dequeue(&self) -> String {
        loop {
            let mut items = self.items.lock().unwrap();
            if let Some(item) = items.pop_front() {
                self.not_full.signal();
                let now_empty = items.is_empty();
                drop(items);
                if now_empty {
                    self.not_empty.reset();
                }
                return item;
            }
            drop(items);
            self.not_empty.wait();
        }
    }

    /// Raises the `finished` signal; idempotent.
    pub fn signal_finished(&self) {
        self.finished.signal();
    }

    /// Blocks until [`BoundedQueue::signal_finished`] has been called.
    pub fn wait_finished(&self) {
        self.finished.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn rejects_zero_capacity() {
        assert!(BoundedQueue::new(0).is_err());
    }

    #[test]
    fn fifo_order_is_preserved() {
        let queue = BoundedQueue::new(4).unwrap();
        for i in 0..4 {
            queue.submit(i.to_string());
        }
        for i in 0..4 {
            assert_eq!(queue.dequeue(), i.to_string());
        }
    }

    #[test]
    fn capacity_one_does_not_deadlock() {
        let queue = Arc::new(BoundedQueue::new(1).unwrap());
        queue.submit("a".to_string());

        let producer = {
            let queue = queue.clone();
            thread::spawn(move || queue.submit("b".to_string()))
        };

        // producer must be blocked on not_full until we drain one item
        thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished());

        assert_eq!(queue.dequeue(), "a");
        producer.join().unwrap();
        assert_eq!(queue.dequeue(), "b");
    }

    #[test]
    fn empty_string_records_flow_through() {
        let queue = BoundedQueue::new(2).unwrap();
        queue.submit(String::new());
        assert_eq!(queue.dequeue(), "");
    }

    #[test]
    fn dequeue_blocks_until_an_item_arrives() {
        let queue = Arc::new(BoundedQueue::new(4).unwrap());
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.dequeue())
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!consumer.is_finished());

        queue.submit("late".to_string());
        assert_eq!(consumer.join().unwrap(), "late");
    }

    #[test]
    fn finished_signal_is_observed_by_late_waiters() {
        let queue = BoundedQueue::new(1).unwrap();
        queue.signal_finished();
        queue.wait_finished(); // must not block
    }

    #[test]
    fn single_producer_single_consumer_preserves_order_under_contention() {
        let queue = Arc::new(BoundedQueue::new(3).unwrap());
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    queue.submit(i.to_string());
                }
            })
        };

        let mut seen = Vec::with_capacity(200);
        while seen.len() < 200 {
            seen.push(queue.dequeue());
        }
        producer.join().unwrap();

        let expected: Vec<String> = (0..200).map(|i| i.to_string()).collect();
        assert_eq!(seen, expected);
    }
}
