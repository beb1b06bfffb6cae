//! Thread-safe priority queue for events
//!
//! `BinaryHeap` is a max-heap, so [`QueuedEvent`] reverses its ordering:
//! the lowest `(priority, sequence)` pair sits on top. The sequence is taken
//! from an atomic counter at `put`, which makes equal priorities FIFO.

use crate::event::Event;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

#[derive(Debug)]
struct QueuedEvent {
    priority: i32,
    sequence: u64,
    event: Event,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Many producers, one consumer
pub struct EventQueue {
    heap: Mutex<BinaryHeap<QueuedEvent>>,
    sequence: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Enqueue an event; returns the sequence number it was assigned
    pub fn put(&self, event: Event) -> u64 {
        let mut heap = self.heap.lock();
        // Taken under the lock so sequence order matches visibility order
        let sequence = self.sequence.fetch_add(1, AtomicOrdering::Relaxed);
        heap.push(QueuedEvent {
            priority: event.priority(),
            sequence,
            event,
        });
        sequence
    }

    /// Non-blocking pop of the most urgent event
    pub fn try_pop(&self) -> Option<Event> {
        self.heap.lock().pop().map(|q| q.event)
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    /// Remove every pending event, returning them in dispatch order
    pub fn drain(&self) -> Vec<Event> {
        let mut heap = self.heap.lock();
        let mut out = Vec::with_capacity(heap.len());
        while let Some(q) = heap.pop() {
            out.push(q.event);
        }
        out
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use std::sync::Arc;
    use std::thread;
    use std::time::SystemTime;

    fn timer(priority: i32, topic: &str) -> Event {
        Event::timer(SystemTime::UNIX_EPOCH)
            .with_priority(priority)
            .with_topic(topic)
    }

    #[test]
    fn test_lowest_priority_first() {
        let queue = EventQueue::new();
        queue.put(timer(5, "a"));
        queue.put(timer(-1, "b"));
        queue.put(timer(3, "c"));

        let topics: Vec<String> = queue.drain().iter().map(|e| e.topic().to_string()).collect();
        assert_eq!(topics, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_fifo_within_priority() {
        let queue = EventQueue::new();
        for i in 0..10 {
            queue.put(timer(1, &i.to_string()));
        }
        for i in 0..10 {
            assert_eq!(queue.try_pop().unwrap().topic(), i.to_string());
        }
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn test_exit_goes_last() {
        let queue = EventQueue::new();
        queue.put(Event::exit());
        queue.put(timer(1, "t"));
        queue.put(timer(0, "o"));

        assert_eq!(queue.try_pop().unwrap().topic(), "o");
        assert_eq!(queue.try_pop().unwrap().topic(), "t");
        assert_eq!(queue.try_pop().unwrap().kind(), EventKind::Exit);
    }

    #[test]
    fn test_concurrent_producers_no_loss() {
        let queue = Arc::new(EventQueue::new());
        let handles: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..250 {
                        queue.put(timer(i % 3, &format!("{}-{}", p, i)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(queue.len(), 1000);
        let drained = queue.drain();
        assert_eq!(drained.len(), 1000);
        assert!(drained.windows(2).all(|w| w[0].priority() <= w[1].priority()));
        assert!(queue.is_empty());
    }
}
