use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::event::Event;

#[derive(Default)]
struct Lanes {
    priority: VecDeque<Event>,
    default: VecDeque<Event>,
    closed: bool,
}

/// A transport worker's priority/default queue pair.
///
/// The priority lane is always drained first. Once closed, `pop` keeps returning queued
/// events until both lanes are empty and only then reports the end of input.
#[derive(Default)]
pub(crate) struct EventQueue {
    lanes: Mutex<Lanes>,
    ready: Condvar,
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Lanes> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, event: Event) {
        let mut lanes = self.lock();
        if event.priority {
            lanes.priority.push_back(event);
        } else {
            lanes.default.push_back(event);
        }
        drop(lanes);
        self.ready.notify_one();
    }

    /// Puts a failed priority event back at the head of the priority lane.
    pub(crate) fn requeue_front(&self, event: Event) {
        self.lock().priority.push_front(event);
        self.ready.notify_one();
    }

    /// Marks the end of input. Already queued events are still handed out.
    pub(crate) fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    /// Next event, priority lane first. Idles for up to `idle` between checks while empty;
    /// returns `None` once closed and fully drained.
    pub(crate) fn pop(&self, idle: Duration) -> Option<Event> {
        let mut lanes = self.lock();
        loop {
            if let Some(event) = lanes.priority.pop_front() {
                return Some(event);
            }
            if let Some(event) = lanes.default.pop_front() {
                return Some(event);
            }
            if lanes.closed {
                return None;
            }
            lanes = self
                .ready
                .wait_timeout(lanes, idle)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use serde_json::Value;

    use super::*;

    fn event(key: &str, priority: bool) -> Event {
        Event::new(key, Value::Null, "c").with_priority(priority)
    }

    #[test]
    fn test_priority_lane_served_first() {
        let queue = EventQueue::new();
        queue.push(event("ping-1", false));
        queue.push(event("fact-1", true));
        queue.push(event("ping-2", false));
        queue.push(event("fact-2", true));
        queue.close();

        let idle = Duration::from_millis(1);
        let keys: Vec<String> = std::iter::from_fn(|| queue.pop(idle)).map(|e| e.key).collect();
        assert_eq!(keys, vec!["fact-1", "fact-2", "ping-1", "ping-2"]);
    }

    #[test]
    fn test_requeue_goes_to_front() {
        let queue = EventQueue::new();
        queue.push(event("b", true));
        queue.requeue_front(event("a", true));
        let idle = Duration::from_millis(1);
        assert_eq!(queue.pop(idle).unwrap().key, "a");
        assert_eq!(queue.pop(idle).unwrap().key, "b");
    }

    #[test]
    fn test_close_drains_before_ending() {
        let queue = Arc::new(EventQueue::new());
        let reader = {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut seen = 0;
                while queue.pop(Duration::from_millis(5)).is_some() {
                    seen += 1;
                }
                seen
            })
        };
        for i in 0..50 {
            queue.push(event(&i.to_string(), i % 3 == 0));
        }
        queue.close();
        assert_eq!(reader.join().unwrap(), 50);
    }
}
