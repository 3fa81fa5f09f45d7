//! Event dispatch: a router thread feeding a fixed pool of transport workers.
//!
//! ```text
//! report() --inbox--> router --+--> worker 0 [priority | default] --> sink
//!                              +--> worker 1 [priority | default] --> sink
//!                              +--> ...
//! ```

mod queue;
mod worker;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info};

pub use worker::DeliveryStats;

use crate::config::Routing;
use crate::event::{Event, Reporter};
use crate::sink::EventSink;
use queue::EventQueue;

/// How long an idle worker waits before checking its queues again.
pub const DEFAULT_IDLE: Duration = Duration::from_millis(50);

/// Events accepted but not yet delivered or dropped, across all workers.
///
/// Read without coordination; only good for heuristics.
#[derive(Debug, Clone, Default)]
pub struct Backlog(Arc<AtomicUsize>);

impl Backlog {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    fn acquire(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn release(&self) {
        // never wraps below zero even if a release races ahead of its acquire
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }
}

enum Inbound {
    Event(Event),
    Close,
}

/// Non-blocking submission handle given to the simulation.
#[derive(Clone)]
pub struct DispatchHandle {
    inbox: Sender<Inbound>,
    backlog: Backlog,
}

impl Reporter for DispatchHandle {
    fn report(&self, event: Event) {
        self.backlog.acquire();
        if self.inbox.send(Inbound::Event(event)).is_err() {
            self.backlog.release();
            error!("event reported after the dispatcher finished");
        }
    }

    fn backlog(&self) -> usize {
        self.backlog.get()
    }
}

pub struct Dispatcher {
    handle: DispatchHandle,
    router: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<DeliveryStats>>,
}

impl Dispatcher {
    /// Spawns the router and `workers` transport threads delivering to `sink`.
    pub fn start(
        sink: Arc<dyn EventSink>,
        workers: usize,
        routing: Routing,
        idle: Duration,
    ) -> Self {
        let backlog = Backlog::default();
        let (inbox, rx) = mpsc::channel();

        let pool = workers.max(1);
        let queues: Vec<Arc<EventQueue>> = (0..pool).map(|_| Arc::new(EventQueue::new())).collect();
        let workers = queues
            .iter()
            .enumerate()
            .map(|(id, queue)| {
                let queue = queue.clone();
                let sink = sink.clone();
                let backlog = backlog.clone();
                thread::spawn(move || worker::run(id, queue, sink, backlog, idle))
            })
            .collect();
        let router = thread::spawn(move || route(rx, queues, routing));

        info!("dispatcher started with {pool} workers ({routing:?} routing)");
        Self {
            handle: DispatchHandle { inbox, backlog },
            router: Some(router),
            workers,
        }
    }

    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    pub fn backlog(&self) -> usize {
        self.handle.backlog.get()
    }

    /// Stops intake and blocks until every worker has drained both of its queues.
    ///
    /// Never returns while a priority event keeps failing.
    pub fn finish(mut self) -> DeliveryStats {
        let _ = self.handle.inbox.send(Inbound::Close);
        if let Some(router) = self.router.take()
            && router.join().is_err()
        {
            error!("event router panicked");
        }

        let mut total = DeliveryStats::default();
        for worker in self.workers.drain(..) {
            match worker.join() {
                Ok(stats) => total += stats,
                Err(_) => error!("transport worker panicked"),
            }
        }
        info!(
            "dispatcher finished: {} delivered, {} retried, {} dropped",
            total.delivered, total.retried, total.dropped
        );
        total
    }
}

fn route(inbox: Receiver<Inbound>, queues: Vec<Arc<EventQueue>>, routing: Routing) {
    let mut next = 0usize;
    while let Ok(Inbound::Event(event)) = inbox.recv() {
        let index = match (routing, event.route) {
            (Routing::Sticky, Some(route)) => (route % queues.len() as u64) as usize,
            _ => {
                next = (next + 1) % queues.len();
                next
            }
        };
        queues[index].push(event);
    }
    for queue in &queues {
        queue.close();
    }
}
