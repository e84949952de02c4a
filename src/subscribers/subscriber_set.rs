//! # Event fan-out from the bus to subscribers.
//!
//! [`SubscriberSet`] gives every [`Subscribe`] implementation its own bounded queue and
//! worker task, and [`SubscriberSet::forward`] feeds those queues from a bus receiver
//! for the duration of one supervisor run.
//!
//! ```text
//! Bus ──► forward(rx) ──► emit(event) ──┬──► [queue] ──► worker ──► LogWriter::on_event
//!          stops after                  └──► [queue] ──► worker ──► custom::on_event
//!          ShutdownCompleted |                                └──► panic → SubscriberPanicked
//!          GraceExceeded, then close()
//! ```
//!
//! ## Rules
//! - A full or closed queue drops the event for that subscriber only (`SubscriberOverflow`)
//! - A panicking subscriber keeps receiving later events
//! - Each subscriber sees events in bus order
//! - [`SubscriberSet::close`] returns once every queued event has been handled

use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Queue {
    subscriber: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Subscribers of one supervisor, each behind its own queue and worker.
pub struct SubscriberSet {
    queues: Vec<Queue>,
    workers: JoinSet<()>,
    bus: Bus,
}

impl SubscriberSet {
    /// Starts one worker per subscriber. Must be called from within a tokio runtime.
    ///
    /// Overflow and panic reports are published on `bus`.
    #[must_use]
    pub fn new(subscribers: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut workers = JoinSet::new();
        let queues = subscribers
            .into_iter()
            .map(|sub| {
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let subscriber = sub.name();
                workers.spawn(deliver(sub, rx, bus.clone()));
                Queue { subscriber, tx }
            })
            .collect();
        Self {
            queues,
            workers,
            bus,
        }
    }

    /// Queues `event` for every subscriber without waiting.
    pub fn emit(&self, event: &Event) {
        let event = Arc::new(event.clone());
        for q in &self.queues {
            let reason = match q.tx.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            // An overflow report that itself overflows is dropped silently.
            if event.kind != EventKind::SubscriberOverflow {
                self.bus
                    .publish(Event::subscriber_overflow(q.subscriber, reason));
            }
        }
    }

    /// Emits everything `rx` receives up to and including the event that ends the run,
    /// then closes the set.
    pub async fn forward(self, mut rx: broadcast::Receiver<Event>) {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    self.emit(&ev);
                    if ev.kind.ends_run() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber fan-out lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        self.close().await;
    }

    /// Stops accepting events and waits until every worker has drained its queue.
    pub async fn close(self) {
        let Self { queues, mut workers, .. } = self;
        drop(queues);
        while workers.join_next().await.is_some() {}
    }
}

/// Worker loop of one subscriber.
async fn deliver(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
            .catch_unwind()
            .await;
        if let Err(payload) = handled {
            bus.publish(Event::subscriber_panicked(sub.name(), panic_message(&*payload)));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    struct Counter(Arc<AtomicUsize>);

    #[async_trait]
    impl Subscribe for Counter {
        async fn on_event(&self, _ev: &Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn name(&self) -> &'static str {
            "counter"
        }
    }

    struct Panicky;

    #[async_trait]
    impl Subscribe for Panicky {
        async fn on_event(&self, _ev: &Event) {
            panic!("boom");
        }
        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    #[derive(Default)]
    struct Kinds(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Kinds {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.kind);
        }
    }

    #[tokio::test]
    async fn panicking_subscriber_is_isolated() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let seen = Arc::new(AtomicUsize::new(0));
        let set = SubscriberSet::new(
            vec![Arc::new(Panicky), Arc::new(Counter(Arc::clone(&seen)))],
            bus.clone(),
        );

        set.emit(&Event::new(EventKind::LeaderStarted));
        set.emit(&Event::new(EventKind::LeaderExited));
        set.close().await;

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert_eq!(ev.reason.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn forward_stops_after_the_run_ends() {
        let bus = Bus::new(16);
        let kinds = Arc::new(Kinds::default());
        let set = SubscriberSet::new(vec![kinds.clone() as Arc<dyn Subscribe>], bus.clone());
        let forward = tokio::spawn(set.forward(bus.subscribe()));

        bus.publish(Event::new(EventKind::FatalSuppressed));
        bus.publish(Event::new(EventKind::ShutdownCompleted));
        bus.publish(Event::new(EventKind::LeaderStarted));
        forward.await.unwrap();

        assert_eq!(
            *kinds.0.lock().unwrap(),
            [EventKind::FatalSuppressed, EventKind::ShutdownCompleted]
        );
    }
}
