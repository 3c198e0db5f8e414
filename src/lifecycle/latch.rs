//! One-shot trigger latch.
//!
//! A latch subscribes an action to any number of event sources and runs it
//! for the first event only. Later events, from the same or another source,
//! are observed and dropped.
//!
//! # Design Decisions
//! - `consumed` is an `AtomicBool` flipped by compare-and-set, so concurrent
//!   deliveries from separate tasks or threads still run the action once
//! - One spawned task per source; a source that ends simply stops its task

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::{BoxStream, StreamExt};
use tokio::task::JoinHandle;

/// A stream of termination-causing events.
pub type EventSource<E> = BoxStream<'static, E>;

#[derive(Debug)]
pub struct TriggerLatch {
    name: &'static str,
    consumed: AtomicBool,
}

impl TriggerLatch {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            consumed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Consume the latch. Returns `true` for exactly one caller.
    pub fn fire(&self) -> bool {
        self.consumed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::Acquire)
    }

    /// Subscribe `action` to the first event among `sources`.
    ///
    /// Must be called from within a Tokio runtime. The returned handles are
    /// only needed by callers that want to abort or await the subscriptions.
    pub fn arm<E, F>(self: &Arc<Self>, sources: Vec<EventSource<E>>, action: F) -> Vec<JoinHandle<()>>
    where
        E: std::fmt::Debug + Send + 'static,
        F: Fn(E) + Send + Sync + 'static,
    {
        let action = Arc::new(action);
        tracing::debug!(latch = self.name, sources = sources.len(), "Latch armed");

        sources
            .into_iter()
            .map(|mut source| {
                let latch = Arc::clone(self);
                let action = Arc::clone(&action);
                tokio::spawn(async move {
                    while let Some(event) = source.next().await {
                        if latch.fire() {
                            tracing::debug!(latch = latch.name, event = ?event, "Latch fired");
                            action(event);
                        } else {
                            tracing::debug!(latch = latch.name, event = ?event, "Latch already consumed, ignoring event");
                        }
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn channel_source(rx: mpsc::UnboundedReceiver<u32>) -> EventSource<u32> {
        futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .boxed()
    }

    #[test]
    fn test_fire_once() {
        let latch = TriggerLatch::new("test");
        assert!(!latch.is_consumed());
        assert!(latch.fire());
        assert!(!latch.fire());
        assert!(latch.is_consumed());
    }

    #[test]
    fn test_concurrent_fire_single_winner() {
        let latch = Arc::new(TriggerLatch::new("test"));
        let winners = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let latch = latch.clone();
                let winners = winners.clone();
                std::thread::spawn(move || {
                    if latch.fire() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_arm_runs_action_once_across_sources() {
        let latch = Arc::new(TriggerLatch::new("test"));
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();

        let counter = calls.clone();
        let handles = latch.arm(vec![channel_source(rx_a), channel_source(rx_b)], move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for i in 0..5 {
            tx_a.send(i).unwrap();
            tx_b.send(i).unwrap();
        }
        drop(tx_a);
        drop(tx_b);
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .unwrap()
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(latch.is_consumed());
    }

    #[tokio::test]
    async fn test_action_receives_first_event() {
        let latch = Arc::new(TriggerLatch::new("test"));
        let (tx, rx) = mpsc::unbounded_channel();
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

        latch.arm(vec![channel_source(rx)], move |event| {
            let _ = seen_tx.send(event);
        });
        tx.send(7).unwrap();
        tx.send(8).unwrap();

        assert_eq!(seen_rx.recv().await, Some(7));
        drop(tx);
        assert_eq!(seen_rx.recv().await, None);
    }
}
