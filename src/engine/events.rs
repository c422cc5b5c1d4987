//! STRATA - Mutation Event Channel
//! Bounded FIFO between the write path (producers) and the background
//! compactor (single consumer). Producers block when the channel is full.

use crossbeam_channel::{Receiver, Sender, TryRecvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A put or delete reached the MemTable.
    Mutation,
    /// Stop the consumer once every earlier event has been handled.
    Shutdown,
}

/// Producer half, cloned into every writer.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<Event>,
}

/// Consumer half, owned by the compaction engine.
pub struct EventReceiver {
    rx: Receiver<Event>,
}

/// Create a channel holding at most `capacity` pending events.
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (EventSender { tx }, EventReceiver { rx })
}

impl EventSender {
    /// Enqueue `event`, blocking while the channel is full. Returns `false`
    /// when the consumer is gone.
    pub fn send(&self, event: Event) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(_) => {
                log::warn!("compactor is gone, dropping {:?} event", event);
                false
            }
        }
    }

    pub fn notify_mutation(&self) -> bool {
        self.send(Event::Mutation)
    }

    pub fn shutdown(&self) -> bool {
        self.send(Event::Shutdown)
    }
}

/// What one drain of the channel produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Batch {
    /// Mutation events collapsed into this batch.
    pub mutations: usize,
    /// A shutdown was seen; nothing after it was consumed.
    pub shutdown: bool,
}

impl EventReceiver {
    /// Block for the next event, then take everything already queued behind
    /// it. Returns `None` once every sender is dropped.
    pub fn recv_batch(&self) -> Option<Batch> {
        let first = self.rx.recv().ok()?;
        let mut batch = Batch::default();
        if self.absorb(&mut batch, first) {
            return Some(batch);
        }
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    if self.absorb(&mut batch, event) {
                        return Some(batch);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    return Some(batch)
                }
            }
        }
    }

    /// Take every queued event without blocking.
    pub fn try_recv_batch(&self) -> Batch {
        let mut batch = Batch::default();
        while let Ok(event) = self.rx.try_recv() {
            if self.absorb(&mut batch, event) {
                break;
            }
        }
        batch
    }

    /// Number of events waiting.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    // true when the batch must end here
    fn absorb(&self, batch: &mut Batch, event: Event) -> bool {
        match event {
            Event::Mutation => {
                batch.mutations += 1;
                false
            }
            Event::Shutdown => {
                batch.shutdown = true;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_events_coalesce_into_one_batch() {
        let (tx, rx) = channel(16);
        for _ in 0..5 {
            assert!(tx.notify_mutation());
        }
        assert_eq!(rx.pending(), 5);

        let batch = rx.recv_batch().unwrap();
        assert_eq!(batch.mutations, 5);
        assert!(!batch.shutdown);
        assert_eq!(rx.pending(), 0);
    }

    #[test]
    fn test_shutdown_ends_batch_in_order() {
        let (tx, rx) = channel(16);
        tx.notify_mutation();
        tx.shutdown();
        tx.notify_mutation();

        let batch = rx.recv_batch().unwrap();
        assert_eq!(batch, Batch { mutations: 1, shutdown: true });
        assert_eq!(rx.pending(), 1);
    }

    #[test]
    fn test_try_recv_batch_on_empty_channel() {
        let (_tx, rx) = channel(4);
        assert_eq!(rx.try_recv_batch(), Batch::default());
    }

    #[test]
    fn test_send_after_consumer_dropped() {
        let (tx, rx) = channel(4);
        drop(rx);
        assert!(!tx.notify_mutation());
    }

    #[test]
    fn test_recv_returns_none_when_senders_gone() {
        let (tx, rx) = channel(4);
        drop(tx);
        assert!(rx.recv_batch().is_none());
    }

    #[test]
    fn test_full_channel_applies_backpressure() {
        let (tx, rx) = channel(1);
        tx.notify_mutation();

        let producer = thread::spawn(move || {
            // blocks until the consumer makes room
            tx.notify_mutation()
        });

        let mut seen = 0;
        while seen < 2 {
            seen += rx.recv_batch().unwrap().mutations;
        }
        assert!(producer.join().unwrap());
    }
}
