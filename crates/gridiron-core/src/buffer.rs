//! In-memory event queue with pause/resume and batched fan-out.
//!
//! Sources push into an [`EventBuffer`] through the [`EventSink`] trait.
//! A flush takes the whole queue as one batch, empties the queue, and only
//! then hands the batch to every subscriber in registration order. Events
//! pushed from inside a subscriber land in a fresh queue and go out as the
//! next batch, after the current one has reached every subscriber.

use std::sync::{Mutex, MutexGuard, PoisonError};

use gridiron_types::NormalizedEvent;
use tracing::trace;

use crate::subscribers::{SubscriberRegistry, SubscriptionId};

/// Anything events can be pushed into.
pub trait EventSink: Send + Sync {
    /// Append events, in order.
    fn push_many(&self, events: Vec<NormalizedEvent>);
}

#[derive(Debug, Default)]
struct BufferState {
    queue: Vec<NormalizedEvent>,
    paused: bool,
    /// A flush loop is currently delivering batches.
    flushing: bool,
    /// `flush` was called while a flush loop was running.
    flush_requested: bool,
    disposed: bool,
}

/// FIFO event queue delivering batches to subscribers.
///
/// No event is delivered twice, and none is dropped except by
/// [`EventBuffer::clear`] or [`EventBuffer::dispose`].
#[derive(Debug, Default)]
pub struct EventBuffer {
    state: Mutex<BufferState>,
    subscribers: SubscriberRegistry<[NormalizedEvent]>,
}

impl EventBuffer {
    /// Create an empty, unpaused buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a batch handler.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&[NormalizedEvent]) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(handler)
    }

    /// Cancel a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Append events and, unless paused, flush immediately.
    pub fn push_many(&self, events: Vec<NormalizedEvent>) {
        let auto_flush = {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            state.queue.extend(events);
            !state.paused
        };
        if auto_flush {
            self.flush();
        }
    }

    /// Deliver everything currently queued as one batch.
    ///
    /// Batches queued by subscribers during delivery follow as separate
    /// batches while the buffer is not paused.
    pub fn flush(&self) {
        let mut batch = {
            let mut state = self.lock();
            if state.flushing {
                state.flush_requested = true;
                return;
            }
            state.flushing = true;
            std::mem::take(&mut state.queue)
        };

        loop {
            if !batch.is_empty() {
                trace!(len = batch.len(), "flushing event batch");
                self.subscribers.dispatch(&batch);
            }

            let mut state = self.lock();
            let requested = std::mem::take(&mut state.flush_requested);
            if state.queue.is_empty() || (state.paused && !requested) || state.disposed {
                state.flushing = false;
                return;
            }
            batch = std::mem::take(&mut state.queue);
        }
    }

    /// Stop flushing automatically. Pushed events accumulate.
    pub fn pause(&self) {
        self.lock().paused = true;
    }

    /// Resume automatic flushing and flush everything accumulated.
    pub fn resume(&self) {
        self.lock().paused = false;
        self.flush();
    }

    /// Whether automatic flushing is suspended.
    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Number of queued, undelivered events.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Drop every queued event without delivering it.
    pub fn clear(&self) {
        self.lock().queue.clear();
    }

    /// Drop queued events and subscribers. Later pushes are ignored.
    pub fn dispose(&self) {
        {
            let mut state = self.lock();
            state.disposed = true;
            state.queue.clear();
        }
        self.subscribers.clear();
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for EventBuffer {
    fn push_many(&self, events: Vec<NormalizedEvent>) {
        Self::push_many(self, events);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use gridiron_types::EventKind;
    use std::sync::Arc;

    fn clock(seq: u64) -> NormalizedEvent {
        NormalizedEvent::new(seq, 0, EventKind::ClockUpdate { clock_ms: 0 })
    }

    fn seqs(batch: &[NormalizedEvent]) -> Vec<u64> {
        batch.iter().map(|e| e.seq).collect()
    }

    fn recording(buffer: &EventBuffer) -> Arc<Mutex<Vec<Vec<u64>>>> {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&batches);
        buffer.subscribe(move |batch| sink.lock().unwrap().push(seqs(batch)));
        batches
    }

    #[test]
    fn push_flushes_immediately_when_unpaused() {
        let buffer = EventBuffer::new();
        let batches = recording(&buffer);
        buffer.push_many(vec![clock(1), clock(2)]);
        buffer.push_many(vec![clock(3)]);
        assert_eq!(*batches.lock().unwrap(), vec![vec![1, 2], vec![3]]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn paused_pushes_accumulate_and_resume_flushes_once() {
        let buffer = EventBuffer::new();
        let batches = recording(&buffer);
        buffer.pause();
        buffer.push_many(vec![clock(1)]);
        buffer.push_many(vec![clock(2), clock(3)]);
        buffer.push_many(vec![clock(4)]);
        assert!(batches.lock().unwrap().is_empty());
        assert_eq!(buffer.len(), 4);

        buffer.resume();
        assert_eq!(*batches.lock().unwrap(), vec![vec![1, 2, 3, 4]]);
    }

    #[test]
    fn explicit_flush_works_while_paused() {
        let buffer = EventBuffer::new();
        let batches = recording(&buffer);
        buffer.pause();
        buffer.push_many(vec![clock(1)]);
        buffer.flush();
        assert_eq!(*batches.lock().unwrap(), vec![vec![1]]);
        assert!(buffer.is_paused());
    }

    #[test]
    fn every_subscriber_gets_the_batch_in_registration_order() {
        let buffer = EventBuffer::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..3 {
            let order = Arc::clone(&order);
            buffer.subscribe(move |batch| order.lock().unwrap().push((tag, seqs(batch))));
        }
        buffer.push_many(vec![clock(9)]);
        assert_eq!(
            *order.lock().unwrap(),
            vec![(0, vec![9]), (1, vec![9]), (2, vec![9])]
        );
    }

    #[test]
    fn reentrant_push_becomes_a_separate_later_batch() {
        let buffer = Arc::new(EventBuffer::new());
        let first_log = Arc::new(Mutex::new(Vec::new()));
        let second_log = Arc::new(Mutex::new(Vec::new()));

        let inner = Arc::clone(&buffer);
        let log = Arc::clone(&first_log);
        buffer.subscribe(move |batch| {
            log.lock().unwrap().push(seqs(batch));
            if batch.iter().any(|e| e.seq == 1) {
                inner.push_many(vec![clock(100)]);
            }
        });
        let log = Arc::clone(&second_log);
        buffer.subscribe(move |batch| log.lock().unwrap().push(seqs(batch)));

        buffer.push_many(vec![clock(1), clock(2)]);

        let expected = vec![vec![1, 2], vec![100]];
        assert_eq!(*first_log.lock().unwrap(), expected);
        // The second subscriber saw the in-flight batch before the new one.
        assert_eq!(*second_log.lock().unwrap(), expected);
    }

    #[test]
    fn clear_drops_queued_events() {
        let buffer = EventBuffer::new();
        let batches = recording(&buffer);
        buffer.pause();
        buffer.push_many(vec![clock(1)]);
        buffer.clear();
        buffer.resume();
        assert!(batches.lock().unwrap().is_empty());
    }

    #[test]
    fn dispose_ignores_later_pushes() {
        let buffer = EventBuffer::new();
        let batches = recording(&buffer);
        buffer.dispose();
        buffer.push_many(vec![clock(1)]);
        assert!(batches.lock().unwrap().is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn unsubscribed_handler_stops_receiving() {
        let buffer = EventBuffer::new();
        let batches = Arc::new(Mutex::new(0_usize));
        let count = Arc::clone(&batches);
        let id = buffer.subscribe(move |_| *count.lock().unwrap() += 1);
        buffer.push_many(vec![clock(1)]);
        assert!(buffer.unsubscribe(id));
        buffer.push_many(vec![clock(2)]);
        assert_eq!(*batches.lock().unwrap(), 1);
    }
}
