// rust/pipeline-core/src/data/buffer.rs

//! Bounded hand-over buffer between a producer thread and a single consumer.
//!
//! The producer appends to a shared fill queue. The consumer keeps its own
//! drain queue and, when that runs dry, swaps the whole fill queue into it in
//! one lock acquisition, so locking costs scale with the number of refills
//! rather than the number of elements.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::error::PipelineError;

/// Lifecycle of the producer feeding a [`PrefetchBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    /// No producer is attached.
    NotRunning,
    /// A producer is attached and may push more elements.
    Running,
    /// The producer ran out of elements.
    EndOfData,
    /// The producer failed; the error is held until the consumer takes it.
    Faulted,
}

impl ProducerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProducerState::EndOfData | ProducerState::Faulted)
    }
}

/// Outcome of [`PrefetchBuffer::take_batch`].
#[derive(Debug)]
pub enum Received {
    /// Elements were moved into the consumer's queue.
    Data,
    /// The producer is done and every element has been handed over.
    EndOfData,
    /// The producer failed after every earlier element was handed over.
    Faulted(PipelineError),
}

struct Shared<T> {
    fill: VecDeque<T>,
    state: ProducerState,
    error: Option<PipelineError>,
    stop_requested: bool,
}

/// One mutex over the fill queue and producer state, plus one condition
/// signalled when data arrives and one signalled when capacity frees up.
pub struct PrefetchBuffer<T> {
    capacity: usize,
    shared: Mutex<Shared<T>>,
    data_available: Condvar,
    space_available: Condvar,
}

impl<T> PrefetchBuffer<T> {
    /// Creates a buffer whose fill queue holds at most `capacity` elements.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            shared: Mutex::new(Shared {
                fill: VecDeque::with_capacity(capacity),
                state: ProducerState::NotRunning,
                error: None,
                stop_requested: false,
            }),
            data_available: Condvar::new(),
            space_available: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn state(&self) -> ProducerState {
        self.shared.lock().state
    }

    /// Number of elements waiting in the fill queue.
    pub fn len(&self) -> usize {
        self.shared.lock().fill.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks a producer as attached. Clears any earlier stop request.
    pub fn start(&self) {
        let mut shared = self.shared.lock();
        shared.state = ProducerState::Running;
        shared.stop_requested = false;
    }

    /// Appends `item`, waiting while the fill queue is at capacity.
    ///
    /// Returns the item back if a stop was requested before it could be
    /// queued.
    pub fn push(&self, item: T) -> std::result::Result<(), T> {
        let mut shared = self.shared.lock();
        while shared.fill.len() >= self.capacity && !shared.stop_requested {
            self.space_available.wait(&mut shared);
        }
        if shared.stop_requested {
            return Err(item);
        }

        shared.fill.push_back(item);
        drop(shared);
        self.data_available.notify_one();
        Ok(())
    }

    /// Records that the producer has no more elements.
    pub fn finish(&self) {
        let mut shared = self.shared.lock();
        shared.state = ProducerState::EndOfData;
        drop(shared);
        self.data_available.notify_all();
    }

    /// Records a producer failure to be relayed to the consumer once.
    pub fn fail(&self, error: PipelineError) {
        let mut shared = self.shared.lock();
        shared.state = ProducerState::Faulted;
        shared.error = Some(error);
        drop(shared);
        self.data_available.notify_all();
    }

    pub fn stop_requested(&self) -> bool {
        self.shared.lock().stop_requested
    }

    /// Asks the producer to exit and wakes it if it is waiting for space.
    pub fn request_stop(&self) {
        let mut shared = self.shared.lock();
        shared.stop_requested = true;
        drop(shared);
        self.space_available.notify_all();
        self.data_available.notify_all();
    }

    /// Moves the whole fill queue into `drain`, which must be empty, waiting
    /// until the fill queue has data or the producer has stopped producing.
    ///
    /// Buffered elements are always handed over before a terminal state is
    /// reported. A captured error is returned once; afterwards the buffer
    /// reports [`Received::EndOfData`].
    pub fn take_batch(&self, drain: &mut VecDeque<T>) -> Received {
        debug_assert!(drain.is_empty());

        let mut shared = self.shared.lock();
        loop {
            if !shared.fill.is_empty() {
                std::mem::swap(&mut shared.fill, drain);
                drop(shared);
                self.space_available.notify_one();
                tracing::trace!(count = drain.len(), "took prefetched batch");
                return Received::Data;
            }

            match shared.state {
                ProducerState::EndOfData => return Received::EndOfData,
                ProducerState::Faulted => {
                    return match shared.error.take() {
                        Some(error) => Received::Faulted(error),
                        None => Received::EndOfData,
                    };
                }
                // A consumer that waits on an idle buffer would never wake.
                ProducerState::NotRunning => return Received::EndOfData,
                ProducerState::Running => {
                    self.data_available.wait(&mut shared);
                }
            }
        }
    }

    /// Appends every element still in the fill queue to `drain` without
    /// waiting. Used once the producer has been joined.
    pub fn drain_into(&self, drain: &mut VecDeque<T>) {
        let mut shared = self.shared.lock();
        drain.extend(shared.fill.drain(..));
    }

    /// After the producer has been joined, detaches it while keeping a
    /// terminal state (and a pending error) for the consumer to observe.
    pub fn detach(&self) {
        let mut shared = self.shared.lock();
        if shared.state == ProducerState::Running {
            shared.state = ProducerState::NotRunning;
        }
        shared.stop_requested = false;
    }

    /// Discards all buffered elements, any pending error and the producer
    /// state.
    pub fn clear(&self) {
        let mut shared = self.shared.lock();
        shared.fill.clear();
        shared.state = ProducerState::NotRunning;
        shared.error = None;
        shared.stop_requested = false;
    }
}
