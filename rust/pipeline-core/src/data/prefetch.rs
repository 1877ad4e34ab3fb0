// rust/pipeline-core/src/data/prefetch.rs

//! Background prefetching for reducing upstream stalls during consumption.
//!
//! [`PrefetchedDataSource`] moves its upstream stage onto a dedicated worker
//! thread the first time it is pulled. The worker fills a bounded
//! [`PrefetchBuffer`] while the consumer drains batches of it, so the
//! consumer only blocks when the worker has fallen behind.
//!
//! Recording a position parks the worker and persists the elements it has
//! already pulled but the consumer has not seen yet, followed by the upstream
//! position. Reloading puts those elements back in front of the stream.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::PrefetchConfig;
use crate::error::{PipelineError, Result};

use super::buffer::{PrefetchBuffer, ProducerState, Received};
use super::source::DataSource;
use super::tape::{Recordable, Tape};

/// What the worker hands back when it exits.
struct WorkerExit<S: DataSource> {
    inner: S,
    /// An element pulled from upstream that could not be queued because a
    /// stop was requested.
    pending: Option<S::Item>,
}

/// A stage that pulls from its upstream on a background thread.
///
/// Elements are delivered in upstream order. An upstream error (or panic) on
/// the worker is delivered after every element pulled before it, exactly
/// once, and the stage then stays exhausted until [`DataSource::reset`].
///
/// `look_ahead` caps the worker's fill queue, not the total read-ahead. The
/// consumer may still hold a batch it swapped out earlier, and a worker
/// blocked on a full queue holds one more pulled element, so up to
/// `2 * look_ahead + 1` elements can be pulled from upstream ahead of the
/// consumer. See [`PrefetchedDataSource::buffered`].
pub struct PrefetchedDataSource<S: DataSource> {
    /// Upstream stage while no worker owns it.
    inner: Option<S>,
    worker: Option<JoinHandle<WorkerExit<S>>>,
    buffer: Arc<PrefetchBuffer<S::Item>>,
    /// Consumer-side queue, refilled from the buffer in whole batches.
    drain: VecDeque<S::Item>,
    look_ahead: usize,
    exhausted: bool,
}

impl<S> PrefetchedDataSource<S>
where
    S: DataSource + Send + 'static,
    S::Item: Send + 'static,
{
    /// Creates a prefetch stage whose worker queues up to `look_ahead`
    /// elements at a time.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `look_ahead` is zero.
    pub fn new(inner: S, look_ahead: usize) -> Result<Self> {
        Self::with_config(inner, &PrefetchConfig::new(look_ahead))
    }

    pub fn with_config(inner: S, config: &PrefetchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Some(inner),
            worker: None,
            buffer: Arc::new(PrefetchBuffer::new(config.look_ahead)),
            drain: VecDeque::new(),
            look_ahead: config.look_ahead,
            exhausted: false,
        })
    }

    fn start_worker(&mut self) -> Result<()> {
        let mut inner = self.inner.take().ok_or_else(upstream_lost)?;
        let buffer = Arc::clone(&self.buffer);

        buffer.start();
        tracing::debug!(look_ahead = self.look_ahead, "starting prefetch worker");

        let spawned = thread::Builder::new()
            .name("prefetch-worker".to_string())
            .spawn(move || {
                let pending = run_worker(&mut inner, &buffer);
                WorkerExit { inner, pending }
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                // The closure, and the upstream stage with it, is gone.
                self.buffer.clear();
                Err(PipelineError::prefetch(format!(
                    "failed to spawn prefetch worker: {e}"
                )))
            }
        }
    }
}

impl<S: DataSource> PrefetchedDataSource<S> {
    pub fn look_ahead(&self) -> usize {
        self.look_ahead
    }

    /// Lifecycle state of the background producer.
    pub fn state(&self) -> ProducerState {
        self.buffer.state()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Number of elements pulled from upstream but not yet returned.
    pub fn buffered(&self) -> usize {
        self.drain.len() + self.buffer.len()
    }

    /// Joins the worker, if any, and takes the upstream stage back. Elements
    /// the worker pulled are kept, after the ones already in the drain queue.
    fn join_worker(&mut self) -> Result<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };

        let exit = handle
            .join()
            .map_err(|_| PipelineError::prefetch("prefetch worker terminated abnormally"))?;

        self.inner = Some(exit.inner);
        self.buffer.drain_into(&mut self.drain);
        self.drain.extend(exit.pending);
        self.buffer.detach();

        tracing::debug!(buffered = self.drain.len(), "prefetch worker joined");
        Ok(())
    }

    /// Asks the worker to stop and joins it.
    fn stop_worker(&mut self) -> Result<()> {
        if self.worker.is_some() {
            self.buffer.request_stop();
        }
        self.join_worker()
    }

    fn upstream_mut(&mut self) -> Result<&mut S> {
        self.inner.as_mut().ok_or_else(upstream_lost)
    }

    fn discard_buffered(&mut self) {
        self.buffer.clear();
        self.drain.clear();
        self.exhausted = false;
    }
}

impl<S> DataSource for PrefetchedDataSource<S>
where
    S: DataSource + Send + 'static,
    S::Item: Recordable + Send + 'static,
{
    type Item = S::Item;

    fn next(&mut self) -> Result<Option<S::Item>> {
        loop {
            if let Some(item) = self.drain.pop_front() {
                return Ok(Some(item));
            }

            if self.exhausted {
                return Ok(None);
            }

            if self.worker.is_none() && self.buffer.state() == ProducerState::NotRunning {
                self.start_worker()?;
            }

            match self.buffer.take_batch(&mut self.drain) {
                Received::Data => continue,
                Received::EndOfData => {
                    self.exhausted = true;
                    self.join_worker()?;
                    return Ok(None);
                }
                Received::Faulted(error) => {
                    self.exhausted = true;
                    self.join_worker()?;
                    return Err(error);
                }
            }
        }
    }

    fn reset(&mut self) -> Result<()> {
        let stopped = self.stop_worker();
        self.discard_buffered();
        stopped?;

        self.upstream_mut()?.reset()
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        // The upstream cursor is only consistent once the worker is parked.
        self.stop_worker()?;

        tape.record(&self.drain.len());
        for item in &self.drain {
            tape.record(item);
        }

        self.upstream_mut()?.record_position(tape)
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        let stopped = self.stop_worker();
        self.discard_buffered();
        stopped?;

        let count: usize = tape.read()?;
        if count > tape.remaining() {
            return Err(PipelineError::position_mismatch(
                tape.position() - 1,
                "prefetched element count",
                format!("{count} elements with {} values left", tape.remaining()),
            ));
        }
        for _ in 0..count {
            self.drain.push_back(tape.read()?);
        }

        self.upstream_mut()?.reload_position(tape)
    }
}

impl<S: DataSource> Drop for PrefetchedDataSource<S> {
    fn drop(&mut self) {
        if let Err(e) = self.stop_worker() {
            tracing::warn!("failed to stop prefetch worker: {}", e);
        }
    }
}

/// Worker loop: pull from upstream into the buffer until end of data, an
/// error, or a stop request. Returns an element that was pulled but could
/// not be queued.
fn run_worker<S: DataSource>(inner: &mut S, buffer: &PrefetchBuffer<S::Item>) -> Option<S::Item> {
    loop {
        if buffer.stop_requested() {
            return None;
        }

        match panic::catch_unwind(AssertUnwindSafe(|| inner.next())) {
            Ok(Ok(Some(item))) => {
                if let Err(item) = buffer.push(item) {
                    return Some(item);
                }
            }
            Ok(Ok(None)) => {
                tracing::debug!("prefetch worker reached end of data");
                buffer.finish();
                return None;
            }
            Ok(Err(e)) => {
                tracing::debug!("prefetch worker captured upstream error: {}", e);
                buffer.fail(e);
                return None;
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!("upstream stage panicked on prefetch worker: {}", message);
                buffer.fail(PipelineError::worker_panicked(message));
                return None;
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn upstream_lost() -> PipelineError {
    PipelineError::prefetch("upstream stage is no longer available")
}
