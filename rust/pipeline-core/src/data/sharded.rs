// rust/pipeline-core/src/data/sharded.rs

//! Static round-robin partitioning of a stream across parallel consumers.

use crate::config::ShardConfig;
use crate::error::Result;

use super::source::DataSource;
use super::tape::Tape;

/// Treats the upstream stream as consecutive windows of `num_shards`
/// elements and yields the element at offset `shard_index` of each window.
///
/// A window cut short by upstream exhaustion yields nothing, even when its
/// kept element was already pulled, so every shard stops after the same
/// number of complete windows. The stage holds no state of its own.
pub struct ShardedDataSource<S> {
    inner: S,
    shard_index: usize,
    num_shards: usize,
}

impl<S: DataSource> ShardedDataSource<S> {
    /// Creates a shard stage over `inner`.
    ///
    /// # Errors
    ///
    /// Returns an error if `num_shards` is zero or `shard_index` is out of
    /// range.
    pub fn new(inner: S, shard_index: usize, num_shards: usize) -> Result<Self> {
        Self::with_config(inner, &ShardConfig::new(shard_index, num_shards))
    }

    pub fn with_config(inner: S, config: &ShardConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner,
            shard_index: config.shard_index,
            num_shards: config.num_shards,
        })
    }

    pub fn shard_index(&self) -> usize {
        self.shard_index
    }

    pub fn num_shards(&self) -> usize {
        self.num_shards
    }

    /// Pulls and discards `count` upstream elements. Returns false if the
    /// upstream ran out first.
    fn skip(&mut self, count: usize) -> Result<bool> {
        for _ in 0..count {
            if self.inner.next()?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl<S: DataSource> DataSource for ShardedDataSource<S> {
    type Item = S::Item;

    fn next(&mut self) -> Result<Option<S::Item>> {
        if !self.skip(self.shard_index)? {
            return Ok(None);
        }

        let Some(item) = self.inner.next()? else {
            return Ok(None);
        };

        if !self.skip(self.num_shards - self.shard_index - 1)? {
            return Ok(None);
        }

        Ok(Some(item))
    }

    fn reset(&mut self) -> Result<()> {
        self.inner.reset()
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        self.inner.record_position(tape)
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        self.inner.reload_position(tape)
    }
}
