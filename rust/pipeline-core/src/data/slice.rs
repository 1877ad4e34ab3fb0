// rust/pipeline-core/src/data/slice.rs

//! Windowed slice over the logical index space of an upstream stage.

use crate::config::SliceConfig;
use crate::error::Result;

use super::source::DataSource;
use super::tape::Tape;

/// Yields the upstream elements at indices `start, start + step, ...` that
/// fall below `stop`, consuming and discarding everything in between.
///
/// The only state is the number of upstream elements consumed so far, which
/// is also the only value recorded on the position tape.
pub struct SlicedDataSource<S> {
    inner: S,
    start: usize,
    stop: Option<usize>,
    step: usize,
    next_index: usize,
}

impl<S: DataSource> SlicedDataSource<S> {
    /// Creates a slice stage over `inner`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `step` is zero or `stop < start`.
    pub fn new(inner: S, start: usize, stop: Option<usize>, step: usize) -> Result<Self> {
        Self::with_config(inner, &SliceConfig::new(start, stop, step))
    }

    pub fn with_config(inner: S, config: &SliceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner,
            start: config.start,
            stop: config.stop,
            step: config.step,
            next_index: 0,
        })
    }

    /// Number of upstream elements consumed since the last reset, including
    /// skipped ones.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Upstream index of the next element this stage would yield, or `None`
    /// if that index is not representable.
    fn next_candidate(&self) -> Option<usize> {
        if self.next_index <= self.start {
            return Some(self.start);
        }
        let offset = self.next_index - self.start;
        offset
            .div_ceil(self.step)
            .checked_mul(self.step)
            .and_then(|skip| self.start.checked_add(skip))
    }
}

impl<S: DataSource> DataSource for SlicedDataSource<S> {
    type Item = S::Item;

    fn next(&mut self) -> Result<Option<S::Item>> {
        let Some(candidate) = self.next_candidate() else {
            return Ok(None);
        };
        if self.stop.is_some_and(|stop| candidate >= stop) {
            return Ok(None);
        }

        while self.next_index < candidate {
            if self.inner.next()?.is_none() {
                return Ok(None);
            }
            self.next_index += 1;
        }

        let item = self.inner.next()?;
        if item.is_some() {
            self.next_index += 1;
        }
        Ok(item)
    }

    fn reset(&mut self) -> Result<()> {
        self.next_index = 0;
        self.inner.reset()
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        tape.record(&self.next_index);
        self.inner.record_position(tape)
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        self.next_index = tape.read()?;
        self.inner.reload_position(tape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::list::ListDataSource;
    use crate::error::PipelineError;

    fn collect<S: DataSource>(source: &mut S) -> Vec<S::Item> {
        source.iter().map(|item| item.unwrap()).collect()
    }

    fn sliced(len: usize, start: usize, stop: Option<usize>, step: usize) -> SlicedDataSource<ListDataSource<usize>> {
        SlicedDataSource::new(ListDataSource::new((0..len).collect()), start, stop, step).unwrap()
    }

    #[test]
    fn test_strided_window() {
        let mut source = sliced(10, 2, Some(9), 3);
        assert_eq!(collect(&mut source), vec![2, 5, 8]);
    }

    #[test]
    fn test_step_one_is_sub_range() {
        let mut source = sliced(10, 3, Some(6), 1);
        assert_eq!(collect(&mut source), vec![3, 4, 5]);
    }

    #[test]
    fn test_unbounded_stop() {
        let mut source = sliced(10, 1, None, 4);
        assert_eq!(collect(&mut source), vec![1, 5, 9]);
    }

    #[test]
    fn test_start_beyond_upstream() {
        let mut source = sliced(3, 5, None, 1);
        assert_eq!(source.next().unwrap(), None);
        assert_eq!(source.next().unwrap(), None);
    }

    #[test]
    fn test_empty_window() {
        let mut source = sliced(10, 4, Some(4), 2);
        assert_eq!(source.next().unwrap(), None);
        // The stop bound is checked before touching upstream
        assert_eq!(source.inner().cursor(), 0);
    }

    #[test]
    fn test_counter_includes_skipped_elements() {
        let mut source = sliced(10, 2, None, 3);
        assert_eq!(source.next().unwrap(), Some(2));
        assert_eq!(source.next_index(), 3);
        assert_eq!(source.next().unwrap(), Some(5));
        assert_eq!(source.next_index(), 6);
    }

    #[test]
    fn test_exhaustion_during_skip_is_permanent() {
        let mut source = sliced(7, 0, None, 5);
        assert_eq!(source.next().unwrap(), Some(0));
        assert_eq!(source.next().unwrap(), Some(5));
        assert_eq!(source.next().unwrap(), None);
        assert_eq!(source.next().unwrap(), None);
    }

    #[test]
    fn test_unrepresentable_next_index_exhausts() {
        let mut bounded =
            SlicedDataSource::new(ListDataSource::new(vec![0, 1, 2]), 1, Some(3), usize::MAX).unwrap();
        assert_eq!(bounded.next().unwrap(), Some(1));
        assert_eq!(bounded.next().unwrap(), None);
        assert_eq!(bounded.next().unwrap(), None);
        assert_eq!(bounded.inner().cursor(), 2);

        let mut unbounded = sliced(5, usize::MAX - 1, None, usize::MAX);
        assert_eq!(unbounded.next().unwrap(), None);

        let mut wide = sliced(5, 2, None, usize::MAX - 1);
        assert_eq!(wide.next().unwrap(), Some(2));
        assert_eq!(wide.next().unwrap(), None);
    }

    #[test]
    fn test_reset_restarts_window() {
        let mut source = sliced(10, 2, Some(9), 3);
        assert_eq!(source.next().unwrap(), Some(2));
        source.reset().unwrap();
        assert_eq!(source.next_index(), 0);
        assert_eq!(collect(&mut source), vec![2, 5, 8]);
    }

    #[test]
    fn test_position_round_trip() {
        let mut source = sliced(20, 1, Some(18), 4);
        assert_eq!(source.next().unwrap(), Some(1));
        assert_eq!(source.next().unwrap(), Some(5));

        let mut tape = Tape::new();
        source.record_position(&mut tape).unwrap();
        let rest = collect(&mut source);

        let mut resumed = sliced(20, 1, Some(18), 4);
        resumed.reload_position(&mut tape).unwrap();
        assert_eq!(collect(&mut resumed), rest);
        assert_eq!(rest, vec![9, 13, 17]);
    }

    #[test]
    fn test_invalid_parameters() {
        let list = || ListDataSource::new(vec![1, 2, 3]);
        assert!(matches!(
            SlicedDataSource::new(list(), 0, None, 0),
            Err(PipelineError::Config { .. })
        ));
        assert!(matches!(
            SlicedDataSource::new(list(), 3, Some(2), 1),
            Err(PipelineError::Config { .. })
        ));
    }
}
