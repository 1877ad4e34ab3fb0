// rust/pipeline-core/src/data/source.rs

use crate::error::{PipelineError, Result};

use super::tape::Tape;

/// A pull-based pipeline stage.
///
/// Every stage other than a root source exclusively owns exactly one upstream
/// stage and forwards `reset`, `record_position` and `reload_position` to it
/// after handling its own state.
pub trait DataSource {
    /// Element type produced by this stage.
    type Item;

    /// Pulls the next element.
    ///
    /// Returns `Ok(None)` once the stage is exhausted. Every later call
    /// returns `Ok(None)` as well until [`DataSource::reset`] is called.
    fn next(&mut self) -> Result<Option<Self::Item>>;

    /// Returns this stage, and transitively its upstream, to the state it had
    /// right after construction.
    fn reset(&mut self) -> Result<()>;

    /// Appends the state needed to resume at the current position, then
    /// delegates to the upstream stage.
    ///
    /// This never changes which element the next call to
    /// [`DataSource::next`] returns.
    fn record_position(&mut self, tape: &mut Tape) -> Result<()>;

    /// Reads back the values written by a matching
    /// [`DataSource::record_position`], then delegates to the upstream stage.
    ///
    /// Must be called on a freshly constructed or reset pipeline of the same
    /// shape as the one that recorded `tape`.
    fn reload_position(&mut self, tape: &mut Tape) -> Result<()>;

    /// Borrows this stage as a std [`Iterator`] of `Result<Item>`.
    fn iter(&mut self) -> DataSourceIter<'_, Self>
    where
        Self: Sized,
    {
        DataSourceIter {
            source: self,
            done: false,
        }
    }
}

impl<S: DataSource + ?Sized> DataSource for Box<S> {
    type Item = S::Item;

    fn next(&mut self) -> Result<Option<Self::Item>> {
        (**self).next()
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        (**self).record_position(tape)
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        (**self).reload_position(tape)
    }
}

/// Iterator adapter returned by [`DataSource::iter`].
///
/// Yields `Ok(item)` for each element, `Err(e)` for a failed pull, and stops
/// after the first exhausted pull.
pub struct DataSourceIter<'a, S> {
    source: &'a mut S,
    done: bool,
}

impl<S: DataSource> Iterator for DataSourceIter<'_, S> {
    type Item = Result<S::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.source.next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Records the position of `source` into a new tape.
pub fn save_position<S: DataSource + ?Sized>(source: &mut S) -> Result<Tape> {
    let mut tape = Tape::new();
    source.record_position(&mut tape)?;
    Ok(tape)
}

/// Reloads `source` from the start of `tape`.
///
/// # Errors
///
/// Besides any error raised while reading, fails with a position mismatch if
/// `tape` holds more values than the pipeline consumed, which means it was
/// recorded by a pipeline of a different shape.
pub fn load_position<S: DataSource + ?Sized>(source: &mut S, tape: &mut Tape) -> Result<()> {
    tape.rewind();
    source.reload_position(tape)?;

    if tape.remaining() > 0 {
        return Err(PipelineError::position_mismatch(
            tape.position(),
            "end of tape",
            format!("{} unread values", tape.remaining()),
        ));
    }

    Ok(())
}
