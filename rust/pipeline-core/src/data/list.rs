// rust/pipeline-core/src/data/list.rs

use crate::error::Result;

use super::source::DataSource;
use super::tape::Tape;

/// A root stage that yields clones of the elements of an in-memory list.
#[derive(Debug, Clone)]
pub struct ListDataSource<T> {
    items: Vec<T>,
    cursor: usize,
}

impl<T: Clone> ListDataSource<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, cursor: 0 }
    }

    /// Number of elements pulled since the last reset.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl<T: Clone> DataSource for ListDataSource<T> {
    type Item = T;

    fn next(&mut self) -> Result<Option<T>> {
        let item = self.items.get(self.cursor).cloned();
        if item.is_some() {
            self.cursor += 1;
        }
        Ok(item)
    }

    fn reset(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        tape.record(&self.cursor);
        Ok(())
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        self.cursor = tape.read()?;
        Ok(())
    }
}
