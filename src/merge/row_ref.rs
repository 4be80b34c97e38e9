use std::sync::Arc;

use arrow::{array::ArrayRef, row::Row};

use super::queue::SortCursor;
use crate::{chunk::SharedBatch, error::MergeError, key::SortKey};

/// Handle to one row of a shared batch.
///
/// Holding a `RowRef` keeps the whole batch alive.
#[derive(Debug, Clone)]
pub(crate) struct RowRef {
    batch: Arc<SharedBatch>,
    row: usize,
    source: usize,
}

impl RowRef {
    pub(crate) fn new(batch: Arc<SharedBatch>, row: usize, source: usize) -> Self {
        Self { batch, row, source }
    }

    pub(crate) fn from_cursor(cursor: &SortCursor) -> Self {
        Self::new(Arc::clone(cursor.batch()), cursor.row(), cursor.order())
    }

    pub(crate) fn batch(&self) -> &Arc<SharedBatch> {
        &self.batch
    }

    pub(crate) fn row(&self) -> usize {
        self.row
    }

    pub(crate) fn source(&self) -> usize {
        self.source
    }

    pub(crate) fn column(&self, idx: usize) -> &ArrayRef {
        self.batch.batch().column(idx)
    }

    pub(crate) fn key(&self) -> Row<'_> {
        self.batch.key(self.row)
    }

    pub(crate) fn has_equal_sort_columns_with(&self, other: &RowRef) -> bool {
        self.key() == other.key()
    }
}

/// Best candidate of the key group being merged.
#[derive(Debug, Default)]
pub(crate) struct SelectedRow {
    row: Option<RowRef>,
    /// The row lives in a one-row copy instead of its input batch.
    detached: bool,
    /// Slot of the row in the pending row source buffer.
    source_pos: usize,
}

impl SelectedRow {
    pub(crate) fn get(&self) -> Option<&RowRef> {
        self.row.as_ref()
    }

    pub(crate) fn source_pos(&self) -> usize {
        self.source_pos
    }

    pub(crate) fn set(&mut self, row: RowRef, source_pos: usize) {
        self.row = Some(row);
        self.detached = false;
        self.source_pos = source_pos;
    }

    pub(crate) fn take(&mut self) -> Option<(RowRef, bool)> {
        let detached = std::mem::take(&mut self.detached);
        self.row.take().map(|row| (row, detached))
    }

    /// Whether the selected row points into `batch`.
    pub(crate) fn points_into(&self, batch: &Arc<SharedBatch>) -> bool {
        self.row
            .as_ref()
            .is_some_and(|row| Arc::ptr_eq(row.batch(), batch))
    }

    /// Re-point the selection at a one-row copy so it no longer depends on its input batch.
    pub(crate) fn detach(&mut self, sort_key: &SortKey) -> Result<(), MergeError> {
        let Some(row) = self.row.as_mut() else {
            return Ok(());
        };
        let copy = row.batch.detach_row(row.row, sort_key)?;
        *row = RowRef::new(copy, 0, row.source);
        self.detached = true;
        Ok(())
    }
}
