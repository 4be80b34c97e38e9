//! K-way ordered cursor queue over the current batch of every input.

use std::{cmp::Ordering, collections::BinaryHeap, sync::Arc};

use arrow::row::Row;

use crate::chunk::SharedBatch;

/// Position inside the current batch of one input.
#[derive(Debug, Clone)]
pub(crate) struct SortCursor {
    order: usize,
    batch: Arc<SharedBatch>,
    row: usize,
}

impl SortCursor {
    pub(crate) fn new(order: usize, batch: Arc<SharedBatch>) -> Self {
        Self {
            order,
            batch,
            row: 0,
        }
    }

    /// Input index this cursor reads from.
    pub(crate) fn order(&self) -> usize {
        self.order
    }

    pub(crate) fn batch(&self) -> &Arc<SharedBatch> {
        &self.batch
    }

    pub(crate) fn row(&self) -> usize {
        self.row
    }

    pub(crate) fn is_last(&self) -> bool {
        self.row + 1 >= self.batch.num_rows()
    }

    fn key(&self) -> Row<'_> {
        self.batch.key(self.row)
    }
}

impl PartialEq for SortCursor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortCursor {}

impl PartialOrd for SortCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortCursor {
    fn cmp(&self, other: &Self) -> Ordering {
        // Equal keys come out in input order, so later inputs are scanned later.
        self.key()
            .cmp(&other.key())
            .then(self.order.cmp(&other.order))
            .reverse()
    }
}

/// Yields the globally smallest unconsumed row across all live cursors.
#[derive(Debug, Default)]
pub(crate) struct MergeQueue {
    heap: BinaryHeap<SortCursor>,
}

impl MergeQueue {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    /// Add a cursor over a non-empty batch.
    pub(crate) fn push(&mut self, cursor: SortCursor) {
        debug_assert!(!cursor.batch.is_empty());
        self.heap.push(cursor);
    }

    pub(crate) fn current(&self) -> Option<&SortCursor> {
        self.heap.peek()
    }

    /// Move the current cursor to its next row. The cursor must not be on its last row.
    pub(crate) fn next(&mut self) {
        if let Some(mut top) = self.heap.peek_mut() {
            debug_assert!(!top.is_last());
            top.row += 1;
        }
    }

    /// Drop the current cursor; its input needs a new batch.
    pub(crate) fn remove_top(&mut self) -> Option<SortCursor> {
        self.heap.pop()
    }
}
