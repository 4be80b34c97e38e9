//! Batches entering and leaving the merge.

use std::sync::Arc;

use arrow::{
    array::UInt32Array,
    compute::take_record_batch,
    record_batch::RecordBatch,
    row::{Row, Rows},
};

use crate::{error::MergeError, key::SortKey};

/// One batch handed to the merge for a single input.
#[derive(Debug, Clone)]
pub struct Input {
    pub(crate) batch: RecordBatch,
    pub(crate) skip_last_row: bool,
}

impl Input {
    /// Wrap a sorted batch.
    pub fn new(batch: RecordBatch) -> Self {
        Self {
            batch,
            skip_last_row: false,
        }
    }

    /// The last row continues into the next batch of this input: the merge
    /// asks for more input instead of consuming it.
    pub fn skip_last_row(self, skip_last_row: bool) -> Self {
        Self {
            skip_last_row,
            ..self
        }
    }

    /// Wrapped batch.
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }
}

impl From<RecordBatch> for Input {
    fn from(batch: RecordBatch) -> Self {
        Input::new(batch)
    }
}

/// Output of one merge step.
///
/// Materialized chunks hold the winning rows themselves. Lazy chunks hold an
/// input batch untouched plus the positions of the winners inside it; apply
/// the selection with [`Chunk::into_batch`] or as a filter of your own.
#[derive(Debug, Clone)]
pub struct Chunk {
    batch: RecordBatch,
    selection: Option<UInt32Array>,
}

impl Chunk {
    pub(crate) fn materialized(batch: RecordBatch) -> Self {
        Self {
            batch,
            selection: None,
        }
    }

    pub(crate) fn selected(batch: RecordBatch, selection: Vec<u32>) -> Self {
        Self {
            batch,
            selection: Some(UInt32Array::from(selection)),
        }
    }

    /// Batch carried by this chunk.
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Winner positions inside [`Chunk::batch`], present in lazy mode only.
    pub fn selection(&self) -> Option<&UInt32Array> {
        self.selection.as_ref()
    }

    /// Number of output rows this chunk stands for.
    pub fn num_rows(&self) -> usize {
        match &self.selection {
            Some(selection) => selection.len(),
            None => self.batch.num_rows(),
        }
    }

    /// `true` if the chunk contributes no rows.
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Batch of output rows, applying the selection if there is one.
    pub fn into_batch(self) -> Result<RecordBatch, MergeError> {
        match self.selection {
            Some(selection) => Ok(take_record_batch(&self.batch, &selection)?),
            None => Ok(self.batch),
        }
    }

    /// Split into the batch and its optional selection.
    pub fn into_parts(self) -> (RecordBatch, Option<UInt32Array>) {
        (self.batch, self.selection)
    }
}

/// Reference-counted input batch together with its encoded sort keys.
#[derive(Debug)]
pub(crate) struct SharedBatch {
    batch: RecordBatch,
    keys: Rows,
    bytes_per_row: usize,
}

impl SharedBatch {
    pub(crate) fn try_new(batch: RecordBatch, sort_key: &SortKey) -> Result<Arc<Self>, MergeError> {
        let keys = sort_key.encode(&batch)?;
        let bytes_per_row = batch
            .get_array_memory_size()
            .checked_div(batch.num_rows())
            .unwrap_or(0);
        Ok(Arc::new(Self {
            batch,
            keys,
            bytes_per_row,
        }))
    }

    pub(crate) fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub(crate) fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    pub(crate) fn key(&self, row: usize) -> Row<'_> {
        self.keys.row(row)
    }

    pub(crate) fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    /// Copy `row` into a freshly allocated one-row batch.
    ///
    /// The copy keeps the column layout, so sort-key positions stay valid.
    pub(crate) fn detach_row(&self, row: usize, sort_key: &SortKey) -> Result<Arc<Self>, MergeError> {
        let index = UInt32Array::from(vec![row as u32]);
        let single = take_record_batch(&self.batch, &index)?;
        SharedBatch::try_new(single, sort_key)
    }
}
