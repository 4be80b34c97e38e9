//! Output accumulator for materializing mode.

use std::sync::Arc;

use arrow::{
    array::{Array, ArrayRef},
    compute::interleave,
    datatypes::SchemaRef,
    record_batch::RecordBatch,
};

use super::row_ref::RowRef;
use crate::{chunk::SharedBatch, error::MergeError};

/// Winning rows collected for the next output chunk, bounded by row and byte caps.
///
/// Rows are not copied on insert: the accumulator keeps the source batches
/// alive and gathers all rows with one `interleave` per column on [`MergedData::pull`].
#[derive(Debug)]
pub(crate) struct MergedData {
    schema: SchemaRef,
    batches: Vec<Arc<SharedBatch>>,
    indices: Vec<(usize, usize)>,
    merged_bytes: usize,
    sum_blocks_granularity: usize,
    max_block_rows: usize,
    max_block_bytes: Option<usize>,
    use_average_block_sizes: bool,
}

impl MergedData {
    pub(crate) fn new(
        schema: SchemaRef,
        max_block_rows: usize,
        max_block_bytes: Option<usize>,
        use_average_block_sizes: bool,
    ) -> Self {
        Self {
            schema,
            batches: Vec::new(),
            indices: Vec::with_capacity(max_block_rows.min(8192)),
            merged_bytes: 0,
            sum_blocks_granularity: 0,
            max_block_rows,
            max_block_bytes,
            use_average_block_sizes,
        }
    }

    pub(crate) fn merged_rows(&self) -> usize {
        self.indices.len()
    }

    pub(crate) fn insert_row(&mut self, row: &RowRef) {
        let batch = row.batch();
        let batch_idx = match self
            .batches
            .iter()
            .rposition(|existing| Arc::ptr_eq(existing, batch))
        {
            Some(idx) => idx,
            None => {
                self.batches.push(Arc::clone(batch));
                self.batches.len() - 1
            }
        };
        self.indices.push((batch_idx, row.row()));
        self.merged_bytes += batch.bytes_per_row();
        self.sum_blocks_granularity += batch.num_rows();
    }

    /// Whether the chunk must be returned before another row is inserted.
    pub(crate) fn has_enough_rows(&self) -> bool {
        let merged_rows = self.merged_rows();
        if merged_rows >= self.max_block_rows {
            return true;
        }
        if self
            .max_block_bytes
            .is_some_and(|cap| merged_rows > 0 && self.merged_bytes >= cap)
        {
            return true;
        }
        if !self.use_average_block_sizes || merged_rows == 0 {
            return false;
        }
        // Aim for chunks as large as the average input batch.
        merged_rows >= self.sum_blocks_granularity / merged_rows
    }

    /// Build the accumulated rows into one batch and reset.
    pub(crate) fn pull(&mut self) -> Result<RecordBatch, MergeError> {
        if self.indices.is_empty() {
            self.reset();
            return Ok(RecordBatch::new_empty(Arc::clone(&self.schema)));
        }
        let columns = (0..self.schema.fields().len())
            .map(|column_idx| {
                let arrays: Vec<&dyn Array> = self
                    .batches
                    .iter()
                    .map(|batch| batch.batch().column(column_idx).as_ref())
                    .collect();
                interleave(&arrays, &self.indices)
            })
            .collect::<Result<Vec<ArrayRef>, _>>()?;
        let batch = RecordBatch::try_new(Arc::clone(&self.schema), columns)?;
        self.reset();
        Ok(batch)
    }

    fn reset(&mut self) {
        self.batches.clear();
        self.indices.clear();
        self.merged_bytes = 0;
        self.sum_blocks_granularity = 0;
    }
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::Int32Array,
        datatypes::{DataType, Field, Schema},
    };

    use super::*;
    use crate::key::{SortColumn, SortKey};

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![Field::new("k", DataType::Int32, false)]))
    }

    fn shared(values: Vec<i32>) -> Arc<SharedBatch> {
        let sort_key = SortKey::try_new(&schema(), &[SortColumn::new("k")]).expect("key");
        let batch = RecordBatch::try_new(schema(), vec![Arc::new(Int32Array::from(values))])
            .expect("batch");
        SharedBatch::try_new(batch, &sort_key).expect("shared")
    }

    fn values(batch: &RecordBatch) -> Vec<i32> {
        batch
            .column(0)
            .as_any()
            .downcast_ref::<Int32Array>()
            .expect("i32")
            .values()
            .to_vec()
    }

    #[test]
    fn pull_interleaves_rows_from_several_batches() {
        let left = shared(vec![1, 3]);
        let right = shared(vec![2]);
        let mut merged = MergedData::new(schema(), 10, None, false);
        merged.insert_row(&RowRef::new(Arc::clone(&left), 0, 0));
        merged.insert_row(&RowRef::new(Arc::clone(&right), 0, 1));
        merged.insert_row(&RowRef::new(Arc::clone(&left), 1, 0));
        assert_eq!(merged.merged_rows(), 3);
        assert!(!merged.has_enough_rows());

        let batch = merged.pull().expect("pull");
        assert_eq!(values(&batch), vec![1, 2, 3]);
        assert_eq!(merged.merged_rows(), 0);
        assert_eq!(merged.pull().expect("empty pull").num_rows(), 0);
    }

    #[test]
    fn row_cap_and_byte_cap() {
        let batch = shared(vec![1, 2, 3]);
        let mut merged = MergedData::new(schema(), 2, None, false);
        merged.insert_row(&RowRef::new(Arc::clone(&batch), 0, 0));
        assert!(!merged.has_enough_rows());
        merged.insert_row(&RowRef::new(Arc::clone(&batch), 1, 0));
        assert!(merged.has_enough_rows());

        let mut merged = MergedData::new(schema(), 100, Some(1), false);
        assert!(!merged.has_enough_rows());
        merged.insert_row(&RowRef::new(Arc::clone(&batch), 0, 0));
        assert!(merged.has_enough_rows());
    }

    #[test]
    fn average_block_size_heuristic() {
        let small = shared(vec![1, 2]);
        let mut merged = MergedData::new(schema(), 100, None, true);
        assert!(!merged.has_enough_rows());
        merged.insert_row(&RowRef::new(Arc::clone(&small), 0, 0));
        assert!(!merged.has_enough_rows());
        merged.insert_row(&RowRef::new(Arc::clone(&small), 1, 0));
        assert!(merged.has_enough_rows());
    }
}
