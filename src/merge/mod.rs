//! Replacing merge: k-way merge that keeps one row per sort key.
//!
//! Among rows sharing a sort key the row with the greatest version wins; on
//! equal versions the row scanned last wins. With cleanup enabled, groups
//! whose winner is tombstoned are dropped entirely.
//!
//! The merge is a resumable step function. Every call to
//! [`ReplacingSortedMerge::merge`] runs until it either needs a new batch for
//! one input or has a chunk to hand out; all state is consistent between calls.

mod merged;
mod queue;
mod row_ref;

use std::{
    cmp::Ordering,
    sync::{
        atomic::{self, AtomicU64},
        Arc,
    },
};

use arrow::datatypes::SchemaRef;

use self::{
    merged::MergedData,
    queue::{MergeQueue, SortCursor},
    row_ref::{RowRef, SelectedRow},
};
use crate::{
    chunk::{Chunk, Input, SharedBatch},
    error::MergeError,
    key::SortKey,
    observability::{log_debug, log_info, log_trace, log_warn},
    option::MergeOptions,
    provenance::{RowSource, RowSourceSink, MAX_ROW_SOURCE_INPUTS},
    schema::ReplacingColumns,
};

/// Result of one merge step.
#[derive(Debug)]
pub enum Status {
    /// Supply the next batch of this input with [`ReplacingSortedMerge::consume`].
    NeedInput(usize),
    /// Output produced by this step.
    Chunk {
        /// Merged rows, or an input batch plus selection in lazy mode.
        chunk: Chunk,
        /// No further output follows.
        is_final: bool,
    },
}

/// Counters describing the work done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Input rows examined.
    pub rows_read: u64,
    /// Rows emitted, materialized or selected.
    pub rows_emitted: u64,
    /// Input rows belonging to groups dropped by cleanup.
    pub rows_cleaned: u64,
    /// Chunks handed out, including empty ones.
    pub chunks: u64,
    /// Winners copied out of an input batch that was released before their group closed.
    pub detached_rows: u64,
}

#[derive(Debug, Default)]
struct Source {
    /// Current batch; `None` once handed out in lazy mode or after the input ended.
    batch: Option<Arc<SharedBatch>>,
    skip_last_row: bool,
    /// Winner positions recorded on the current batch (lazy mode).
    selection: Option<Vec<u32>>,
    in_queue: bool,
}

/// Replacing merge over `num_inputs` sorted inputs.
pub struct ReplacingSortedMerge {
    schema: SchemaRef,
    sort_key: SortKey,
    columns: ReplacingColumns,
    cleanup: bool,
    lazy_selection: bool,
    sources: Vec<Source>,
    queue: MergeQueue,
    selected: SelectedRow,
    merged: MergedData,
    row_sources: Option<Box<dyn RowSourceSink>>,
    /// Row sources of the open group, written once the group resolves.
    pending_sources: Vec<RowSource>,
    group_rows: u64,
    cleanup_counter: Option<Arc<AtomicU64>>,
    awaiting: Option<usize>,
    finished: bool,
    stats: MergeStats,
}

impl std::fmt::Debug for ReplacingSortedMerge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplacingSortedMerge")
            .field("num_inputs", &self.sources.len())
            .field("lazy_selection", &self.lazy_selection)
            .field("cleanup", &self.cleanup)
            .field("awaiting", &self.awaiting)
            .field("stats", &self.stats)
            .finish()
    }
}

impl ReplacingSortedMerge {
    /// Build a merge over `num_inputs` inputs sharing `schema`.
    ///
    /// # Errors
    /// Configuration errors: unknown or mistyped columns, an empty sort key,
    /// zero inputs or a zero row cap.
    pub fn new(
        schema: SchemaRef,
        num_inputs: usize,
        options: MergeOptions,
    ) -> Result<Self, MergeError> {
        if num_inputs == 0 {
            return Err(MergeError::NoInputs);
        }
        if options.max_block_rows == 0 {
            return Err(MergeError::ZeroBlockRows);
        }
        let sort_key = SortKey::try_new(&schema, &options.sort_key)?;
        let columns = ReplacingColumns::resolve(
            &schema,
            options.version_column.as_deref(),
            options.is_deleted_column.as_deref(),
            options.version_nan_ordering,
        )?;
        let merged = MergedData::new(
            Arc::clone(&schema),
            options.max_block_rows,
            options.max_block_bytes,
            options.use_average_block_sizes,
        );

        log_debug!(
            component = "merge",
            event = "merge_built",
            num_inputs,
            lazy_selection = options.lazy_selection,
            cleanup = options.cleanup,
            version_column = ?options.version_column,
            is_deleted_column = ?options.is_deleted_column,
            max_block_rows = options.max_block_rows,
        );

        Ok(Self {
            schema,
            sort_key,
            columns,
            cleanup: options.cleanup,
            lazy_selection: options.lazy_selection,
            sources: (0..num_inputs).map(|_| Source::default()).collect(),
            queue: MergeQueue::with_capacity(num_inputs),
            selected: SelectedRow::default(),
            merged,
            row_sources: None,
            pending_sources: Vec::new(),
            group_rows: 0,
            cleanup_counter: None,
            awaiting: None,
            finished: false,
            stats: MergeStats::default(),
        })
    }

    /// Record one [`RowSource`] per examined row into `sink`.
    ///
    /// # Errors
    /// [`MergeError::TooManyInputs`] if the input count does not fit a row source.
    pub fn with_row_sources(
        mut self,
        sink: impl RowSourceSink + 'static,
    ) -> Result<Self, MergeError> {
        if self.sources.len() > MAX_ROW_SOURCE_INPUTS {
            return Err(MergeError::TooManyInputs {
                max: MAX_ROW_SOURCE_INPUTS,
                actual: self.sources.len(),
            });
        }
        self.row_sources = Some(Box::new(sink));
        Ok(self)
    }

    /// Add the number of rows of every group dropped by cleanup to `counter`.
    ///
    /// With a counter attached, row sources of dropped groups are not written.
    pub fn with_cleanup_counter(self, counter: Arc<AtomicU64>) -> Self {
        Self {
            cleanup_counter: Some(counter),
            ..self
        }
    }

    /// Schema every input batch must carry.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Number of inputs.
    pub fn num_inputs(&self) -> usize {
        self.sources.len()
    }

    /// Counters for the work done so far.
    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    /// Supply the first batch of every input. `None` marks an input without rows.
    pub fn initialize(&mut self, inputs: Vec<Option<Input>>) -> Result<(), MergeError> {
        for (source_index, input) in inputs.into_iter().enumerate() {
            self.consume(source_index, input)?;
        }
        Ok(())
    }

    /// Answer [`Status::NeedInput`]: hand over the next batch of `source_index`,
    /// or `None` when the input is exhausted. An empty batch also ends the input.
    pub fn consume(&mut self, source_index: usize, input: Option<Input>) -> Result<(), MergeError> {
        let num_inputs = self.sources.len();
        let slot = self
            .sources
            .get_mut(source_index)
            .ok_or(MergeError::SourceOutOfRange {
                source_index,
                num_inputs,
            })?;
        if slot.in_queue {
            return Err(MergeError::InputNotRequested { source_index });
        }
        if self.awaiting == Some(source_index) {
            self.awaiting = None;
        }
        debug_assert!(slot.selection.is_none());
        slot.selection = None;

        let Some(input) = input else {
            slot.batch = None;
            slot.skip_last_row = false;
            log_trace!(
                component = "merge",
                event = "source_exhausted",
                source = source_index
            );
            return Ok(());
        };
        if input.batch.schema().as_ref() != self.schema.as_ref() {
            return Err(MergeError::SchemaMismatch {
                expected: Arc::clone(&self.schema),
                actual: input.batch.schema(),
            });
        }
        let batch = SharedBatch::try_new(input.batch, &self.sort_key)?;
        let slot = &mut self.sources[source_index];
        slot.batch = Some(Arc::clone(&batch));
        slot.skip_last_row = input.skip_last_row;
        if !batch.is_empty() {
            slot.in_queue = true;
            self.queue.push(SortCursor::new(source_index, batch));
        }
        Ok(())
    }

    /// Run the merge until it needs input or has output.
    ///
    /// # Errors
    /// [`MergeError::InvalidTombstone`] aborts the merge. Calling this while a
    /// [`Status::NeedInput`] is unanswered is [`MergeError::AwaitingInput`].
    pub fn merge(&mut self) -> Result<Status, MergeError> {
        if let Some(source_index) = self.awaiting {
            return Err(MergeError::AwaitingInput { source_index });
        }

        while let Some(current) = self.queue.current() {
            let order = current.order();
            let current_is_last = current.is_last();
            let source = &self.sources[order];
            let released = source.batch.as_ref().map_or(true, |batch| batch.is_empty());
            if released || (current_is_last && source.skip_last_row) {
                return self.release_source(order);
            }

            let current_row = RowRef::from_cursor(current);
            let key_differs = self
                .selected
                .get()
                .map_or(true, |selected| !current_row.has_equal_sort_columns_with(selected));
            if key_differs {
                // The current row stays in the queue for the next call.
                if self.merged.has_enough_rows() {
                    return self.pull_merged(false);
                }
                if let Some(chunk) = self.finish_group()? {
                    return Ok(self.emit(chunk, false));
                }
            }

            // Every row starts skipped; the winner is unskipped when its group is written.
            let source_pos = self.pending_sources.len();
            if self.row_sources.is_some() {
                self.pending_sources.push(RowSource::new(order, true));
            }
            self.group_rows += 1;
            self.stats.rows_read += 1;
            if self.columns.is_deleted.is_some() {
                self.is_deleted(&current_row)?;
            }
            if self.accepts(&current_row) {
                self.selected.set(current_row, source_pos);
            }

            if current_is_last {
                return self.release_source(order);
            }
            self.queue.next();
        }

        self.finish()
    }

    /// Whether `current` replaces the selected row.
    fn accepts(&self, current: &RowRef) -> bool {
        let (Some(version), Some(selected)) = (&self.columns.version, self.selected.get()) else {
            return true;
        };
        let idx = version.index();
        // Non-strict: on equal versions the row scanned last wins.
        version.compare(
            current.column(idx).as_ref(),
            current.row(),
            selected.column(idx).as_ref(),
            selected.row(),
        ) != Ordering::Less
    }

    fn is_deleted(&self, row: &RowRef) -> Result<bool, MergeError> {
        let Some(column) = &self.columns.is_deleted else {
            return Ok(false);
        };
        column
            .is_deleted(row.column(column.index()).as_ref(), row.row())
            .inspect_err(|err| {
                log_warn!(
                    component = "merge",
                    event = "invalid_tombstone",
                    source = row.source(),
                    row = row.row(),
                    error = %err,
                );
            })
    }

    /// The cursor of `order` has no row left to offer from its current batch.
    fn release_source(&mut self, order: usize) -> Result<Status, MergeError> {
        let Some(batch) = self.sources[order]
            .batch
            .as_ref()
            .filter(|batch| self.lazy_selection && !batch.is_empty())
            .map(Arc::clone)
        else {
            return Ok(self.need_input(order));
        };

        if self.selected.points_into(&batch) {
            self.selected.detach(&self.sort_key)?;
            self.stats.detached_rows += 1;
            log_trace!(
                component = "merge",
                event = "selected_row_detached",
                source = order
            );
        }

        let slot = &mut self.sources[order];
        if let Some(selection) = slot.selection.take() {
            // The cursor stays queued; the next call finds the batch gone and asks for input.
            slot.batch = None;
            log_debug!(
                component = "merge",
                event = "lazy_chunk_emitted",
                source = order,
                batch_rows = batch.num_rows(),
                selected_rows = selection.len(),
            );
            return Ok(self.emit(Chunk::selected(batch.batch().clone(), selection), false));
        }
        Ok(self.need_input(order))
    }

    fn need_input(&mut self, order: usize) -> Status {
        log_trace!(component = "merge", event = "source_released", source = order);
        self.queue.remove_top();
        self.sources[order].in_queue = false;
        self.awaiting = Some(order);
        Status::NeedInput(order)
    }

    /// Resolve the open group: write its winner or drop it.
    ///
    /// Returns a chunk when the winner is a detached copy in lazy mode.
    fn finish_group(&mut self) -> Result<Option<Chunk>, MergeError> {
        let Some(selected) = self.selected.get() else {
            return Ok(None);
        };
        if self.cleanup && self.is_deleted(selected)? {
            self.selected.take();
            self.drop_group();
            return Ok(None);
        }
        self.insert_row()
    }

    fn drop_group(&mut self) {
        let rows = std::mem::take(&mut self.group_rows);
        self.stats.rows_cleaned += rows;
        if let Some(counter) = &self.cleanup_counter {
            counter.fetch_add(rows, atomic::Ordering::Relaxed);
            self.pending_sources.clear();
        }
        log_trace!(component = "merge", event = "group_cleaned_up", rows);
    }

    fn insert_row(&mut self) -> Result<Option<Chunk>, MergeError> {
        if self.selected.get().is_none() {
            return Ok(None);
        }
        // The winner stays selected until its row sources are written.
        if let Some(sink) = self.row_sources.as_mut() {
            if let Some(entry) = self.pending_sources.get_mut(self.selected.source_pos()) {
                entry.set_skip(false);
            }
            sink.write_sources(&self.pending_sources)?;
            self.pending_sources.clear();
        }
        let Some((row, detached)) = self.selected.take() else {
            return Ok(None);
        };
        self.group_rows = 0;
        self.stats.rows_emitted += 1;

        if !self.lazy_selection {
            self.merged.insert_row(&row);
            return Ok(None);
        }
        if detached {
            return Ok(Some(Chunk::selected(
                row.batch().batch().clone(),
                vec![row.row() as u32],
            )));
        }
        let slot = &mut self.sources[row.source()];
        debug_assert!(slot
            .batch
            .as_ref()
            .is_some_and(|batch| Arc::ptr_eq(batch, row.batch())));
        slot.selection
            .get_or_insert_with(Vec::new)
            .push(row.row() as u32);
        Ok(None)
    }

    /// All inputs are exhausted.
    fn finish(&mut self) -> Result<Status, MergeError> {
        if self.merged.has_enough_rows() {
            return self.pull_merged(false);
        }
        let lazy_chunk = self.finish_group()?;
        if lazy_chunk.is_none() && self.merged.has_enough_rows() {
            return self.pull_merged(false);
        }
        self.complete()?;
        match lazy_chunk {
            Some(chunk) => Ok(self.emit(chunk, true)),
            None => self.pull_merged(true),
        }
    }

    fn complete(&mut self) -> Result<(), MergeError> {
        // Row sources of dropped groups without a cleanup counter are still owed to the log.
        if let Some(sink) = self.row_sources.as_mut() {
            if !self.pending_sources.is_empty() {
                sink.write_sources(&self.pending_sources)?;
                self.pending_sources.clear();
            }
        }
        if !self.finished {
            self.finished = true;
            let stats = self.stats;
            log_info!(
                component = "merge",
                event = "merge_finished",
                rows_read = stats.rows_read,
                rows_emitted = stats.rows_emitted,
                rows_cleaned = stats.rows_cleaned,
                detached_rows = stats.detached_rows,
            );
        }
        Ok(())
    }

    fn pull_merged(&mut self, is_final: bool) -> Result<Status, MergeError> {
        let batch = self.merged.pull()?;
        log_debug!(
            component = "merge",
            event = "chunk_emitted",
            rows = batch.num_rows(),
            is_final,
        );
        Ok(self.emit(Chunk::materialized(batch), is_final))
    }

    fn emit(&mut self, chunk: Chunk, is_final: bool) -> Status {
        self.stats.chunks += 1;
        Status::Chunk { chunk, is_final }
    }
}
