#![deny(missing_docs)]
//! Replacing merge over sorted Arrow `RecordBatch` inputs.
//!
//! [`ReplacingSortedMerge`] merges any number of inputs, each sorted by the
//! same key, and keeps exactly one row per distinct key: the row with the
//! greatest version, or the last one scanned when versions tie. With cleanup
//! enabled, keys whose surviving row is tombstoned disappear from the output.
//!
//! The merge itself never performs I/O. It is a step function driven by the
//! caller through [`Status::NeedInput`] requests; [`merge_batches`] and
//! [`ReplacingMergeStream`] are ready-made drivers for in-memory inputs and
//! async batch streams.

mod chunk;
mod driver;
mod error;
mod key;
mod merge;
mod observability;
mod option;
mod schema;

/// Per-row provenance log recorded during a merge.
pub mod provenance;

#[cfg(feature = "stream")]
mod stream;

#[cfg(test)]
mod test_util;

pub use crate::{
    chunk::{Chunk, Input},
    driver::merge_batches,
    error::MergeError,
    key::SortColumn,
    merge::{MergeStats, ReplacingSortedMerge, Status},
    option::{MergeOptions, NanOrdering, DEFAULT_MAX_BLOCK_ROWS},
    provenance::{RowSource, RowSourceBuffer, RowSourceSink, RowSourceWriter},
};

#[cfg(feature = "stream")]
pub use crate::stream::ReplacingMergeStream;
