use arrow::{
    datatypes::{DataType, SchemaRef},
    error::ArrowError,
};
use thiserror::Error;

/// Errors raised while building or driving a replacing merge.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A configured column name is not part of the input schema.
    #[error("no such column in schema: {name}")]
    NoSuchColumn {
        /// The missing column name.
        name: String,
    },
    /// The sort key has no columns.
    #[error("sort key requires at least one column")]
    EmptySortKey,
    /// The version column has a type that cannot be compared as a version.
    #[error("unsupported data type for version column {column}: {data_type:?}")]
    UnsupportedVersionType {
        /// Version column name.
        column: String,
        /// Arrow type found in the schema.
        data_type: DataType,
    },
    /// The tombstone column is neither `UInt8` nor `Boolean`.
    #[error("unsupported data type for tombstone column {column}: {data_type:?}")]
    UnsupportedTombstoneType {
        /// Tombstone column name.
        column: String,
        /// Arrow type found in the schema.
        data_type: DataType,
    },
    /// `max_block_rows` was set to zero.
    #[error("max_block_rows must be greater than zero")]
    ZeroBlockRows,
    /// The merge was built without any inputs.
    #[error("replacing merge requires at least one input")]
    NoInputs,
    /// Row sources encode the input index in 7 bits.
    #[error("row source log supports at most {max} inputs, got {actual}")]
    TooManyInputs {
        /// Largest supported input count.
        max: usize,
        /// Configured input count.
        actual: usize,
    },
    /// A batch was supplied for an input index that does not exist.
    #[error("input index {source_index} out of bounds (num_inputs={num_inputs})")]
    SourceOutOfRange {
        /// Offending input index.
        source_index: usize,
        /// Number of configured inputs.
        num_inputs: usize,
    },
    /// A driver was given a different number of inputs than the merge was built for.
    #[error("expected {expected} inputs, got {actual}")]
    InputCountMismatch {
        /// Inputs the merge was built for.
        expected: usize,
        /// Inputs handed to the driver.
        actual: usize,
    },
    /// A supplied batch does not carry the schema the merge was built with.
    #[error("schema mismatch: expected {expected:?}, got {actual:?}")]
    SchemaMismatch {
        /// The merge schema.
        expected: SchemaRef,
        /// The incoming batch schema.
        actual: SchemaRef,
    },
    /// `merge` was called before the requested input was supplied.
    #[error("merge is waiting for input {source_index}")]
    AwaitingInput {
        /// Input the driver still has to answer.
        source_index: usize,
    },
    /// A batch was supplied for an input whose current batch is still being merged.
    #[error("input {source_index} was not requested")]
    InputNotRequested {
        /// Input the batch was supplied for.
        source_index: usize,
    },
    /// A tombstone value other than 0 or 1 was read. Aborts the merge.
    #[error("incorrect data: {column} = {value} (must be 1 or 0)")]
    InvalidTombstone {
        /// Tombstone column name.
        column: String,
        /// Rendered offending value.
        value: String,
    },
    /// Writing to the row source sink failed.
    #[error("row source write error: {0}")]
    RowSourceWrite(#[from] std::io::Error),
    /// An input stream yielded an error.
    #[error("input {source_index} failed: {error}")]
    Source {
        /// Input that failed.
        source_index: usize,
        /// Error reported by the input.
        #[source]
        error: ArrowError,
    },
    /// Arrow kernel failure while copying rows.
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}
