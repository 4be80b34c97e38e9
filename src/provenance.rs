//! Row source log.
//!
//! One fixed-size record per input row the merge looked at: which input it
//! came from and whether it was superseded. Downstream index maintenance
//! replays this log to map output rows back to input rows.

use std::{
    io::{self, Write},
    sync::{Arc, Mutex, MutexGuard},
};

use crate::error::MergeError;

/// Largest number of inputs a [`RowSource`] can address.
pub const MAX_ROW_SOURCE_INPUTS: usize = 0x80;

const SKIP_FLAG: u8 = 0x80;
const SOURCE_MASK: u8 = 0x7F;

/// Provenance record: low 7 bits hold the input index, the high bit the skip flag.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowSource(u8);

impl RowSource {
    /// Build a record for `source`.
    ///
    /// # Errors
    /// [`MergeError::TooManyInputs`] if `source` does not fit in 7 bits.
    pub fn try_new(source: usize, skip: bool) -> Result<Self, MergeError> {
        if source >= MAX_ROW_SOURCE_INPUTS {
            return Err(MergeError::TooManyInputs {
                max: MAX_ROW_SOURCE_INPUTS,
                actual: source + 1,
            });
        }
        Ok(Self::new(source, skip))
    }

    /// The merge validates its input count against [`MAX_ROW_SOURCE_INPUTS`]
    /// before writing any record.
    pub(crate) fn new(source: usize, skip: bool) -> Self {
        debug_assert!(source < MAX_ROW_SOURCE_INPUTS, "row source {source} out of range");
        let mut row_source = Self(source as u8 & SOURCE_MASK);
        row_source.set_skip(skip);
        row_source
    }

    /// Decode a record written with [`RowSource::as_byte`].
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Input index the row was read from.
    pub fn source(self) -> usize {
        (self.0 & SOURCE_MASK) as usize
    }

    /// `true` when the row did not make it into the output.
    pub fn skip(self) -> bool {
        self.0 & SKIP_FLAG != 0
    }

    /// Set or clear the skip flag.
    pub fn set_skip(&mut self, skip: bool) {
        if skip {
            self.0 |= SKIP_FLAG;
        } else {
            self.0 &= SOURCE_MASK;
        }
    }

    /// Encoded form.
    pub fn as_byte(self) -> u8 {
        self.0
    }
}

impl std::fmt::Debug for RowSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowSource")
            .field("source", &self.source())
            .field("skip", &self.skip())
            .finish()
    }
}

/// Destination for row source records.
pub trait RowSourceSink: Send {
    /// Append `sources` in order.
    fn write_sources(&mut self, sources: &[RowSource]) -> io::Result<()>;
}

/// In-memory row source log shared between the merge and its caller.
#[derive(Debug, Clone, Default)]
pub struct RowSourceBuffer {
    inner: Arc<Mutex<Vec<RowSource>>>,
}

impl RowSourceBuffer {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record written so far.
    pub fn snapshot(&self) -> Vec<RowSource> {
        self.lock().clone()
    }

    /// Drain the records written so far.
    pub fn take(&self) -> Vec<RowSource> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of records written so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` if nothing was written yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RowSource>> {
        // A poisoned lock still holds a consistent Vec.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RowSourceSink for RowSourceBuffer {
    fn write_sources(&mut self, sources: &[RowSource]) -> io::Result<()> {
        self.lock().extend_from_slice(sources);
        Ok(())
    }
}

/// Writes row sources as raw bytes, one byte per record.
#[derive(Debug)]
pub struct RowSourceWriter<W> {
    writer: W,
}

impl<W> RowSourceWriter<W>
where
    W: Write + Send,
{
    /// Wrap `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Return the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W> RowSourceSink for RowSourceWriter<W>
where
    W: Write + Send,
{
    fn write_sources(&mut self, sources: &[RowSource]) -> io::Result<()> {
        let bytes: Vec<u8> = sources.iter().map(|source| source.as_byte()).collect();
        self.writer.write_all(&bytes)
    }
}

/// Decode a byte log produced by [`RowSourceWriter`].
pub fn decode_row_sources(bytes: &[u8]) -> Vec<RowSource> {
    bytes.iter().copied().map(RowSource::from_byte).collect()
}
