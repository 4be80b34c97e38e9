use crate::key::SortColumn;

/// Default row cap for materialized output chunks.
pub const DEFAULT_MAX_BLOCK_ROWS: usize = 8192;

/// How NaN compares against other version values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NanOrdering {
    /// NaN loses against every non-NaN version.
    #[default]
    Smallest,
    /// NaN wins against every non-NaN version.
    Greatest,
}

/// Configuration of one replacing merge, fixed for its whole lifetime.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub(crate) sort_key: Vec<SortColumn>,
    pub(crate) version_column: Option<String>,
    pub(crate) is_deleted_column: Option<String>,
    pub(crate) max_block_rows: usize,
    pub(crate) max_block_bytes: Option<usize>,
    pub(crate) use_average_block_sizes: bool,
    pub(crate) cleanup: bool,
    pub(crate) lazy_selection: bool,
    pub(crate) version_nan_ordering: NanOrdering,
}

impl<I> From<I> for MergeOptions
where
    I: IntoIterator<Item = SortColumn>,
{
    fn from(sort_key: I) -> Self {
        MergeOptions {
            sort_key: sort_key.into_iter().collect(),
            version_column: None,
            is_deleted_column: None,
            max_block_rows: DEFAULT_MAX_BLOCK_ROWS,
            max_block_bytes: None,
            use_average_block_sizes: false,
            cleanup: false,
            lazy_selection: false,
            version_nan_ordering: NanOrdering::default(),
        }
    }
}

impl MergeOptions {
    /// Among rows with an equal sort key, the greatest value of this column wins.
    pub fn version_column(self, name: impl Into<String>) -> Self {
        MergeOptions {
            version_column: Some(name.into()),
            ..self
        }
    }

    /// Boolean-like column marking a row as deleted.
    pub fn is_deleted_column(self, name: impl Into<String>) -> Self {
        MergeOptions {
            is_deleted_column: Some(name.into()),
            ..self
        }
    }

    /// Maximum number of rows in one materialized output chunk.
    pub fn max_block_rows(self, max_block_rows: usize) -> Self {
        MergeOptions {
            max_block_rows,
            ..self
        }
    }

    /// Estimated byte size after which a materialized chunk is returned.
    pub fn max_block_bytes(self, max_block_bytes: usize) -> Self {
        MergeOptions {
            max_block_bytes: Some(max_block_bytes),
            ..self
        }
    }

    /// Return a chunk once it holds as many rows as the average input batch.
    pub fn use_average_block_sizes(self, use_average_block_sizes: bool) -> Self {
        MergeOptions {
            use_average_block_sizes,
            ..self
        }
    }

    /// Drop key groups whose winning row is tombstoned.
    pub fn cleanup(self, cleanup: bool) -> Self {
        MergeOptions { cleanup, ..self }
    }

    /// Mark winners on their input batches instead of copying them.
    pub fn lazy_selection(self, lazy_selection: bool) -> Self {
        MergeOptions {
            lazy_selection,
            ..self
        }
    }

    /// Ordering of NaN when comparing float versions.
    pub fn version_nan_ordering(self, version_nan_ordering: NanOrdering) -> Self {
        MergeOptions {
            version_nan_ordering,
            ..self
        }
    }

    /// Columns defining row order and group membership.
    pub fn sort_key(&self) -> &[SortColumn] {
        &self.sort_key
    }

    /// Whether output chunks carry selections over input batches.
    pub fn is_lazy_selection(&self) -> bool {
        self.lazy_selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_setters() {
        let options = MergeOptions::from([SortColumn::new("id")]);
        assert_eq!(options.max_block_rows, DEFAULT_MAX_BLOCK_ROWS);
        assert!(options.max_block_bytes.is_none());
        assert!(!options.cleanup);
        assert!(!options.is_lazy_selection());
        assert_eq!(options.version_nan_ordering, NanOrdering::Smallest);

        let options = options
            .version_column("ver")
            .is_deleted_column("deleted")
            .max_block_rows(4)
            .max_block_bytes(1024)
            .cleanup(true)
            .lazy_selection(true);
        assert_eq!(options.version_column.as_deref(), Some("ver"));
        assert_eq!(options.is_deleted_column.as_deref(), Some("deleted"));
        assert_eq!(options.max_block_rows, 4);
        assert_eq!(options.max_block_bytes, Some(1024));
        assert!(options.cleanup);
        assert!(options.is_lazy_selection());
        assert_eq!(options.sort_key().len(), 1);
    }
}
