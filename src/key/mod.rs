//! Sort key description and row encoding.
//!
//! Sort-key columns of every input batch are encoded once with an Arrow
//! [`RowConverter`]. Encoded rows compare bytewise in the configured order,
//! so group membership and k-way ordering never touch the columns again.

use std::sync::Arc;

use arrow::{
    array::{Array, ArrayRef, AsArray, BooleanArray},
    compute::{cast, SortOptions},
    datatypes::{DataType, Float32Type, Float64Type, SchemaRef},
    record_batch::RecordBatch,
    row::{RowConverter, Rows, SortField},
};

use crate::error::MergeError;

/// One column of the sort key.
///
/// NaNs in float columns sort together with nulls, so `nulls_first` places
/// both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortColumn {
    name: String,
    descending: bool,
    nulls_first: bool,
}

impl SortColumn {
    /// Ascending column with nulls and NaNs ordered last.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descending: false,
            nulls_first: false,
        }
    }

    /// Order this column descending.
    pub fn descending(self) -> Self {
        Self {
            descending: true,
            ..self
        }
    }

    /// Place nulls and NaNs before (`true`) or after (`false`) other values.
    pub fn nulls_first(self, nulls_first: bool) -> Self {
        Self {
            nulls_first,
            ..self
        }
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn options(&self) -> SortOptions {
        SortOptions {
            descending: self.descending,
            nulls_first: self.nulls_first,
        }
    }

    /// Order of the NaN flag that precedes a float column: `false < true`,
    /// so descending puts NaNs first.
    fn nan_options(&self) -> SortOptions {
        SortOptions {
            descending: self.nulls_first,
            nulls_first: self.nulls_first,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyEncoding {
    Plain,
    /// Encoded as a NaN flag followed by the value with NaN and zero normalized.
    Float,
}

#[derive(Debug, Clone, Copy)]
struct KeyColumn {
    index: usize,
    encoding: KeyEncoding,
}

/// Resolved sort key: column positions plus the encoder for them.
pub(crate) struct SortKey {
    columns: Vec<KeyColumn>,
    converter: RowConverter,
}

impl SortKey {
    pub(crate) fn try_new(schema: &SchemaRef, sort_key: &[SortColumn]) -> Result<Self, MergeError> {
        if sort_key.is_empty() {
            return Err(MergeError::EmptySortKey);
        }
        let mut columns = Vec::with_capacity(sort_key.len());
        let mut fields = Vec::with_capacity(sort_key.len());
        for column in sort_key {
            let (index, field) =
                schema
                    .column_with_name(column.name())
                    .ok_or_else(|| MergeError::NoSuchColumn {
                        name: column.name().to_string(),
                    })?;
            let (encoding, data_type) = match field.data_type() {
                DataType::Float16 | DataType::Float32 => (KeyEncoding::Float, DataType::Float32),
                DataType::Float64 => (KeyEncoding::Float, DataType::Float64),
                data_type => (KeyEncoding::Plain, data_type.clone()),
            };
            if encoding == KeyEncoding::Float {
                fields.push(SortField::new_with_options(
                    DataType::Boolean,
                    column.nan_options(),
                ));
            }
            fields.push(SortField::new_with_options(data_type, column.options()));
            columns.push(KeyColumn { index, encoding });
        }
        let converter = RowConverter::new(fields)?;
        Ok(Self { columns, converter })
    }

    /// Encode the sort-key columns of `batch`.
    pub(crate) fn encode(&self, batch: &RecordBatch) -> Result<Rows, MergeError> {
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len() * 2);
        for column in &self.columns {
            let array = batch.column(column.index);
            match column.encoding {
                KeyEncoding::Plain => arrays.push(Arc::clone(array)),
                KeyEncoding::Float => {
                    let (flags, values) = normalize_float(array)?;
                    arrays.push(flags);
                    arrays.push(values);
                }
            }
        }
        Ok(self.converter.convert_columns(&arrays)?)
    }
}

/// Split a float column into its NaN flags and values where every NaN is the
/// canonical NaN and `-0.0` is `0.0`. Nulls stay null in both.
fn normalize_float(array: &ArrayRef) -> Result<(ArrayRef, ArrayRef), MergeError> {
    match array.data_type() {
        DataType::Float16 => normalize_float(&cast(array, &DataType::Float32)?),
        DataType::Float32 => {
            let values = array.as_primitive::<Float32Type>();
            let flags: BooleanArray = values.iter().map(|v| v.map(f32::is_nan)).collect();
            let values = values.unary::<_, Float32Type>(|v| {
                if v.is_nan() {
                    f32::NAN
                } else if v == 0.0 {
                    0.0
                } else {
                    v
                }
            });
            Ok((Arc::new(flags), Arc::new(values)))
        }
        _ => {
            let values = array.as_primitive::<Float64Type>();
            let flags: BooleanArray = values.iter().map(|v| v.map(f64::is_nan)).collect();
            let values = values.unary::<_, Float64Type>(|v| {
                if v.is_nan() {
                    f64::NAN
                } else if v == 0.0 {
                    0.0
                } else {
                    v
                }
            });
            Ok((Arc::new(flags), Arc::new(values)))
        }
    }
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::{Float64Array, Int32Array, StringArray},
        datatypes::{Field, Schema},
    };

    use super::*;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, true),
            Field::new("id", DataType::Int32, false),
        ]))
    }

    #[test]
    fn missing_column_is_rejected() {
        let err = SortKey::try_new(&schema(), &[SortColumn::new("nope")])
            .err()
            .expect("missing column");
        assert!(matches!(err, MergeError::NoSuchColumn { name } if name == "nope"));
        assert!(matches!(
            SortKey::try_new(&schema(), &[]),
            Err(MergeError::EmptySortKey)
        ));
    }

    #[test]
    fn encoded_rows_follow_column_order() {
        let key = SortKey::try_new(
            &schema(),
            &[SortColumn::new("id").descending(), SortColumn::new("name")],
        )
        .expect("sort key");
        assert_eq!(
            key.columns.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![1, 0]
        );

        let batch = RecordBatch::try_new(
            schema(),
            vec![
                Arc::new(StringArray::from(vec![Some("b"), Some("a"), None])),
                Arc::new(Int32Array::from(vec![1, 1, 2])),
            ],
        )
        .expect("batch");
        let rows = key.encode(&batch).expect("encode");
        // id descending first, then name ascending with nulls last.
        assert!(rows.row(2) < rows.row(1));
        assert!(rows.row(1) < rows.row(0));
        assert_ne!(rows.row(0), rows.row(1));
    }

    #[test]
    fn nulls_first_moves_nulls_ahead() {
        let key = SortKey::try_new(&schema(), &[SortColumn::new("name").nulls_first(true)])
            .expect("sort key");
        let batch = RecordBatch::try_new(
            schema(),
            vec![
                Arc::new(StringArray::from(vec![Some("a"), None])),
                Arc::new(Int32Array::from(vec![1, 2])),
            ],
        )
        .expect("batch");
        let rows = key.encode(&batch).expect("encode");
        assert!(rows.row(1) < rows.row(0));
    }

    fn float_keys(values: Vec<Option<f64>>, column: SortColumn) -> Rows {
        let schema = Arc::new(Schema::new(vec![Field::new("f", DataType::Float64, true)]));
        let key = SortKey::try_new(&schema, &[column]).expect("sort key");
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Float64Array::from(values))])
            .expect("batch");
        key.encode(&batch).expect("encode")
    }

    #[test]
    fn nans_sort_with_nulls() {
        let values = vec![Some(1.0), Some(f64::NAN), None, Some(-2.0)];

        let rows = float_keys(values.clone(), SortColumn::new("f"));
        // -2.0 < 1.0 < NaN < null
        assert!(rows.row(3) < rows.row(0));
        assert!(rows.row(0) < rows.row(1));
        assert!(rows.row(1) < rows.row(2));

        let rows = float_keys(values.clone(), SortColumn::new("f").nulls_first(true));
        // null < NaN < -2.0 < 1.0
        assert!(rows.row(2) < rows.row(1));
        assert!(rows.row(1) < rows.row(3));
        assert!(rows.row(3) < rows.row(0));

        let rows = float_keys(values, SortColumn::new("f").descending().nulls_first(true));
        // null < NaN < 1.0 < -2.0
        assert!(rows.row(2) < rows.row(1));
        assert!(rows.row(1) < rows.row(0));
        assert!(rows.row(0) < rows.row(3));
    }

    #[test]
    fn signed_zeros_and_nan_payloads_are_equal_keys() {
        let other_nan = f64::from_bits(f64::NAN.to_bits() | 1);
        let negative_nan = -f64::NAN;
        let rows = float_keys(
            vec![Some(0.0), Some(-0.0), Some(f64::NAN), Some(other_nan), Some(negative_nan)],
            SortColumn::new("f"),
        );
        assert_eq!(rows.row(0), rows.row(1));
        assert_eq!(rows.row(2), rows.row(3));
        assert_eq!(rows.row(2), rows.row(4));
    }
}
