//! Version and tombstone column typing.
//!
//! Both columns are resolved against the merge schema once, at construction.
//! Accessors afterwards downcast to the concrete array type recorded here.

use std::cmp::Ordering;

use arrow::{
    array::{Array, AsArray},
    datatypes::{
        DataType, Date32Type, Date64Type, Float32Type, Float64Type, Int16Type, Int32Type,
        Int64Type, Int8Type, SchemaRef, TimeUnit, TimestampMicrosecondType,
        TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt16Type,
        UInt32Type, UInt64Type, UInt8Type,
    },
};

use crate::{error::MergeError, option::NanOrdering};

/// Arrow type of the version column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VersionKind {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Date32,
    Date64,
    Timestamp(TimeUnit),
}

impl VersionKind {
    fn from_data_type(data_type: &DataType) -> Option<Self> {
        Some(match data_type {
            DataType::UInt8 => VersionKind::UInt8,
            DataType::UInt16 => VersionKind::UInt16,
            DataType::UInt32 => VersionKind::UInt32,
            DataType::UInt64 => VersionKind::UInt64,
            DataType::Int8 => VersionKind::Int8,
            DataType::Int16 => VersionKind::Int16,
            DataType::Int32 => VersionKind::Int32,
            DataType::Int64 => VersionKind::Int64,
            DataType::Float32 => VersionKind::Float32,
            DataType::Float64 => VersionKind::Float64,
            DataType::Date32 => VersionKind::Date32,
            DataType::Date64 => VersionKind::Date64,
            DataType::Timestamp(unit, _) => VersionKind::Timestamp(*unit),
            _ => return None,
        })
    }
}

/// Version column resolved against the schema.
#[derive(Debug, Clone)]
pub(crate) struct VersionColumn {
    index: usize,
    kind: VersionKind,
    nan_ordering: NanOrdering,
}

macro_rules! cmp_ord {
    ($lhs:expr, $l:expr, $rhs:expr, $r:expr, $ty:ty) => {
        $lhs.as_primitive::<$ty>()
            .value($l)
            .cmp(&$rhs.as_primitive::<$ty>().value($r))
    };
}

impl VersionColumn {
    pub(crate) fn index(&self) -> usize {
        self.index
    }

    /// Compare the version at `lhs[l]` with the one at `rhs[r]`.
    ///
    /// Nulls order below every value.
    pub(crate) fn compare(&self, lhs: &dyn Array, l: usize, rhs: &dyn Array, r: usize) -> Ordering {
        match (lhs.is_null(l), rhs.is_null(r)) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        match self.kind {
            VersionKind::UInt8 => cmp_ord!(lhs, l, rhs, r, UInt8Type),
            VersionKind::UInt16 => cmp_ord!(lhs, l, rhs, r, UInt16Type),
            VersionKind::UInt32 => cmp_ord!(lhs, l, rhs, r, UInt32Type),
            VersionKind::UInt64 => cmp_ord!(lhs, l, rhs, r, UInt64Type),
            VersionKind::Int8 => cmp_ord!(lhs, l, rhs, r, Int8Type),
            VersionKind::Int16 => cmp_ord!(lhs, l, rhs, r, Int16Type),
            VersionKind::Int32 => cmp_ord!(lhs, l, rhs, r, Int32Type),
            VersionKind::Int64 => cmp_ord!(lhs, l, rhs, r, Int64Type),
            VersionKind::Date32 => cmp_ord!(lhs, l, rhs, r, Date32Type),
            VersionKind::Date64 => cmp_ord!(lhs, l, rhs, r, Date64Type),
            VersionKind::Timestamp(TimeUnit::Second) => {
                cmp_ord!(lhs, l, rhs, r, TimestampSecondType)
            }
            VersionKind::Timestamp(TimeUnit::Millisecond) => {
                cmp_ord!(lhs, l, rhs, r, TimestampMillisecondType)
            }
            VersionKind::Timestamp(TimeUnit::Microsecond) => {
                cmp_ord!(lhs, l, rhs, r, TimestampMicrosecondType)
            }
            VersionKind::Timestamp(TimeUnit::Nanosecond) => {
                cmp_ord!(lhs, l, rhs, r, TimestampNanosecondType)
            }
            VersionKind::Float32 => self.compare_float(
                lhs.as_primitive::<Float32Type>().value(l) as f64,
                rhs.as_primitive::<Float32Type>().value(r) as f64,
            ),
            VersionKind::Float64 => self.compare_float(
                lhs.as_primitive::<Float64Type>().value(l),
                rhs.as_primitive::<Float64Type>().value(r),
            ),
        }
    }

    fn compare_float(&self, lhs: f64, rhs: f64) -> Ordering {
        let nan_side = match self.nan_ordering {
            NanOrdering::Smallest => Ordering::Less,
            NanOrdering::Greatest => Ordering::Greater,
        };
        match (lhs.is_nan(), rhs.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => nan_side,
            (false, true) => nan_side.reverse(),
            (false, false) => lhs.partial_cmp(&rhs).unwrap_or(Ordering::Equal),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TombstoneKind {
    UInt8,
    Boolean,
}

/// Tombstone column resolved against the schema.
#[derive(Debug, Clone)]
pub(crate) struct TombstoneColumn {
    index: usize,
    name: String,
    kind: TombstoneKind,
}

impl TombstoneColumn {
    pub(crate) fn index(&self) -> usize {
        self.index
    }

    /// Read the tombstone flag of `array[row]`.
    ///
    /// # Errors
    /// [`MergeError::InvalidTombstone`] for nulls and `UInt8` values other than 0 or 1.
    pub(crate) fn is_deleted(&self, array: &dyn Array, row: usize) -> Result<bool, MergeError> {
        if array.is_null(row) {
            return Err(self.invalid("NULL".to_string()));
        }
        match self.kind {
            TombstoneKind::Boolean => Ok(array.as_boolean().value(row)),
            TombstoneKind::UInt8 => match array.as_primitive::<UInt8Type>().value(row) {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(self.invalid(other.to_string())),
            },
        }
    }

    fn invalid(&self, value: String) -> MergeError {
        MergeError::InvalidTombstone {
            column: self.name.clone(),
            value,
        }
    }
}

/// Version and tombstone columns of one merge.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReplacingColumns {
    pub(crate) version: Option<VersionColumn>,
    pub(crate) is_deleted: Option<TombstoneColumn>,
}

impl ReplacingColumns {
    pub(crate) fn resolve(
        schema: &SchemaRef,
        version: Option<&str>,
        is_deleted: Option<&str>,
        nan_ordering: NanOrdering,
    ) -> Result<Self, MergeError> {
        let version = version
            .map(|name| {
                let (index, field) = lookup(schema, name)?;
                let kind = VersionKind::from_data_type(field.data_type()).ok_or_else(|| {
                    MergeError::UnsupportedVersionType {
                        column: name.to_string(),
                        data_type: field.data_type().clone(),
                    }
                })?;
                Ok::<_, MergeError>(VersionColumn {
                    index,
                    kind,
                    nan_ordering,
                })
            })
            .transpose()?;
        let is_deleted = is_deleted
            .map(|name| {
                let (index, field) = lookup(schema, name)?;
                let kind = match field.data_type() {
                    DataType::UInt8 => TombstoneKind::UInt8,
                    DataType::Boolean => TombstoneKind::Boolean,
                    other => {
                        return Err(MergeError::UnsupportedTombstoneType {
                            column: name.to_string(),
                            data_type: other.clone(),
                        })
                    }
                };
                Ok(TombstoneColumn {
                    index,
                    name: name.to_string(),
                    kind,
                })
            })
            .transpose()?;
        Ok(Self {
            version,
            is_deleted,
        })
    }
}

fn lookup<'s>(
    schema: &'s SchemaRef,
    name: &str,
) -> Result<(usize, &'s arrow::datatypes::Field), MergeError> {
    schema
        .column_with_name(name)
        .ok_or_else(|| MergeError::NoSuchColumn {
            name: name.to_string(),
        })
}
