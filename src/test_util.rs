//! Test-only helpers for building merge inputs and reading chunks back.

use std::sync::Arc;

use arrow::{
    array::{Array, Int64Array, StringArray, UInt64Array, UInt8Array},
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};

use crate::chunk::Chunk;

/// Key, version, payload and tombstone of one test row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Row {
    pub(crate) k: i64,
    pub(crate) v: u64,
    pub(crate) s: String,
    pub(crate) deleted: u8,
}

impl Row {
    pub(crate) fn new(k: i64, v: u64, s: &str) -> Self {
        Self {
            k,
            v,
            s: s.to_string(),
            deleted: 0,
        }
    }

    pub(crate) fn deleted(self, deleted: u8) -> Self {
        Self { deleted, ..self }
    }
}

/// `k: Int64, v: UInt64, s: Utf8, deleted: UInt8`.
pub(crate) fn test_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("k", DataType::Int64, false),
        Field::new("v", DataType::UInt64, false),
        Field::new("s", DataType::Utf8, false),
        Field::new("deleted", DataType::UInt8, false),
    ]))
}

pub(crate) fn batch(rows: Vec<Row>) -> RecordBatch {
    RecordBatch::try_new(
        test_schema(),
        vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.k))),
            Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.v))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.s.as_str()))),
            Arc::new(UInt8Array::from_iter_values(rows.iter().map(|r| r.deleted))),
        ],
    )
    .expect("test batch")
}

fn selected(chunk: &Chunk) -> RecordBatch {
    chunk.clone().into_batch().expect("apply selection")
}

pub(crate) fn keys_of(chunk: &Chunk) -> Vec<i64> {
    let batch = selected(chunk);
    let keys = batch
        .column(0)
        .as_any()
        .downcast_ref::<Int64Array>()
        .expect("k column");
    keys.values().to_vec()
}

pub(crate) fn strings_of(chunk: &Chunk) -> Vec<String> {
    let batch = selected(chunk);
    let strings = batch
        .column(2)
        .as_any()
        .downcast_ref::<StringArray>()
        .expect("s column");
    (0..strings.len()).map(|i| strings.value(i).to_string()).collect()
}
