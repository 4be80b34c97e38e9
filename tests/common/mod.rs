//! Common test utilities for integration tests.
#![allow(dead_code)]

use std::{collections::BTreeMap, sync::Arc};

use arrow::{
    array::{Array, Int64Array, StringArray, UInt64Array, UInt8Array},
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use tonbo_replacing::{Chunk, Input, MergeOptions, SortColumn};

/// One logical row of the test schema.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Row {
    pub k: i64,
    pub v: u64,
    pub s: String,
    pub deleted: u8,
}

impl Row {
    pub fn new(k: i64, v: u64, s: &str) -> Self {
        Self {
            k,
            v,
            s: s.to_string(),
            deleted: 0,
        }
    }

    pub fn deleted(self, deleted: u8) -> Self {
        Self { deleted, ..self }
    }
}

/// `k: Int64, v: UInt64, s: Utf8, deleted: UInt8`.
pub fn schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("k", DataType::Int64, false),
        Field::new("v", DataType::UInt64, false),
        Field::new("s", DataType::Utf8, false),
        Field::new("deleted", DataType::UInt8, false),
    ]))
}

/// Sort by `k`, version `v`.
pub fn options() -> MergeOptions {
    MergeOptions::from([SortColumn::new("k")]).version_column("v")
}

pub fn batch(rows: &[Row]) -> RecordBatch {
    RecordBatch::try_new(
        schema(),
        vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.k))),
            Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.v))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.s.as_str()))),
            Arc::new(UInt8Array::from_iter_values(rows.iter().map(|r| r.deleted))),
        ],
    )
    .expect("test batch should match schema")
}

pub fn inputs(batches: &[Vec<Vec<Row>>]) -> Vec<Vec<Input>> {
    batches
        .iter()
        .map(|input| input.iter().map(|rows| Input::new(batch(rows))).collect())
        .collect()
}

/// Like [`inputs`], but some batches repeat the first row of the next
/// non-empty batch as a trailing continuation row with `skip_last_row` set.
pub fn inputs_with_continuations(
    rng: &mut fastrand::Rng,
    batches: &[Vec<Vec<Row>>],
) -> Vec<Vec<Input>> {
    batches
        .iter()
        .map(|input| {
            input
                .iter()
                .enumerate()
                .map(|(idx, rows)| {
                    let next = input[idx + 1..].iter().find(|rows| !rows.is_empty());
                    match next {
                        Some(next) if !rows.is_empty() && rng.bool() => {
                            let mut rows = rows.clone();
                            rows.push(next[0].clone());
                            Input::new(batch(&rows)).skip_last_row(true)
                        }
                        _ => Input::new(batch(rows)),
                    }
                })
                .collect()
        })
        .collect()
}

pub fn rows_of_batch(batch: &RecordBatch) -> Vec<Row> {
    let column = |idx: usize| batch.column(idx).as_any();
    let k = column(0).downcast_ref::<Int64Array>().expect("k");
    let v = column(1).downcast_ref::<UInt64Array>().expect("v");
    let s = column(2).downcast_ref::<StringArray>().expect("s");
    let deleted = column(3).downcast_ref::<UInt8Array>().expect("deleted");
    (0..batch.num_rows())
        .map(|i| Row {
            k: k.value(i),
            v: v.value(i),
            s: s.value(i).to_string(),
            deleted: deleted.value(i),
        })
        .collect()
}

/// Output rows of `chunks`, applying lazy selections.
pub fn rows_of(chunks: &[Chunk]) -> Vec<Row> {
    chunks
        .iter()
        .flat_map(|chunk| {
            let batch = chunk.clone().into_batch().expect("selection applies");
            rows_of_batch(&batch)
        })
        .collect()
}

/// Naive replacing merge: scan order is key, then input index, then position.
pub fn expected(batches: &[Vec<Vec<Row>>], cleanup: bool) -> Vec<Row> {
    let mut groups: BTreeMap<i64, Row> = BTreeMap::new();
    for input in batches {
        for row in input.iter().flatten() {
            match groups.get(&row.k) {
                Some(selected) if row.v < selected.v => {}
                _ => {
                    groups.insert(row.k, row.clone());
                }
            }
        }
    }
    groups
        .into_values()
        .filter(|row| !(cleanup && row.deleted == 1))
        .collect()
}

/// Random sorted inputs, each split into batches of random length (empty ones included).
pub fn random_inputs(rng: &mut fastrand::Rng, num_inputs: usize) -> Vec<Vec<Vec<Row>>> {
    let key_space = rng.i64(1..40);
    (0..num_inputs)
        .map(|input| {
            let mut rows: Vec<Row> = (0..rng.usize(0..60))
                .map(|i| {
                    Row::new(rng.i64(0..key_space), rng.u64(0..4), &format!("{input}-{i}"))
                        .deleted(u8::from(rng.u8(0..5) == 0))
                })
                .collect();
            rows.sort_by_key(|row| row.k);

            let mut batches = Vec::new();
            let mut rest = rows.as_slice();
            while !rest.is_empty() {
                let len = rng.usize(0..=rest.len().min(16));
                let (head, tail) = rest.split_at(len);
                batches.push(head.to_vec());
                rest = tail;
            }
            batches
        })
        .collect()
}

pub fn total_rows(batches: &[Vec<Vec<Row>>]) -> usize {
    batches.iter().flatten().map(Vec::len).sum()
}
