//! Purpose: The materialized tabular result handed from the reader to the
//! renderer.
//! Exports: `Table`.
//! Invariants: Every batch shares `schema`; `first_row` is the absolute row
//! number of the first row inside the stored table.
use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;

#[derive(Debug)]
pub struct Table {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
    first_row: u64,
}

impl Table {
    pub(crate) fn new(schema: SchemaRef, batches: Vec<RecordBatch>, first_row: u64) -> Self {
        Self {
            schema,
            batches,
            first_row,
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn first_row(&self) -> u64 {
        self.first_row
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema
            .fields()
            .iter()
            .map(|field| field.name().as_str())
            .collect()
    }
}
