//! Purpose: Read one named table from a store, with the row-range, column,
//! and predicate pushdown delegated to the parquet reader.
//! Exports: `ReadOptions`, `read_table`, `read_chunks`, `TableChunks`.
//! Role: The single read call of the program; everything else is plumbing.
//! Invariants: `ReadOptions` enumerates every supported read option with its
//! default; there is no open-ended option forwarding.
//! Invariants: Row bounds use slice semantics (clamped, half-open); where
//! terms filter inside the `[start, stop)` window.
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::{Schema, SchemaRef};
use bytes::Bytes;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::{
    ArrowPredicate, ArrowPredicateFn, ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder,
    RowFilter, RowSelection, RowSelector,
};
use tracing::debug;

use crate::core::error::{Error, ErrorKind};
use crate::core::store::Store;
use crate::core::table::Table;
use crate::core::where_expr::compile_where_terms;

/// Every read option the storage engine supports, with its default. The
/// CLI only ever sets `columns`, `start`, and `stop`; the rest are here for
/// library callers.
#[derive(Clone, Debug, Default)]
pub struct ReadOptions {
    /// Column subset to load, returned in the requested order.
    pub columns: Option<Vec<String>>,
    /// First row index to include.
    pub start: Option<u64>,
    /// Row index to stop before.
    pub stop: Option<u64>,
    /// Filter-term strings (`column op literal`), ANDed, pushed down into
    /// the read.
    pub where_terms: Vec<String>,
    /// Row count per chunk when reading lazily.
    pub chunksize: Option<usize>,
}

/// Read and materialize one table.
pub fn read_table(store: &Store, key: Option<&str>, options: &ReadOptions) -> Result<Table, Error> {
    let mut chunks = read_chunks(store, key, options)?;
    let mut batches = Vec::new();
    for batch in &mut chunks {
        batches.push(batch?);
    }
    Ok(Table::new(chunks.schema, batches, chunks.first_row))
}

/// Lazy variant: yields record batches as the reader decodes them, honoring
/// the same options. The printed path never uses this; it exists for callers
/// that cannot hold the whole table.
pub fn read_chunks(
    store: &Store,
    key: Option<&str>,
    options: &ReadOptions,
) -> Result<TableChunks, Error> {
    let key = store.resolve_key(key)?;
    let data = store.table_bytes(key)?;
    prepare(key, data, options)
}

pub struct TableChunks {
    reader: Option<ParquetRecordBatchReader>,
    schema: SchemaRef,
    reorder: Option<Vec<usize>>,
    first_row: u64,
}

impl TableChunks {
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn first_row(&self) -> u64 {
        self.first_row
    }
}

impl Iterator for TableChunks {
    type Item = Result<RecordBatch, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = self.reader.as_mut()?.next()?;
        Some(batch.map_err(decode_error).and_then(|batch| {
            match &self.reorder {
                Some(order) => reorder_batch(&batch, &self.schema, order),
                None => Ok(batch),
            }
        }))
    }
}

fn prepare(key: &str, data: Bytes, options: &ReadOptions) -> Result<TableChunks, Error> {
    let mut builder = ParquetRecordBatchReaderBuilder::try_new(data).map_err(|err| {
        Error::new(ErrorKind::Corrupt)
            .with_message("unreadable table member")
            .with_key(key)
            .with_source(err)
    })?;

    let total_rows = builder.metadata().file_metadata().num_rows().max(0) as u64;
    let file_schema = builder.schema().clone();

    // Column projection, in file order; reordering happens per batch below.
    let mut roots: Option<Vec<usize>> = None;
    if let Some(names) = &options.columns {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let index = file_schema.index_of(name).map_err(|_| {
                Error::new(ErrorKind::NotFound)
                    .with_message(format!("column `{name}` not found in table `{key}`"))
                    .with_key(key)
                    .with_hint(format!(
                        "Available columns: {}",
                        column_names(&file_schema).join(", ")
                    ))
            })?;
            indices.push(index);
        }
        let mask = ProjectionMask::roots(builder.parquet_schema(), indices.iter().copied());
        builder = builder.with_projection(mask);
        roots = Some(indices);
    }

    // Predicate pushdown. Terms are validated against the full schema first
    // so a bad term surfaces as a usage error, not a decode failure.
    let terms = compile_where_terms(&options.where_terms)?;
    if !terms.is_empty() {
        let mut predicates: Vec<Box<dyn ArrowPredicate>> = Vec::with_capacity(terms.len());
        for term in terms {
            let root = file_schema.index_of(term.column()).map_err(|_| {
                Error::new(ErrorKind::NotFound)
                    .with_message(format!(
                        "where term names unknown column `{}`",
                        term.column()
                    ))
                    .with_key(key)
                    .with_hint(format!(
                        "Available columns: {}",
                        column_names(&file_schema).join(", ")
                    ))
            })?;
            term.check_against(file_schema.field(root).data_type())?;
            let mask = ProjectionMask::roots(builder.parquet_schema(), [root]);
            predicates.push(Box::new(ArrowPredicateFn::new(mask, move |batch| {
                term.evaluate(&batch)
            })));
        }
        builder = builder.with_row_filter(RowFilter::new(predicates));
    }

    if let Some(chunksize) = options.chunksize {
        if chunksize == 0 {
            return Err(Error::new(ErrorKind::Usage).with_message("chunksize must be positive"));
        }
        builder = builder.with_batch_size(chunksize);
    }

    // Row bounds, clamped to the stored extent. The selection restricts the
    // scan window; predicates above filter within it.
    let start = options.start.unwrap_or(0).min(total_rows);
    let stop = options.stop.unwrap_or(total_rows).min(total_rows);
    let window = stop.saturating_sub(start);
    let (schema, reorder) = output_shape(&file_schema, roots.as_deref());

    if window == 0 && (options.start.is_some() || options.stop.is_some()) {
        debug!(key, start, stop, "empty row window");
        return Ok(TableChunks {
            reader: None,
            schema,
            reorder: None,
            first_row: start,
        });
    }

    if options.start.is_some() || options.stop.is_some() {
        let mut selectors = Vec::new();
        if start > 0 {
            selectors.push(RowSelector::skip(start as usize));
        }
        selectors.push(RowSelector::select(window as usize));
        builder = builder.with_row_selection(RowSelection::from(selectors));
    }

    let reader = builder.build().map_err(|err| {
        Error::new(ErrorKind::Corrupt)
            .with_message("unreadable table member")
            .with_key(key)
            .with_source(err)
    })?;

    debug!(key, rows = window, total = total_rows, "reading table");
    Ok(TableChunks {
        reader: Some(reader),
        schema,
        reorder,
        first_row: start,
    })
}

/// Output schema in the caller's requested column order, plus the positions
/// of those columns inside the projected (file-ordered) batches.
fn output_shape(file_schema: &SchemaRef, roots: Option<&[usize]>) -> (SchemaRef, Option<Vec<usize>>) {
    let Some(roots) = roots else {
        return (file_schema.clone(), None);
    };

    let mut projected: Vec<usize> = roots.to_vec();
    projected.sort_unstable();
    projected.dedup();

    let positions: Vec<usize> = roots
        .iter()
        .filter_map(|root| projected.iter().position(|p| p == root))
        .collect();
    let fields: Vec<_> = roots
        .iter()
        .map(|&root| file_schema.field(root).clone())
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let identity = positions.iter().enumerate().all(|(i, &p)| i == p)
        && positions.len() == projected.len();
    (schema, if identity { None } else { Some(positions) })
}

fn reorder_batch(
    batch: &RecordBatch,
    schema: &SchemaRef,
    order: &[usize],
) -> Result<RecordBatch, Error> {
    let arrays = order.iter().map(|&i| batch.column(i).clone()).collect();
    RecordBatch::try_new(schema.clone(), arrays).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("column reorder produced a mismatched batch")
            .with_source(err)
    })
}

fn decode_error(err: arrow::error::ArrowError) -> Error {
    Error::new(ErrorKind::Corrupt)
        .with_message("failed to decode table data")
        .with_source(err)
}

fn column_names(schema: &SchemaRef) -> Vec<&str> {
    schema
        .fields()
        .iter()
        .map(|field| field.name().as_str())
        .collect()
}
