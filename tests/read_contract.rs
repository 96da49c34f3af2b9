// Library-level contract tests for store resolution, reading, and the
// export stub.
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{AsArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Int64Type, Schema};
use parquet::arrow::ArrowWriter;

use tabcat::api::{
    ErrorKind, ExportOptions, ReadOptions, Store, export_delimited, read_chunks, read_table,
};

fn demo_batch(rows: usize) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("value", DataType::Float64, false),
        Field::new("name", DataType::Utf8, false),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from_iter_values(0..rows as i64)),
            Arc::new(Float64Array::from_iter_values(
                (0..rows).map(|i| i as f64 * 0.5),
            )),
            Arc::new(StringArray::from_iter_values(
                (0..rows).map(|i| format!("row-{i}")),
            )),
        ],
    )
    .expect("batch")
}

fn parquet_bytes(batch: &RecordBatch) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), None).expect("writer");
    writer.write(batch).expect("write");
    writer.close().expect("close");
    buf
}

fn write_archive(path: &Path, members: &[(&str, &RecordBatch)]) {
    let file = File::create(path).expect("create archive");
    let mut builder = tar::Builder::new(file);
    for (name, batch) in members {
        let data = parquet_bytes(batch);
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, *name, data.as_slice())
            .expect("append member");
    }
    builder.finish().expect("finish archive");
}

fn single_table_store(rows: usize) -> (tempfile::TempDir, Store) {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("results.tar");
    write_archive(&path, &[("events.parquet", &demo_batch(rows))]);
    let store = Store::open(&path).expect("open store");
    (temp, store)
}

fn ids(table: &tabcat::api::Table) -> Vec<i64> {
    let mut out = Vec::new();
    for batch in table.batches() {
        let column = batch
            .column_by_name("id")
            .expect("id column")
            .as_primitive::<Int64Type>();
        out.extend(column.values().iter().copied());
    }
    out
}

#[test]
fn full_extent_without_bounds_or_columns() {
    let (_temp, store) = single_table_store(100);
    let table = read_table(&store, Some("events"), &ReadOptions::default()).expect("read");
    assert_eq!(table.num_rows(), 100);
    assert_eq!(table.num_columns(), 3);
    assert_eq!(table.first_row(), 0);
    assert_eq!(ids(&table), (0..100).collect::<Vec<_>>());
}

#[test]
fn half_open_row_window() {
    let (_temp, store) = single_table_store(100);
    let options = ReadOptions {
        start: Some(10),
        stop: Some(20),
        ..ReadOptions::default()
    };
    let table = read_table(&store, Some("events"), &options).expect("read");
    assert_eq!(table.num_rows(), 10);
    assert_eq!(table.first_row(), 10);
    assert_eq!(ids(&table), (10..20).collect::<Vec<_>>());
}

#[test]
fn bounds_clamp_to_the_stored_extent() {
    let (_temp, store) = single_table_store(10);
    let options = ReadOptions {
        start: Some(5),
        stop: Some(500),
        ..ReadOptions::default()
    };
    let table = read_table(&store, Some("events"), &options).expect("read");
    assert_eq!(ids(&table), (5..10).collect::<Vec<_>>());

    let options = ReadOptions {
        start: Some(200),
        ..ReadOptions::default()
    };
    let table = read_table(&store, Some("events"), &options).expect("read");
    assert_eq!(table.num_rows(), 0);
    assert_eq!(table.num_columns(), 3);
}

#[test]
fn empty_window_yields_an_empty_table() {
    let (_temp, store) = single_table_store(10);
    let options = ReadOptions {
        start: Some(4),
        stop: Some(4),
        ..ReadOptions::default()
    };
    let table = read_table(&store, Some("events"), &options).expect("read");
    assert_eq!(table.num_rows(), 0);
    assert_eq!(table.first_row(), 4);
}

#[test]
fn column_subset_in_requested_order() {
    let (_temp, store) = single_table_store(10);
    let options = ReadOptions {
        columns: Some(vec!["value".to_string(), "id".to_string()]),
        ..ReadOptions::default()
    };
    let table = read_table(&store, Some("events"), &options).expect("read");
    assert_eq!(table.column_names(), vec!["value", "id"]);
    // Data follows the reorder: column 0 is the float column.
    let batch = &table.batches()[0];
    assert_eq!(batch.column(0).data_type(), &DataType::Float64);
    assert_eq!(batch.column(1).data_type(), &DataType::Int64);
    assert_eq!(ids(&table), (0..10).collect::<Vec<_>>());
}

#[test]
fn unknown_column_is_not_found() {
    let (_temp, store) = single_table_store(10);
    let options = ReadOptions {
        columns: Some(vec!["nope".to_string()]),
        ..ReadOptions::default()
    };
    let err = read_table(&store, Some("events"), &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.hint().expect("hint").contains("value"));
}

#[test]
fn unknown_key_is_not_found() {
    let (_temp, store) = single_table_store(10);
    let err = read_table(&store, Some("nope"), &ReadOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.key(), Some("nope"));
    assert!(err.hint().expect("hint").contains("events"));
}

#[test]
fn missing_store_is_not_found() {
    let err = Store::open("/nonexistent/results.tar").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn keys_tolerate_a_leading_slash() {
    let (_temp, store) = single_table_store(3);
    let table = read_table(&store, Some("/events"), &ReadOptions::default()).expect("read");
    assert_eq!(table.num_rows(), 3);
}

#[test]
fn sole_table_is_auto_detected() {
    let (_temp, store) = single_table_store(3);
    let table = read_table(&store, None, &ReadOptions::default()).expect("read");
    assert_eq!(table.num_rows(), 3);
}

#[test]
fn auto_detection_requires_a_sole_table() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("results.tar");
    write_archive(
        &path,
        &[
            ("a.parquet", &demo_batch(1)),
            ("b.parquet", &demo_batch(1)),
        ],
    );
    let store = Store::open(&path).expect("open store");
    let err = read_table(&store, None, &ReadOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert!(err.hint().expect("hint").contains("a, b"));
}

#[test]
fn bare_parquet_file_is_a_single_table_store() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("metrics.parquet");
    std::fs::write(&path, parquet_bytes(&demo_batch(7))).expect("write parquet");

    let store = Store::open(&path).expect("open store");
    assert_eq!(store.keys(), vec!["metrics"]);
    let table = read_table(&store, Some("metrics"), &ReadOptions::default()).expect("read");
    assert_eq!(table.num_rows(), 7);
}

#[test]
fn where_terms_push_down_into_the_read() {
    let (_temp, store) = single_table_store(100);
    let options = ReadOptions {
        where_terms: vec!["value > 3".to_string()],
        ..ReadOptions::default()
    };
    let table = read_table(&store, Some("events"), &options).expect("read");
    assert_eq!(ids(&table), (7..100).collect::<Vec<_>>());
}

#[test]
fn where_terms_filter_inside_the_row_window() {
    let (_temp, store) = single_table_store(100);
    let options = ReadOptions {
        start: Some(0),
        stop: Some(10),
        where_terms: vec!["value > 3".to_string()],
        ..ReadOptions::default()
    };
    let table = read_table(&store, Some("events"), &options).expect("read");
    assert_eq!(ids(&table), vec![7, 8, 9]);
}

#[test]
fn where_terms_may_name_columns_outside_the_subset() {
    let (_temp, store) = single_table_store(20);
    let options = ReadOptions {
        columns: Some(vec!["name".to_string()]),
        where_terms: vec!["id >= 18".to_string()],
        ..ReadOptions::default()
    };
    let table = read_table(&store, Some("events"), &options).expect("read");
    assert_eq!(table.column_names(), vec!["name"]);
    assert_eq!(table.num_rows(), 2);
}

#[test]
fn malformed_where_term_is_a_usage_error() {
    let (_temp, store) = single_table_store(5);
    let options = ReadOptions {
        where_terms: vec!["value ~ 3".to_string()],
        ..ReadOptions::default()
    };
    let err = read_table(&store, Some("events"), &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[test]
fn where_term_on_unknown_column_is_not_found() {
    let (_temp, store) = single_table_store(5);
    let options = ReadOptions {
        where_terms: vec!["nope == 1".to_string()],
        ..ReadOptions::default()
    };
    let err = read_table(&store, Some("events"), &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn chunked_reads_honor_the_chunksize() {
    let (_temp, store) = single_table_store(100);
    let options = ReadOptions {
        chunksize: Some(7),
        ..ReadOptions::default()
    };
    let chunks = read_chunks(&store, Some("events"), &options).expect("chunks");
    assert_eq!(chunks.first_row(), 0);
    assert_eq!(chunks.schema().fields().len(), 3);

    let batches: Vec<_> = chunks.collect::<Result<_, _>>().expect("batches");
    assert!(batches.iter().all(|batch| batch.num_rows() <= 7));
    assert_eq!(
        batches.iter().map(RecordBatch::num_rows).sum::<usize>(),
        100
    );
}

#[test]
fn zero_chunksize_is_a_usage_error() {
    let (_temp, store) = single_table_store(5);
    let options = ReadOptions {
        chunksize: Some(0),
        ..ReadOptions::default()
    };
    let err = read_chunks(&store, Some("events"), &options).err().expect("error");
    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[test]
fn export_path_signals_not_implemented_without_writing() {
    let (_temp, store) = single_table_store(5);
    let table = read_table(&store, Some("events"), &ReadOptions::default()).expect("read");

    let mut out = Vec::new();
    let err = export_delimited(&table, &ExportOptions::default(), &mut out).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert!(out.is_empty(), "export must not partially write");
}
