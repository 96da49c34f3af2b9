//! Purpose: Render a materialized table as fixed-width text for a console.
//! Exports: `DisplayOptions`, `render`.
//! Role: Small, pure formatter; the only writer of table output.
//! Invariants: Output is one line per row plus a header; the frame is never
//! wrapped across line blocks.
//! Invariants: The layout is stable for fixed options; tests assert on it
//! byte for byte.
use std::io::Write;

use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type};
use arrow::util::display::{ArrayFormatter, FormatOptions};

use crate::core::error::{Error, ErrorKind};
use crate::core::table::Table;

/// Console display options. The defaults mirror the fixed option context the
/// CLI prints with: every row, 4-digit float precision, cells clipped at 15
/// characters.
#[derive(Clone, Debug)]
pub struct DisplayOptions {
    /// Cap on printed rows; the middle of the frame is elided past it.
    /// `None` prints everything.
    pub max_rows: Option<usize>,
    /// Digits after the decimal point for float columns.
    pub float_precision: usize,
    /// Cell text wider than this is clipped with a `...` suffix.
    pub max_col_width: usize,
    /// Print the leftmost unlabeled column of absolute row numbers.
    pub show_index: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            max_rows: None,
            float_precision: 4,
            max_col_width: 15,
            show_index: true,
        }
    }
}

pub fn render(table: &Table, options: &DisplayOptions, out: &mut impl Write) -> Result<(), Error> {
    let num_rows = table.num_rows();
    if num_rows == 0 {
        writeln!(out, "Empty table").map_err(write_error)?;
        writeln!(out, "Columns: [{}]", table.column_names().join(", ")).map_err(write_error)?;
        return Ok(());
    }

    let rows = visible_rows(num_rows, options.max_rows);
    let index = index_cells(table, &rows);
    let columns = cell_grid(table, &rows, options)?;

    let headers = table.column_names();
    let widths: Vec<usize> = columns
        .iter()
        .zip(&headers)
        .map(|(cells, header)| {
            cells
                .iter()
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
                .max(header.chars().count())
        })
        .collect();
    let index_width = index
        .iter()
        .map(|cell| cell.chars().count())
        .max()
        .unwrap_or(0);

    let mut line = String::new();
    if options.show_index {
        line.push_str(&" ".repeat(index_width));
    }
    for (header, width) in headers.iter().zip(&widths) {
        line.push_str("  ");
        push_right_aligned(&mut line, header, *width);
    }
    writeln!(out, "{line}").map_err(write_error)?;

    for (row_idx, index_cell) in index.iter().enumerate() {
        line.clear();
        if options.show_index {
            push_right_aligned(&mut line, index_cell, index_width);
        }
        for (cells, width) in columns.iter().zip(&widths) {
            line.push_str("  ");
            push_right_aligned(&mut line, &cells[row_idx], *width);
        }
        writeln!(out, "{line}").map_err(write_error)?;
    }
    Ok(())
}

/// Which stored-row positions get printed, `None` marking the elision row.
fn visible_rows(num_rows: usize, max_rows: Option<usize>) -> Vec<Option<usize>> {
    match max_rows {
        Some(cap) if num_rows > cap && cap > 0 => {
            let head = cap.div_ceil(2);
            let tail = cap / 2;
            let mut rows: Vec<Option<usize>> = (0..head).map(Some).collect();
            rows.push(None);
            rows.extend((num_rows - tail..num_rows).map(Some));
            rows
        }
        _ => (0..num_rows).map(Some).collect(),
    }
}

fn index_cells(table: &Table, rows: &[Option<usize>]) -> Vec<String> {
    rows.iter()
        .map(|row| match row {
            Some(row) => (table.first_row() + *row as u64).to_string(),
            None => "..".to_string(),
        })
        .collect()
}

/// Column-major grid of formatted cells for the visible rows.
fn cell_grid(
    table: &Table,
    rows: &[Option<usize>],
    options: &DisplayOptions,
) -> Result<Vec<Vec<String>>, Error> {
    let format_options = FormatOptions::default().with_null("null");
    let mut grid = Vec::with_capacity(table.num_columns());

    for col_idx in 0..table.num_columns() {
        // Flatten the column across batches once, then pick visible rows.
        let mut flat: Vec<String> = Vec::with_capacity(table.num_rows());
        for batch in table.batches() {
            let array = batch.column(col_idx);
            match array.data_type() {
                DataType::Float64 => {
                    let values = array.as_primitive::<Float64Type>();
                    for i in 0..values.len() {
                        flat.push(if values.is_null(i) {
                            "null".to_string()
                        } else {
                            format!("{:.*}", options.float_precision, values.value(i))
                        });
                    }
                }
                DataType::Float32 => {
                    let values = array.as_primitive::<Float32Type>();
                    for i in 0..values.len() {
                        flat.push(if values.is_null(i) {
                            "null".to_string()
                        } else {
                            format!("{:.*}", options.float_precision, values.value(i))
                        });
                    }
                }
                _ => {
                    let formatter = ArrayFormatter::try_new(array.as_ref(), &format_options)
                        .map_err(|err| {
                            Error::new(ErrorKind::Internal)
                                .with_message("cannot format column for display")
                                .with_source(err)
                        })?;
                    for i in 0..array.len() {
                        flat.push(formatter.value(i).to_string());
                    }
                }
            }
        }

        grid.push(
            rows.iter()
                .map(|row| match row {
                    Some(row) => clip(&flat[*row], options.max_col_width),
                    None => "...".to_string(),
                })
                .collect(),
        );
    }
    Ok(grid)
}

fn clip(cell: &str, width: usize) -> String {
    if width < 4 || cell.chars().count() <= width {
        return cell.to_string();
    }
    let mut clipped: String = cell.chars().take(width - 3).collect();
    clipped.push_str("...");
    clipped
}

fn push_right_aligned(line: &mut String, cell: &str, width: usize) {
    let pad = width.saturating_sub(cell.chars().count());
    line.push_str(&" ".repeat(pad));
    line.push_str(cell);
}

fn write_error(err: std::io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("failed to write table output")
        .with_source(err)
}
