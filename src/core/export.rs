//! Purpose: Declared delimited-text export path. Not implemented.
//! Exports: `ExportOptions`, `export_delimited`.
//! Role: Reserves the option surface of a future `to_csv`-style writer; the
//! only contract today is the deterministic `Unsupported` signal.
//! Invariants: `export_delimited` writes nothing before returning its error.
use std::io::Write;

use crate::core::error::{Error, ErrorKind};
use crate::core::table::Table;

/// Options the delimited export would honor. The semantics here are
/// declared, not promised; see `export_delimited`.
#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// Columns to write, defaulting to all of them.
    pub columns: Option<Vec<String>>,
    /// Field delimiter for the output.
    pub sep: char,
    /// Missing data representation.
    pub na_rep: String,
    /// Write the column names as a first record.
    pub header: bool,
    /// Write the row-number index as a first field.
    pub index: bool,
    /// Quote character for fields containing the delimiter.
    pub quotechar: char,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            columns: None,
            sep: ',',
            na_rep: String::new(),
            header: true,
            index: true,
            quotechar: '"',
        }
    }
}

/// Write the table as delimited text. Unimplemented: always fails with
/// `ErrorKind::Unsupported` and performs no partial write.
pub fn export_delimited(
    _table: &Table,
    _options: &ExportOptions,
    _out: &mut impl Write,
) -> Result<(), Error> {
    Err(Error::new(ErrorKind::Unsupported)
        .with_message("delimited text export is not implemented")
        .with_hint("Only the fixed-width console rendering is available."))
}
