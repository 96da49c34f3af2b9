//! Purpose: Define the stable public Rust API boundary for tabcat.
//! Exports: Core types and operations needed by the CLI and tests.
//! Role: Public, additive-only surface; callers should not reach into
//! `core` submodules directly.
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::export::{ExportOptions, export_delimited};
pub use crate::core::read::{ReadOptions, TableChunks, read_chunks, read_table};
pub use crate::core::render::{DisplayOptions, render};
pub use crate::core::store::Store;
pub use crate::core::table::Table;
pub use crate::core::where_expr::{CmpOp, Literal, WhereTerm, compile_where_terms};
