//! Purpose: Compile and evaluate where-term strings against record batches.
//! Exports: `WhereTerm`, `CmpOp`, `Literal`, `compile_where_terms`.
//! Role: Small adapter between `ReadOptions::where_terms` and the parquet
//! row-filter pushdown; the storage engine drives evaluation.
//! Invariants: Parse failures are usage errors reported before any read.
//! Invariants: Null comparison results count as "no match".
use std::fmt;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, Scalar, StringArray,
};
use arrow::compute::cast;
use arrow::compute::kernels::cmp;
use arrow::compute::kernels::filter::prep_null_mask_filter;
use arrow::datatypes::DataType;
use arrow::error::ArrowError;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

/// One compiled `column op literal` term. Terms are ANDed by the reader.
#[derive(Clone, Debug)]
pub struct WhereTerm {
    column: String,
    op: CmpOp,
    literal: Literal,
}

impl WhereTerm {
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Fail early, before the read starts, when the literal does not fit the
    /// column's type family.
    pub(crate) fn check_against(&self, data_type: &DataType) -> Result<(), Error> {
        if self.literal.comparable(data_type) {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::Usage).with_message(format!(
                "cannot compare column `{}` of type {} with {}",
                self.column, data_type, self.literal
            )))
        }
    }

    /// Evaluate against a batch holding (at least) the term's column.
    pub fn evaluate(&self, batch: &RecordBatch) -> Result<BooleanArray, ArrowError> {
        let column = batch.column_by_name(&self.column).ok_or_else(|| {
            ArrowError::SchemaError(format!("column `{}` missing from predicate batch", self.column))
        })?;
        let scalar = Scalar::new(self.literal.scalar_array(column.data_type())?);
        let matches = match self.op {
            CmpOp::Eq => cmp::eq(column, &scalar)?,
            CmpOp::Ne => cmp::neq(column, &scalar)?,
            CmpOp::Lt => cmp::lt(column, &scalar)?,
            CmpOp::Le => cmp::lt_eq(column, &scalar)?,
            CmpOp::Gt => cmp::gt(column, &scalar)?,
            CmpOp::Ge => cmp::gt_eq(column, &scalar)?,
        };
        Ok(if matches.null_count() > 0 {
            prep_null_mask_filter(&matches)
        } else {
            matches
        })
    }
}

impl Literal {
    fn comparable(&self, data_type: &DataType) -> bool {
        let target = match data_type {
            DataType::Dictionary(_, value) => value.as_ref(),
            other => other,
        };
        match self {
            Literal::Int(_) | Literal::Float(_) => target.is_numeric(),
            Literal::Bool(_) => matches!(target, DataType::Boolean),
            Literal::Str(_) => {
                matches!(
                    target,
                    DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
                ) || target.is_temporal()
            }
        }
    }

    fn scalar_array(&self, data_type: &DataType) -> Result<ArrayRef, ArrowError> {
        let array: ArrayRef = match self {
            Literal::Int(value) => Arc::new(Int64Array::from(vec![*value])),
            Literal::Float(value) => Arc::new(Float64Array::from(vec![*value])),
            Literal::Bool(value) => Arc::new(BooleanArray::from(vec![*value])),
            Literal::Str(value) => Arc::new(StringArray::from(vec![value.clone()])),
        };
        if array.data_type() == data_type {
            Ok(array)
        } else {
            cast(array.as_ref(), data_type)
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(value) => write!(f, "{value}"),
            Literal::Float(value) => write!(f, "{value}"),
            Literal::Bool(value) => write!(f, "{value}"),
            Literal::Str(value) => write!(f, "'{value}'"),
        }
    }
}

pub fn compile_where_terms(terms: &[String]) -> Result<Vec<WhereTerm>, Error> {
    terms.iter().map(|term| compile_where_term(term)).collect()
}

fn compile_where_term(raw: &str) -> Result<WhereTerm, Error> {
    let text = raw.trim();
    let ident_end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
        .unwrap_or(text.len());
    let column = &text[..ident_end];
    if column.is_empty() {
        return Err(invalid_term(raw, "expected a column name"));
    }
    let rest = text[ident_end..].trim_start();
    let Some((op, rest)) = parse_op(rest) else {
        return Err(invalid_term(raw, "expected a comparison operator"));
    };
    let Some(literal) = parse_literal(rest.trim()) else {
        return Err(invalid_term(raw, "expected a literal value"));
    };
    Ok(WhereTerm {
        column: column.to_string(),
        op,
        literal,
    })
}

fn parse_op(text: &str) -> Option<(CmpOp, &str)> {
    const OPS: [(&str, CmpOp); 7] = [
        ("==", CmpOp::Eq),
        ("!=", CmpOp::Ne),
        ("<=", CmpOp::Le),
        (">=", CmpOp::Ge),
        ("<", CmpOp::Lt),
        (">", CmpOp::Gt),
        ("=", CmpOp::Eq),
    ];
    OPS.iter()
        .find_map(|(token, op)| text.strip_prefix(token).map(|rest| (*op, rest)))
}

fn parse_literal(text: &str) -> Option<Literal> {
    if text.len() >= 2 {
        for quote in ['\'', '"'] {
            if text.starts_with(quote) && text.ends_with(quote) {
                return Some(Literal::Str(text[1..text.len() - 1].to_string()));
            }
        }
    }
    match text {
        "true" => return Some(Literal::Bool(true)),
        "false" => return Some(Literal::Bool(false)),
        _ => {}
    }
    if let Ok(value) = text.parse::<i64>() {
        return Some(Literal::Int(value));
    }
    if let Ok(value) = text.parse::<f64>() {
        return Some(Literal::Float(value));
    }
    None
}

fn invalid_term(raw: &str, reason: &str) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message(format!("invalid where term `{raw}`: {reason}"))
        .with_hint("Terms look like `value > 3`, `name == 'alice'`, or `flag != true`.")
}
