//! Core table types shared by the normalizer and the analysis engine.

use std::fmt;

use polars::prelude::*;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;

/// Instrument identifier column.
pub const SYMBOL: &str = "SYMBOL";
/// Last traded price.
pub const LTP: &str = "LTP";
/// Day change in percent.
pub const PCT_CHANGE: &str = "%CHNG";
/// 52-week high.
pub const HIGH_52W: &str = "52W H";
/// 52-week low.
pub const LOW_52W: &str = "52W L";
/// Trailing 30-day change in percent. Optional in the published file.
pub const PCT_CHANGE_30D: &str = "30 D %CHNG";

/// Columns coerced to numeric-or-missing on load.
pub const NUMERIC_COLUMNS: [&str; 5] = [LTP, PCT_CHANGE, HIGH_52W, LOW_52W, PCT_CHANGE_30D];

/// A single typed cell of a [`NormalizedTable`].
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Missing,
}

impl Cell {
    /// Numeric value, if this cell holds one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value, if this cell holds one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Wrap a computed value; non-finite results become missing.
    pub fn from_number(value: f64) -> Self {
        if value.is_finite() {
            Cell::Number(value)
        } else {
            Cell::Missing
        }
    }
}

impl From<AnyValue<'_>> for Cell {
    fn from(value: AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => Cell::Missing,
            AnyValue::Float64(v) => Cell::from_number(v),
            AnyValue::Float32(v) => Cell::from_number(v as f64),
            AnyValue::String(s) => Cell::Text(s.to_string()),
            AnyValue::StringOwned(s) => Cell::Text(s.to_string()),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Number(v) => write!(f, "{v:.2}"),
            Cell::Missing => f.write_str("-"),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Number(v) => serializer.serialize_f64(*v),
            Cell::Missing => serializer.serialize_none(),
        }
    }
}

/// The loaded market snapshot: canonical headers over a polars frame.
///
/// Rows keep the order of the source file. Numeric columns are `Float64` with
/// null as the missing marker; every other column is a string column.
#[derive(Debug, Clone, Default)]
pub struct NormalizedTable {
    frame: DataFrame,
}

impl NormalizedTable {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// A lazy view over the current frame.
    pub fn lazy(&self) -> LazyFrame {
        self.frame.clone().lazy()
    }

    pub fn columns(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    pub fn row_count(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Cell at `row` in the named column.
    pub fn cell(&self, row: usize, column: &str) -> Option<Cell> {
        let column = self.frame.column(column).ok()?;
        if row >= column.len() {
            return None;
        }
        column.get(row).ok().map(Cell::from)
    }

    /// Numeric value at `row` in the named column; `None` when absent or missing.
    pub fn number(&self, row: usize, column: &str) -> Option<f64> {
        self.cell(row, column).and_then(|cell| cell.as_number())
    }

    /// Add or overwrite a column computed by `expr`.
    pub fn set_column(&mut self, expr: Expr) -> PolarsResult<()> {
        self.frame = self.lazy().with_column(expr).collect()?;
        Ok(())
    }
}

/// One ranked row of a [`ResultTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// 1-based position in the result.
    pub rank: usize,
    /// Selected values, aligned with [`ResultTable::columns`].
    pub values: Vec<Cell>,
}

/// The output of a query: rank-ordered rows over a fixed column selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; its rank is its position.
    pub fn push(&mut self, values: Vec<Cell>) {
        let rank = self.rows.len() + 1;
        self.rows.push(ResultRow { rank, values });
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value in the named column of the row at `position` (0-based).
    pub fn value(&self, position: usize, column: &str) -> Option<&Cell> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(position).and_then(|r| r.values.get(col))
    }

    /// Symbols in rank order.
    pub fn symbols(&self) -> Vec<&str> {
        (0..self.rows.len())
            .filter_map(|i| self.value(i, SYMBOL).and_then(Cell::as_text))
            .collect()
    }
}

/// Serializes as an ordered list of per-row maps, `rank` first.
impl Serialize for ResultTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&RowRecord {
                columns: &self.columns,
                row,
            })?;
        }
        seq.end()
    }
}

struct RowRecord<'a> {
    columns: &'a [String],
    row: &'a ResultRow,
}

impl Serialize for RowRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len() + 1))?;
        map.serialize_entry("rank", &self.row.rank)?;
        for (name, value) in self.columns.iter().zip(&self.row.values) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
