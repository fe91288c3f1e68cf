//! Schema normalizer: reads the published CSV into a [`NormalizedTable`].
//!
//! Every column is read as text. Headers are trimmed and mapped through an
//! alias table, then the fixed numeric columns are cast to `Float64`. The cast
//! is non-strict, so anything unparseable or non-finite becomes null. Other
//! columns pass through as text.

use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

use polars::prelude::*;

use crate::error::{LoadError, LoadResult};
use crate::types::{NormalizedTable, NUMERIC_COLUMNS, PCT_CHANGE_30D};

/// Known historical header spellings and their canonical names.
pub const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("30 D   %CHNG", PCT_CHANGE_30D),
    ("30 D  %CHNG", PCT_CHANGE_30D),
    ("30 D % CHNG", PCT_CHANGE_30D),
    ("30D %CHNG", PCT_CHANGE_30D),
];

/// `observed → canonical` header renames.
///
/// Canonical names must not themselves appear as observed variants, so that
/// normalizing a header twice is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderAliases {
    pairs: Vec<(String, String)>,
}

impl Default for HeaderAliases {
    fn default() -> Self {
        Self {
            pairs: DEFAULT_ALIASES
                .iter()
                .map(|(observed, canonical)| (observed.to_string(), canonical.to_string()))
                .collect(),
        }
    }
}

impl HeaderAliases {
    /// An alias table with no entries.
    pub fn empty() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Add one rename. Later entries for the same observed name win.
    pub fn with_alias(mut self, observed: &str, canonical: &str) -> Self {
        let observed = observed.trim().to_string();
        self.pairs.retain(|(o, _)| *o != observed);
        self.pairs.push((observed, canonical.trim().to_string()));
        self
    }

    /// Canonical name for an already-trimmed header.
    pub fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.pairs
            .iter()
            .find(|(observed, _)| observed == name)
            .map(|(_, canonical)| canonical.as_str())
            .unwrap_or(name)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Trim a raw header (including a leading byte-order mark) and apply aliases.
pub fn normalize_header(raw: &str, aliases: &HeaderAliases) -> String {
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    aliases.canonical(trimmed).to_string()
}

/// Normalize a whole header row.
pub fn normalize_headers<S: AsRef<str>>(raw: &[S], aliases: &HeaderAliases) -> Vec<String> {
    raw.iter()
        .map(|h| normalize_header(h.as_ref(), aliases))
        .collect()
}

/// Numeric view of a text column: whitespace stripped, cast to `Float64`,
/// non-finite values nulled.
pub fn coerce_numeric(name: &str) -> Expr {
    let value = col(name)
        .str()
        .strip_chars(lit(NULL))
        .cast(DataType::Float64);
    when(value.clone().is_finite())
        .then(value)
        .otherwise(lit(NULL))
        .cast(DataType::Float64)
        .alias(name)
}

/// Loads delimited files into normalized tables.
#[derive(Debug, Clone, Default)]
pub struct SchemaNormalizer {
    aliases: HeaderAliases,
}

impl SchemaNormalizer {
    pub fn new(aliases: HeaderAliases) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &HeaderAliases {
        &self.aliases
    }

    /// Load and normalize the CSV at `path`.
    pub fn load(&self, path: &Path) -> LoadResult<NormalizedTable> {
        if !path.exists() {
            return Err(LoadError::FileNotFound(path.to_path_buf()));
        }
        let frame = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .with_truncate_ragged_lines(true)
            .finish()?
            .collect()?;
        let table = self.normalize(frame)?;
        tracing::info!(
            "Loaded {} rows x {} columns from {}",
            table.row_count(),
            table.columns().len(),
            path.display()
        );
        Ok(table)
    }

    /// Normalize CSV text already in memory.
    pub fn read(&self, bytes: &[u8]) -> LoadResult<NormalizedTable> {
        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .map_parse_options(|opts| opts.with_truncate_ragged_lines(true))
            .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
            .finish()?;
        self.normalize(frame)
    }

    /// Rename to canonical headers and coerce the numeric columns.
    ///
    /// When two raw headers normalize to the same name the first one wins and
    /// the later column is dropped.
    fn normalize(&self, frame: DataFrame) -> LoadResult<NormalizedTable> {
        let raw: Vec<String> = frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        let names = normalize_headers(&raw, &self.aliases);

        let mut seen = HashSet::new();
        let mut renamed = Vec::with_capacity(raw.len());
        for (raw, name) in raw.iter().zip(&names) {
            if seen.insert(name.as_str()) {
                renamed.push(col(raw.as_str()).alias(name.as_str()));
            } else {
                tracing::debug!("Dropping duplicate column '{raw}' (normalizes to '{name}')");
            }
        }

        let numeric: Vec<Expr> = NUMERIC_COLUMNS
            .iter()
            .filter(|column| seen.contains(**column))
            .map(|column| coerce_numeric(column))
            .collect();

        let frame = frame.lazy().select(renamed).with_columns(numeric).collect()?;
        Ok(NormalizedTable::new(frame))
    }
}
