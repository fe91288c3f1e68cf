//! Analysis engine: ranked and filtered views over one loaded snapshot.
//!
//! Each query is a lazy polars plan over the loaded frame. Rows with a null
//! sort or filter key are left out of that query. Ties keep source row order
//! (all sorts run with `maintain_order`).

pub mod query;

use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::error::{AnalysisError, AnalysisResult, LoadResult};
use crate::normalize::SchemaNormalizer;
use crate::types::{Cell, NormalizedTable, ResultTable, PCT_CHANGE, PCT_CHANGE_30D};

pub use query::{
    DerivedMetric, Query, SortOrder, ABOVE_LOW_THRESHOLD, BELOW_HIGH_THRESHOLD,
    DEFAULT_RESULT_COUNT,
};

/// Owns the normalized snapshot for one analysis session.
#[derive(Debug, Clone)]
pub struct MarketAnalyzer {
    file_path: PathBuf,
    normalizer: SchemaNormalizer,
    table: Option<NormalizedTable>,
}

impl MarketAnalyzer {
    /// Analyzer for the file at `path`. Nothing is read until [`load`](Self::load).
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_normalizer(path, SchemaNormalizer::default())
    }

    pub fn with_normalizer(path: impl AsRef<Path>, normalizer: SchemaNormalizer) -> Self {
        Self {
            file_path: path.as_ref().to_path_buf(),
            normalizer,
            table: None,
        }
    }

    /// Analyzer over an already-normalized table.
    pub fn from_table(table: NormalizedTable) -> Self {
        Self {
            file_path: PathBuf::new(),
            normalizer: SchemaNormalizer::default(),
            table: Some(table),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Read and normalize the file. Replaces any previously loaded table.
    pub fn load(&mut self) -> LoadResult<()> {
        let table = self.normalizer.load(&self.file_path)?;
        self.table = Some(table);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.table.is_some()
    }

    pub fn table(&self) -> Option<&NormalizedTable> {
        self.table.as_ref()
    }

    /// Highest day change first.
    pub fn top_gainers(&self, n: usize) -> AnalysisResult<ResultTable> {
        let query = Query::TopGainers;
        let table = self.table_for(query)?;
        let plan = ranked(table.lazy(), PCT_CHANGE, SortOrder::Descending);
        collect(plan, query.output_columns(), n)
    }

    /// Lowest day change first.
    pub fn top_losers(&self, n: usize) -> AnalysisResult<ResultTable> {
        let query = Query::TopLosers;
        let table = self.table_for(query)?;
        let plan = ranked(table.lazy(), PCT_CHANGE, SortOrder::Ascending);
        collect(plan, query.output_columns(), n)
    }

    /// Rows at least [`BELOW_HIGH_THRESHOLD`] percent under their 52-week high,
    /// furthest below first.
    pub fn below_high(&mut self, n: usize) -> AnalysisResult<ResultTable> {
        let query = Query::BelowHigh;
        let metric = DerivedMetric::PctBelowHigh;
        let table = self.table_for_mut(query)?;
        table.set_column(metric.expr())?;

        let plan = ranked(table.lazy(), metric.column(), SortOrder::Descending)
            .filter(col(metric.column()).gt_eq(lit(BELOW_HIGH_THRESHOLD)));
        collect(plan, query.output_columns(), n)
    }

    /// Rows at least [`ABOVE_LOW_THRESHOLD`] percent over their 52-week low,
    /// in source row order.
    // Unlike `below_high` this view is not ranked by its metric; the
    // asymmetry is kept until the owner decides otherwise.
    pub fn above_low(&mut self, n: usize) -> AnalysisResult<ResultTable> {
        let query = Query::AboveLow;
        let metric = DerivedMetric::PctAboveLow;
        let table = self.table_for_mut(query)?;
        table.set_column(metric.expr())?;

        let plan = table
            .lazy()
            .filter(col(metric.column()).gt_eq(lit(ABOVE_LOW_THRESHOLD)));
        collect(plan, query.output_columns(), n)
    }

    /// Highest trailing 30-day change first.
    pub fn highest_returns_30d(&self, n: usize) -> AnalysisResult<ResultTable> {
        let query = Query::Leaders30d;
        let table = self.table_for(query)?;
        let plan = ranked(table.lazy(), PCT_CHANGE_30D, SortOrder::Descending);
        collect(plan, query.output_columns(), n)
    }

    /// Run one query by name.
    pub fn run(&mut self, query: Query, n: usize) -> AnalysisResult<ResultTable> {
        match query {
            Query::TopGainers => self.top_gainers(n),
            Query::TopLosers => self.top_losers(n),
            Query::BelowHigh => self.below_high(n),
            Query::AboveLow => self.above_low(n),
            Query::Leaders30d => self.highest_returns_30d(n),
        }
    }

    /// Run every query independently; one failing query does not affect the others.
    pub fn run_all(&mut self, n: usize) -> Vec<(Query, AnalysisResult<ResultTable>)> {
        Query::ALL
            .into_iter()
            .map(|query| {
                let result = self.run(query, n);
                if let Err(e) = &result {
                    tracing::warn!("Query {} skipped: {e}", query.name());
                }
                (query, result)
            })
            .collect()
    }

    fn table_for(&self, query: Query) -> AnalysisResult<&NormalizedTable> {
        let table = self.table.as_ref().ok_or(AnalysisError::NotLoaded)?;
        if let Some(missing) = query
            .required_columns()
            .iter()
            .find(|column| !table.has_column(column))
        {
            return Err(AnalysisError::MissingColumn(missing.to_string()));
        }
        Ok(table)
    }

    fn table_for_mut(&mut self, query: Query) -> AnalysisResult<&mut NormalizedTable> {
        self.table_for(query)?;
        self.table.as_mut().ok_or(AnalysisError::NotLoaded)
    }
}

/// Rows with a non-null `key`, stably sorted by it.
fn ranked(plan: LazyFrame, key: &str, order: SortOrder) -> LazyFrame {
    plan.filter(col(key).is_not_null()).sort(
        [key],
        SortMultipleOptions::default()
            .with_order_descending(order == SortOrder::Descending)
            .with_maintain_order(true),
    )
}

/// Run `plan`, keep the first `n` rows and project `columns` into a result.
fn collect(plan: LazyFrame, columns: &[&str], n: usize) -> AnalysisResult<ResultTable> {
    let limit = IdxSize::try_from(n).unwrap_or(IdxSize::MAX);
    let selection: Vec<Expr> = columns.iter().map(|column| col(*column)).collect();
    let frame = NormalizedTable::new(plan.select(selection).limit(limit).collect()?);

    let mut result = ResultTable::new(columns.iter().map(|c| c.to_string()).collect());
    for row in 0..frame.row_count() {
        result.push(
            columns
                .iter()
                .map(|column| frame.cell(row, column).unwrap_or(Cell::Missing))
                .collect(),
        );
    }
    Ok(result)
}
