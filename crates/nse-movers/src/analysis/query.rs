//! The fixed query catalogue and the derived metrics it relies on.

use polars::prelude::*;

use crate::types::{HIGH_52W, LOW_52W, LTP, PCT_CHANGE, PCT_CHANGE_30D, SYMBOL};

/// Result count used when the caller does not choose one.
pub const DEFAULT_RESULT_COUNT: usize = 5;

/// Minimum distance below the 52-week high, in percent.
pub const BELOW_HIGH_THRESHOLD: f64 = 30.0;

/// Minimum distance above the 52-week low, in percent.
pub const ABOVE_LOW_THRESHOLD: f64 = 20.0;

/// A column computed from `LTP` and one 52-week extreme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedMetric {
    /// `(52W H − LTP) / 52W H × 100`
    PctBelowHigh,
    /// `(LTP − 52W L) / 52W L × 100`
    PctAboveLow,
}

impl DerivedMetric {
    /// Name of the column the metric is written to.
    pub fn column(self) -> &'static str {
        match self {
            DerivedMetric::PctBelowHigh => "%-below-high",
            DerivedMetric::PctAboveLow => "%-above-low",
        }
    }

    /// The 52-week reference column.
    pub fn reference(self) -> &'static str {
        match self {
            DerivedMetric::PctBelowHigh => HIGH_52W,
            DerivedMetric::PctAboveLow => LOW_52W,
        }
    }

    /// Column expression for the metric; missing inputs or a zero reference
    /// yield null.
    pub fn expr(self) -> Expr {
        let ltp = col(LTP);
        let reference = col(self.reference());
        let value = match self {
            DerivedMetric::PctBelowHigh => (reference.clone() - ltp) / reference * lit(100.0),
            DerivedMetric::PctAboveLow => (ltp - reference.clone()) / reference * lit(100.0),
        };
        when(value.clone().is_finite())
            .then(value)
            .otherwise(lit(NULL))
            .cast(DataType::Float64)
            .alias(self.column())
    }
}

/// Sort direction of a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// The five supported views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    TopGainers,
    TopLosers,
    BelowHigh,
    AboveLow,
    Leaders30d,
}

impl Query {
    /// All queries in presentation order.
    pub const ALL: [Query; 5] = [
        Query::TopGainers,
        Query::TopLosers,
        Query::BelowHigh,
        Query::AboveLow,
        Query::Leaders30d,
    ];

    /// Stable machine-readable identifier.
    pub fn name(self) -> &'static str {
        match self {
            Query::TopGainers => "top_gainers",
            Query::TopLosers => "top_losers",
            Query::BelowHigh => "below_52w_high",
            Query::AboveLow => "above_52w_low",
            Query::Leaders30d => "leaders_30d",
        }
    }

    /// Human-readable heading.
    pub fn title(self) -> &'static str {
        match self {
            Query::TopGainers => "Top Gainers",
            Query::TopLosers => "Top Losers",
            Query::BelowHigh => "30% or More Below 52-Week High",
            Query::AboveLow => "20% or More Above 52-Week Low",
            Query::Leaders30d => "Highest Returns in Last 30 Days",
        }
    }

    /// Columns that must be present before the query may run.
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            Query::TopGainers | Query::TopLosers => &[SYMBOL, PCT_CHANGE],
            Query::BelowHigh => &[SYMBOL, LTP, HIGH_52W],
            Query::AboveLow => &[SYMBOL, LTP, LOW_52W],
            Query::Leaders30d => &[SYMBOL, PCT_CHANGE_30D],
        }
    }

    /// Columns of the result, in order.
    pub fn output_columns(self) -> &'static [&'static str] {
        match self {
            Query::TopGainers | Query::TopLosers => &[SYMBOL, PCT_CHANGE],
            Query::BelowHigh => &[SYMBOL, LTP, HIGH_52W, "%-below-high"],
            Query::AboveLow => &[SYMBOL, LTP, LOW_52W, "%-above-low"],
            Query::Leaders30d => &[SYMBOL, PCT_CHANGE_30D],
        }
    }

    /// Metric the query materialises before selecting rows, if any.
    pub fn derived_metric(self) -> Option<DerivedMetric> {
        match self {
            Query::BelowHigh => Some(DerivedMetric::PctBelowHigh),
            Query::AboveLow => Some(DerivedMetric::PctAboveLow),
            _ => None,
        }
    }
}
