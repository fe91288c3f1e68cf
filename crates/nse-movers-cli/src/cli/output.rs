//! Terminal and JSON rendering of query results.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use nse_movers::error::AnalysisResult;
use nse_movers::{Query, ResultTable};

static JSON: AtomicBool = AtomicBool::new(false);

pub fn set_json(enabled: bool) {
    JSON.store(enabled, Ordering::Relaxed);
}

pub fn is_json() -> bool {
    JSON.load(Ordering::Relaxed)
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(_) => println!("{value}"),
    }
}

/// JSON error document. `kind` is present when the failure came from acquisition.
pub fn error_json(error: &anyhow::Error) -> serde_json::Value {
    let mut value = serde_json::json!({
        "error": true,
        "message": format!("{error:#}"),
    });
    if let Some(acquisition) = error.downcast_ref::<nse_movers::AcquisitionError>() {
        value["kind"] = serde_json::json!(acquisition.kind());
    }
    value
}

/// Print every query result in the active output mode.
pub fn print_results(source: &Path, results: &[(Query, AnalysisResult<ResultTable>)]) {
    if is_json() {
        print_json(&results_json(source, results));
    } else {
        print!("{}", render_report(source, results));
    }
}

/// JSON document: source path plus one entry per query, in query order.
pub fn results_json(
    source: &Path,
    results: &[(Query, AnalysisResult<ResultTable>)],
) -> serde_json::Value {
    let queries: Vec<serde_json::Value> = results
        .iter()
        .map(|(query, result)| match result {
            Ok(table) => serde_json::json!({
                "query": query.name(),
                "title": query.title(),
                "rows": table,
            }),
            Err(e) => serde_json::json!({
                "query": query.name(),
                "title": query.title(),
                "error": e.to_string(),
            }),
        })
        .collect();

    serde_json::json!({
        "source": source.display().to_string(),
        "queries": queries,
    })
}

/// Human-readable report of every query.
pub fn render_report(source: &Path, results: &[(Query, AnalysisResult<ResultTable>)]) -> String {
    let mut out = format!("Snapshot: {}\n", source.display());
    for (query, result) in results {
        out.push('\n');
        out.push_str(query.title());
        out.push('\n');
        out.push_str(&"=".repeat(query.title().len()));
        out.push('\n');
        match result {
            Ok(table) if table.is_empty() => out.push_str("  (no matching rows)\n"),
            Ok(table) => out.push_str(&render_table(table)),
            Err(e) => out.push_str(&format!("  [!!] skipped: {e}\n")),
        }
    }
    out
}

/// Aligned text table with a leading rank column.
pub fn render_table(table: &ResultTable) -> String {
    let mut header = vec!["#".to_string()];
    header.extend(table.columns().iter().cloned());

    let body: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| {
            let mut cells = vec![row.rank.to_string()];
            cells.extend(row.values.iter().map(|v| v.to_string()));
            cells
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for cells in &body {
        for (w, cell) in widths.iter_mut().zip(cells) {
            *w = (*w).max(cell.len());
        }
    }

    let mut out = String::new();
    for cells in std::iter::once(&header).chain(&body) {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{cell:<w$}"))
            .collect();
        out.push_str("  ");
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}
