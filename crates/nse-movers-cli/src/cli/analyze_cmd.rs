//! Run every query over a CSV already on disk.

use std::path::Path;

use anyhow::{Context, Result};
use nse_movers::config::expand_home;
use nse_movers::MarketAnalyzer;

use super::output;

pub fn run(csv: &str, count: usize) -> Result<()> {
    analyze_file(&expand_home(csv), count)
}

pub fn analyze_file(path: &Path, count: usize) -> Result<()> {
    let mut analyzer = MarketAnalyzer::new(path);
    analyzer
        .load()
        .with_context(|| format!("failed to load {}", path.display()))?;

    let results = analyzer.run_all(count);
    output::print_results(path, &results);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_an_error() {
        let err = run("/nonexistent/snapshot.csv", 5).unwrap_err();
        assert!(format!("{err:#}").contains("File not found"));
    }

    #[test]
    fn test_partial_schema_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.csv");
        std::fs::write(&path, "SYMBOL,%CHNG\nA,1.5\nB,-0.5\n").unwrap();
        analyze_file(&path, 5).unwrap();
    }
}
