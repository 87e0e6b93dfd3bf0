// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch to <checkpoint_dir>/metrics.csv:
//
//   epoch,train_loss,val_loss,saved
//   1,0.693147,0.681200,true
//   2,0.652310,,false          ← no validation this epoch
//
// `epoch` is 1-based to match the log lines. `saved` marks
// the epochs that produced a new best checkpoint.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

const HEADER: &str = "epoch,train_loss,val_loss,saved";

/// One row of metrics for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,

    /// Mean per-pixel cross-entropy over the training batches
    pub train_loss: f64,

    /// Mean validation loss; None on epochs that skip validation
    pub val_loss: Option<f64>,

    /// Whether this epoch wrote the best checkpoint
    pub saved: bool,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: Option<f64>, saved: bool) -> Self {
        Self { epoch, train_loss, val_loss, saved }
    }

    fn to_csv_row(&self) -> String {
        let val = self.val_loss.map(|v| format!("{v:.6}")).unwrap_or_default();
        format!("{},{:.6},{},{}", self.epoch, self.train_loss, val, self.saved)
    }
}

/// Returns true if `val_loss` beats the best loss seen so far.
/// NaN never counts as an improvement.
pub fn is_improvement(val_loss: f64, best_val_loss: f64) -> bool {
    val_loss < best_val_loss
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet, so a
    /// resumed run keeps appending to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics dir '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        writeln!(f, "{}", m.to_csv_row())?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        assert!(is_improvement(2.3, 3.0));
        assert!(!is_improvement(2.3, 2.0));
        assert!(!is_improvement(f64::NAN, 1000.0));
    }

    #[test]
    fn test_rows_appended_after_header() {
        let tmp    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(tmp.path()).unwrap();
        logger.log(&EpochMetrics::new(1, 0.5, Some(0.25), true)).unwrap();
        logger.log(&EpochMetrics::new(2, 0.4, None, false)).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![
            HEADER,
            "1,0.500000,0.250000,true",
            "2,0.400000,,false",
        ]);
    }

    #[test]
    fn test_existing_log_is_not_truncated() {
        let tmp = tempfile::tempdir().unwrap();
        MetricsLogger::new(tmp.path()).unwrap()
            .log(&EpochMetrics::new(1, 1.0, None, false)).unwrap();
        let logger = MetricsLogger::new(tmp.path()).unwrap();
        let text = fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
