//! Training Reports
//!
//! Console summary for operators and a JSON artifact for downstream
//! tooling, behind one [`Reporter`] trait.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use fatigue_classifier::EvaluationResult;
use onset_eval::OnsetEvaluation;
use serde::Serialize;
use tracing::info;

use crate::PipelineError;

/// What a training run reports
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TrainingReport<'a> {
    pub evaluation: &'a EvaluationResult,
    pub onset: &'a OnsetEvaluation,
}

/// Sink for a training report
pub trait Reporter {
    fn report(&mut self, report: &TrainingReport<'_>) -> Result<(), PipelineError>;
}

fn optional(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "n/a".to_string(),
    }
}

/// Human-readable report on any writer
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, report: &TrainingReport<'_>) -> std::io::Result<()> {
        let eval = report.evaluation;
        let out = &mut self.out;

        writeln!(out, "=== Cross-validated classification ===")?;
        writeln!(out, "Selected threshold: {:.3}", eval.threshold)?;
        writeln!(out, "Balanced accuracy:  {:.3}", eval.balanced_accuracy)?;
        writeln!(out, "ROC-AUC:            {}", optional(eval.roc_auc, 3))?;
        writeln!(out, "PR-AUC:             {}", optional(eval.average_precision, 3))?;
        writeln!(out)?;

        let [[tn, fp], [fn_, tp]] = eval.confusion.as_array();
        writeln!(out, "Confusion matrix (rows = true, cols = predicted):")?;
        writeln!(out, "{:>12} {:>8} {:>8}", "", "fresh", "fatigued")?;
        writeln!(out, "{:>12} {:>8} {:>8}", "fresh", tn, fp)?;
        writeln!(out, "{:>12} {:>8} {:>8}", "fatigued", fn_, tp)?;
        writeln!(out)?;
        write!(out, "{}", eval.report)?;

        let warnings = eval.warnings();
        if !warnings.is_empty() {
            writeln!(out)?;
            for (fold, warning) in warnings {
                writeln!(out, "Fold {}: {:?}", fold, warning)?;
            }
        }

        let summary = &report.onset.summary;
        writeln!(out)?;
        writeln!(out, "=== Onset timing ===")?;
        writeln!(out, "Files:               {}", summary.n_files)?;
        writeln!(
            out,
            "No onset predicted:  {} ({:.1}%)",
            summary.n_no_prediction,
            100.0 * summary.fraction_no_prediction
        )?;
        writeln!(out, "Mean error (reps):   {}", optional(summary.mean_error, 2))?;
        writeln!(out, "Median error (reps): {}", optional(summary.median_error, 2))?;
        writeln!(out, "MAE (reps):          {}", optional(summary.mean_abs_error, 2))?;
        writeln!(out)?;
        writeln!(out, "{:<24} {:>8} {:>10} {:>6}", "file", "failure", "predicted", "error")?;
        for call in &report.onset.calls {
            writeln!(
                out,
                "{:<24} {:>8} {:>10} {:>6}",
                call.file_id,
                call.ground_truth_rep,
                call.predicted_onset_rep
                    .map_or_else(|| "-".to_string(), |r| r.to_string()),
                call.timing_error.map_or_else(|| "-".to_string(), |e| e.to_string())
            )?;
        }
        out.flush()
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn report(&mut self, report: &TrainingReport<'_>) -> Result<(), PipelineError> {
        self.write(report)
            .map_err(|e| PipelineError::Report(e.to_string()))
    }
}

/// Pretty-printed JSON report at `path`
pub struct JsonReporter {
    path: PathBuf,
}

impl JsonReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Reporter for JsonReporter {
    fn report(&mut self, report: &TrainingReport<'_>) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::Report(format!("{}: {}", parent.display(), e)))?;
        }
        let file = File::create(&self.path)
            .map_err(|e| PipelineError::Report(format!("{}: {}", self.path.display(), e)))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, report)
            .map_err(|e| PipelineError::Report(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| PipelineError::Report(e.to_string()))?;
        info!("Wrote evaluation report to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fatigue_classifier::train_eval;
    use ndarray::Array2;
    use onset_eval::{OnsetCall, TimingSummary};

    fn evaluation() -> EvaluationResult {
        let mut values = Vec::new();
        let mut labels = Vec::new();
        let mut groups = Vec::new();
        for g in 0..3 {
            for k in 0..6 {
                let fatigued = k >= 3;
                values.push(if fatigued { 1.0 } else { -1.0 } + 0.1 * g as f64 + 0.05 * k as f64);
                labels.push(fatigued);
                groups.push(format!("g{}", g));
            }
        }
        let x = Array2::from_shape_vec((values.len(), 1), values).unwrap();
        let config = fatigue_classifier::TrainConfig {
            n_splits: 3,
            ..Default::default()
        };
        train_eval(x.view(), &labels, &groups, &config).unwrap()
    }

    fn onset() -> OnsetEvaluation {
        let calls = vec![
            OnsetCall {
                file_id: "g0".to_string(),
                ground_truth_rep: 5,
                predicted_onset_rep: Some(6),
                timing_error: Some(1),
            },
            OnsetCall {
                file_id: "g1".to_string(),
                ground_truth_rep: 4,
                predicted_onset_rep: None,
                timing_error: None,
            },
        ];
        let summary = TimingSummary::from_calls(&calls);
        OnsetEvaluation { calls, summary }
    }

    #[test]
    fn test_console_report() {
        let (evaluation, onset) = (evaluation(), onset());
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter
            .report(&TrainingReport {
                evaluation: &evaluation,
                onset: &onset,
            })
            .unwrap();
        let text = String::from_utf8(reporter.into_inner()).unwrap();

        assert!(text.contains("Selected threshold:"));
        assert!(text.contains("Confusion matrix"));
        assert!(text.contains("precision"));
        assert!(text.contains("No onset predicted:  1 (50.0%)"));
        assert!(text.lines().any(|l| l.starts_with("g1") && l.trim_end().ends_with('-')));
    }

    #[test]
    fn test_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("eval.json");
        let (evaluation, onset) = (evaluation(), onset());
        JsonReporter::new(&path)
            .report(&TrainingReport {
                evaluation: &evaluation,
                onset: &onset,
            })
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["onset"]["summary"]["n_files"], 2);
        assert_eq!(value["onset"]["calls"][1]["predicted_onset_rep"], serde_json::Value::Null);
        assert_eq!(
            value["evaluation"]["oof_proba"].as_array().unwrap().len(),
            evaluation.oof_proba.len()
        );
    }
}
