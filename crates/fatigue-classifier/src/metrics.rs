//! Binary Classification Metrics

use std::fmt;

use serde::{Deserialize, Serialize};

/// 2x2 confusion counts; the positive class is "fatigued"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &[bool], y_pred: &[bool]) -> Self {
        let mut m = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t, p) {
                (false, false) => m.true_negatives += 1,
                (false, true) => m.false_positives += 1,
                (true, false) => m.false_negatives += 1,
                (true, true) => m.true_positives += 1,
            }
        }
        m
    }

    /// `[[tn, fp], [fn, tp]]`
    pub fn as_array(&self) -> [[usize; 2]; 2] {
        [
            [self.true_negatives, self.false_positives],
            [self.false_negatives, self.true_positives],
        ]
    }

    pub fn total(&self) -> usize {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }

    pub fn predicted_positives(&self) -> usize {
        self.false_positives + self.true_positives
    }

    /// Mean recall over the classes present in the ground truth
    pub fn balanced_accuracy(&self) -> f64 {
        let recalls: Vec<f64> = [
            (self.true_negatives, self.true_negatives + self.false_positives),
            (self.true_positives, self.true_positives + self.false_negatives),
        ]
        .iter()
        .filter(|(_, support)| *support > 0)
        .map(|&(hit, support)| hit as f64 / support as f64)
        .collect();

        if recalls.is_empty() {
            0.0
        } else {
            recalls.iter().sum::<f64>() / recalls.len() as f64
        }
    }
}

/// `p >= threshold`
pub fn apply_threshold(proba: &[f64], threshold: f64) -> Vec<bool> {
    proba.iter().map(|&p| p >= threshold).collect()
}

fn has_both_classes(y: &[bool]) -> bool {
    y.iter().any(|&v| v) && y.iter().any(|&v| !v)
}

/// Area under the ROC curve from score ranks, ties sharing their mean rank.
/// `None` unless both classes are present.
pub fn roc_auc(y_true: &[bool], score: &[f64]) -> Option<f64> {
    if y_true.len() != score.len() || !has_both_classes(y_true) {
        return None;
    }
    let mut order: Vec<usize> = (0..score.len()).collect();
    order.sort_by(|&a, &b| score[a].total_cmp(&score[b]));

    let mut ranks = vec![0.0; score.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && score[order[j + 1]] == score[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j+1 share their mean
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = mean_rank;
        }
        i = j + 1;
    }

    let n_pos = y_true.iter().filter(|&&v| v).count() as f64;
    let n_neg = y_true.len() as f64 - n_pos;
    let rank_sum: f64 = ranks.iter().zip(y_true).filter(|(_, &t)| t).map(|(r, _)| r).sum();
    Some((rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Step-wise area under the precision-recall curve,
/// `sum_k (R_k - R_{k-1}) * P_k` over distinct score thresholds.
/// `None` unless both classes are present.
pub fn average_precision(y_true: &[bool], score: &[f64]) -> Option<f64> {
    if y_true.len() != score.len() || !has_both_classes(y_true) {
        return None;
    }
    let mut order: Vec<usize> = (0..score.len()).collect();
    order.sort_by(|&a, &b| score[b].total_cmp(&score[a]));

    let n_pos = y_true.iter().filter(|&&v| v).count() as f64;
    let (mut tp, mut fp) = (0.0, 0.0);
    let mut prev_recall = 0.0;
    let mut ap = 0.0;
    for (pos, &i) in order.iter().enumerate() {
        if y_true[i] {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_tie = order
            .get(pos + 1)
            .map_or(true, |&next| score[next] != score[i]);
        if last_of_tie {
            let recall = tp / n_pos;
            let precision = tp / (tp + fp);
            ap += (recall - prev_recall) * precision;
            prev_recall = recall;
        }
    }
    Some(ap)
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Precision, recall and F1 of one class (or an average row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class and averaged precision/recall/F1; undefined ratios are 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn from_confusion(m: &ConfusionMatrix) -> Self {
        let class = |label: &str, tp: usize, fp: usize, fn_: usize| {
            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, tp + fn_);
            ClassMetrics {
                label: label.to_string(),
                precision,
                recall,
                f1: f1(precision, recall),
                support: tp + fn_,
            }
        };
        let classes = vec![
            class("0", m.true_negatives, m.false_negatives, m.false_positives),
            class("1", m.true_positives, m.false_positives, m.false_negatives),
        ];

        let total = m.total();
        let average = |label: &str, weight: &dyn Fn(&ClassMetrics) -> f64| {
            let norm: f64 = classes.iter().map(|c| weight(c)).sum();
            let avg = |f: fn(&ClassMetrics) -> f64| {
                if norm == 0.0 {
                    0.0
                } else {
                    classes.iter().map(|c| weight(c) * f(c)).sum::<f64>() / norm
                }
            };
            ClassMetrics {
                label: label.to_string(),
                precision: avg(|c| c.precision),
                recall: avg(|c| c.recall),
                f1: avg(|c| c.f1),
                support: total,
            }
        };
        let macro_avg = average("macro avg", &|_: &ClassMetrics| 1.0);
        let weighted_avg = average("weighted avg", &|c: &ClassMetrics| c.support as f64);

        Self {
            accuracy: ratio(m.true_negatives + m.true_positives, total),
            classes,
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        let row = |f: &mut fmt::Formatter<'_>, c: &ClassMetrics| {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.label, c.precision, c.recall, c.f1, c.support
            )
        };
        for c in &self.classes {
            row(f, c)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        row(f, &self.macro_avg)?;
        row(f, &self.weighted_avg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_and_balanced_accuracy() {
        let y = [false, false, false, true, true];
        let pred = [false, true, false, true, false];
        let m = ConfusionMatrix::from_predictions(&y, &pred);
        assert_eq!(m.as_array(), [[2, 1], [1, 1]]);
        assert!((m.balanced_accuracy() - (2.0 / 3.0 + 0.5) / 2.0).abs() < 1e-12);

        // Only the present class contributes
        let single = ConfusionMatrix::from_predictions(&[true, true], &[true, false]);
        assert_eq!(single.balanced_accuracy(), 0.5);
    }

    #[test]
    fn test_roc_auc() {
        let y = [false, false, true, true];
        assert_eq!(roc_auc(&y, &[0.1, 0.4, 0.35, 0.8]), Some(0.75));
        assert_eq!(roc_auc(&y, &[0.1, 0.2, 0.3, 0.4]), Some(1.0));
        // Full tie scores as chance
        assert_eq!(roc_auc(&y, &[0.5; 4]), Some(0.5));
        assert_eq!(roc_auc(&[true, true], &[0.1, 0.2]), None);
    }

    #[test]
    fn test_average_precision() {
        let y = [false, false, true, true];
        // Ranked: 0.8(+) 0.4(-) 0.35(+) 0.1(-) -> 0.5 * 1 + 0.5 * 2/3
        let ap = average_precision(&y, &[0.1, 0.4, 0.35, 0.8]).unwrap();
        assert!((ap - (0.5 + 1.0 / 3.0)).abs() < 1e-12);
        assert_eq!(average_precision(&y, &[0.5; 4]), Some(0.5));
        assert_eq!(average_precision(&[false, false], &[0.5, 0.1]), None);
    }

    #[test]
    fn test_classification_report() {
        let m = ConfusionMatrix {
            true_negatives: 8,
            false_positives: 2,
            false_negatives: 1,
            true_positives: 4,
        };
        let report = ClassificationReport::from_confusion(&m);
        let pos = &report.classes[1];
        assert!((pos.precision - 4.0 / 6.0).abs() < 1e-12);
        assert!((pos.recall - 0.8).abs() < 1e-12);
        assert_eq!(pos.support, 5);
        assert_eq!(report.classes[0].support, 10);
        assert!((report.accuracy - 12.0 / 15.0).abs() < 1e-12);
        let neg = &report.classes[0];
        assert!((report.macro_avg.recall - (0.8 + 0.8) / 2.0).abs() < 1e-12);
        assert!((report.weighted_avg.f1 - (10.0 * neg.f1 + 5.0 * pos.f1) / 15.0).abs() < 1e-12);

        let text = report.to_string();
        assert!(text.contains("weighted avg"));
        assert!(text.contains("accuracy"));
    }

    #[test]
    fn test_report_zero_division() {
        let m = ConfusionMatrix::from_predictions(&[false, false], &[false, false]);
        let report = ClassificationReport::from_confusion(&m);
        assert_eq!(report.classes[1].precision, 0.0);
        assert_eq!(report.classes[1].f1, 0.0);
        assert_eq!(report.accuracy, 1.0);
    }
}
