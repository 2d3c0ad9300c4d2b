//! Binary classification metrics (Human = 0, Bot = 1)

use serde::{Deserialize, Serialize};
use std::fmt;

/// 2x2 confusion matrix laid out as `[[tn, fp], [fn, tp]]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    /// Count outcomes where `true` means Bot
    pub fn from_pairs(y_true: &[bool], y_pred: &[bool]) -> Self {
        let mut cm = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t, p) {
                (true, true) => cm.tp += 1,
                (false, true) => cm.fp += 1,
                (false, false) => cm.tn += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    pub fn as_rows(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.tn.max(self.fp).max(self.fn_).max(self.tp).to_string().len();
        writeln!(f, "[[{:>w$} {:>w$}]", self.tn, self.fp, w = width)?;
        write!(f, " [{:>w$} {:>w$}]]", self.fn_, self.tp, w = width)
    }
}

/// Precision, recall, F1 and support for one class
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn new(true_positive: usize, predicted: usize, support: usize) -> Self {
        let precision = ratio(true_positive, predicted);
        let recall = ratio(true_positive, support);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            precision,
            recall,
            f1,
            support,
        }
    }
}

/// Zero-division yields 0
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Per-class and averaged metrics for one signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub human: ClassMetrics,
    pub bot: ClassMetrics,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
    pub confusion: ConfusionMatrix,
}

impl ClassificationReport {
    pub fn from_confusion(confusion: ConfusionMatrix) -> Self {
        let cm = confusion;
        let human = ClassMetrics::new(cm.tn, cm.tn + cm.fn_, cm.tn + cm.fp);
        let bot = ClassMetrics::new(cm.tp, cm.tp + cm.fp, cm.tp + cm.fn_);
        let total = cm.total();

        let macro_avg = ClassMetrics {
            precision: (human.precision + bot.precision) / 2.0,
            recall: (human.recall + bot.recall) / 2.0,
            f1: (human.f1 + bot.f1) / 2.0,
            support: total,
        };

        let weight = |h: f64, b: f64| {
            if total == 0 {
                0.0
            } else {
                (h * human.support as f64 + b * bot.support as f64) / total as f64
            }
        };
        let weighted_avg = ClassMetrics {
            precision: weight(human.precision, bot.precision),
            recall: weight(human.recall, bot.recall),
            f1: weight(human.f1, bot.f1),
            support: total,
        };

        Self {
            human,
            bot,
            accuracy: ratio(cm.tn + cm.tp, total),
            macro_avg,
            weighted_avg,
            confusion,
        }
    }

    /// `true` means Bot in both slices
    pub fn from_pairs(y_true: &[bool], y_pred: &[bool]) -> Self {
        Self::from_confusion(ConfusionMatrix::from_pairs(y_true, y_pred))
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for (name, m) in [("Human", &self.human), ("Bot", &self.bot)] {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.confusion.total()
        )?;
        for (name, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_confusion_counts() {
        let y_true = [false, false, false, true, true];
        let y_pred = [false, true, false, true, false];
        let cm = ConfusionMatrix::from_pairs(&y_true, &y_pred);
        assert_eq!(cm.as_rows(), [[2, 1], [1, 1]]);
        assert_eq!(cm.total(), 5);
    }

    #[test]
    fn test_report_matches_hand_computed() {
        let y_true = [false, false, false, true, true];
        let y_pred = [false, true, false, true, false];
        let report = ClassificationReport::from_pairs(&y_true, &y_pred);

        assert_close(report.human.precision, 2.0 / 3.0);
        assert_close(report.human.recall, 2.0 / 3.0);
        assert_close(report.human.f1, 2.0 / 3.0);
        assert_eq!(report.human.support, 3);

        assert_close(report.bot.precision, 0.5);
        assert_close(report.bot.recall, 0.5);
        assert_close(report.bot.f1, 0.5);
        assert_eq!(report.bot.support, 2);

        assert_close(report.accuracy, 0.6);
        assert_close(report.macro_avg.precision, (2.0 / 3.0 + 0.5) / 2.0);
        assert_close(report.weighted_avg.precision, 0.6);
        assert_close(report.weighted_avg.f1, 0.6);
    }

    #[test]
    fn test_zero_division_yields_zero() {
        let y_true = [false, true, true];
        let y_pred = [false, false, false];
        let report = ClassificationReport::from_pairs(&y_true, &y_pred);

        assert_eq!(report.bot.precision, 0.0);
        assert_eq!(report.bot.recall, 0.0);
        assert_eq!(report.bot.f1, 0.0);
        assert_close(report.human.precision, 1.0 / 3.0);
        assert_eq!(report.human.recall, 1.0);
    }

    #[test]
    fn test_display_layout() {
        let report = ClassificationReport::from_pairs(&[false, true], &[false, true]);
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("weighted avg"));
        assert!(text.contains("1.00"));
    }
}
