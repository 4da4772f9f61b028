//! Hold-out evaluation of a fitted scorer
//!
//! Reported in bundle metadata only; nothing here feeds back into training.

use super::inference::decide;
use serde::{Deserialize, Serialize};

/// Probability clamp for log loss
const LOG_LOSS_EPSILON: f64 = 1e-15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub rows: usize,
    pub threshold: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub log_loss: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct ConfusionMatrix {
    tp: usize,
    fp: usize,
    tn: usize,
    fn_: usize,
}

impl ConfusionMatrix {
    fn record(&mut self, predicted_late: bool, actually_late: bool) {
        match (predicted_late, actually_late) {
            (true, true) => self.tp += 1,
            (true, false) => self.fp += 1,
            (false, false) => self.tn += 1,
            (false, true) => self.fn_ += 1,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Score `(probability, target)` pairs at `threshold`.
///
/// Classifies with [`decide`], the rule serving uses. Returns `None`
/// for an empty set.
pub fn evaluate(pairs: &[(f64, bool)], threshold: f64) -> Option<EvaluationReport> {
    if pairs.is_empty() {
        return None;
    }

    let mut matrix = ConfusionMatrix::default();
    let mut log_loss = 0.0;
    for &(p, late) in pairs {
        matrix.record(decide(p, threshold), late);
        let p = p.clamp(LOG_LOSS_EPSILON, 1.0 - LOG_LOSS_EPSILON);
        log_loss -= if late { p.ln() } else { (1.0 - p).ln() };
    }

    let precision = ratio(matrix.tp, matrix.tp + matrix.fp);
    let recall = ratio(matrix.tp, matrix.tp + matrix.fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    Some(EvaluationReport {
        rows: pairs.len(),
        threshold,
        accuracy: ratio(matrix.tp + matrix.tn, pairs.len()),
        precision,
        recall,
        f1,
        log_loss: log_loss / pairs.len() as f64,
    })
}
