//! Streaming classification metrics.

use crate::error::{Result, TensorError};
use crate::operations::argmax_rows;
use crate::scalar::Float;
use crate::tensor::Tensor;

/// A metric accumulated over batches.
pub trait Metric<T: Float> {
    fn name(&self) -> &'static str;

    /// Fold one batch of predictions and integer labels into the metric.
    fn update(&mut self, predictions: &Tensor<T>, labels: &Tensor<i64>) -> Result<()>;

    /// Current value. `0.0` before any update.
    fn compute(&self) -> f64;

    fn reset(&mut self);
}

fn ratio(correct: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    }
}

/// Fraction of rows whose arg-max class equals the label.
///
/// Predictions are `[N, C]` scores; labels hold `N` class indices.
#[derive(Debug, Clone, Default)]
pub struct Accuracy {
    correct: usize,
    total: usize,
}

impl<T: Float> Metric<T> for Accuracy {
    fn name(&self) -> &'static str {
        "accuracy"
    }

    fn update(&mut self, predictions: &Tensor<T>, labels: &Tensor<i64>) -> Result<()> {
        let predicted = argmax_rows(predictions)?;
        if predicted.len() != labels.len() {
            return Err(TensorError::ShapeMismatch {
                expected: predicted.len(),
                actual: labels.len(),
            }
            .into());
        }
        self.correct += predicted
            .iter()
            .zip(labels.data())
            .filter(|&(&p, &l)| usize::try_from(l) == Ok(p))
            .count();
        self.total += predicted.len();
        Ok(())
    }

    fn compute(&self) -> f64 {
        ratio(self.correct, self.total)
    }

    fn reset(&mut self) {
        self.correct = 0;
        self.total = 0;
    }
}

/// Fraction of predictions on the right side of a threshold.
///
/// A prediction counts as class 1 when it is at least the threshold.
#[derive(Debug, Clone)]
pub struct BinaryAccuracy {
    threshold: f64,
    correct: usize,
    total: usize,
}

impl BinaryAccuracy {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            correct: 0,
            total: 0,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Default for BinaryAccuracy {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl<T: Float> Metric<T> for BinaryAccuracy {
    fn name(&self) -> &'static str {
        "binary_accuracy"
    }

    fn update(&mut self, predictions: &Tensor<T>, labels: &Tensor<i64>) -> Result<()> {
        if predictions.len() != labels.len() {
            return Err(TensorError::ShapeMismatch {
                expected: predictions.len(),
                actual: labels.len(),
            }
            .into());
        }
        self.correct += predictions
            .data()
            .iter()
            .zip(labels.data())
            .filter(|&(&p, &l)| i64::from(p.to_f64() >= self.threshold) == l)
            .count();
        self.total += predictions.len();
        Ok(())
    }

    fn compute(&self) -> f64 {
        ratio(self.correct, self.total)
    }

    fn reset(&mut self) {
        self.correct = 0;
        self.total = 0;
    }
}

/// Multi-class accuracy.
pub fn accuracy() -> Accuracy {
    Accuracy::default()
}

/// Binary accuracy with a 0.5 threshold.
pub fn binary_accuracy() -> BinaryAccuracy {
    BinaryAccuracy::default()
}
