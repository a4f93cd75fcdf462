//! Losses and metrics for training loops.

mod loss;
mod metric;

pub use loss::{
    CrossEntropyLoss, Loss, MeanSquaredError, Mse, SoftmaxCrossEntropy, cross_entropy, mse,
};
pub use metric::{Accuracy, BinaryAccuracy, Metric, accuracy, binary_accuracy};
