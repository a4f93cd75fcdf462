//! Tracked softmax cross-entropy.

use super::{present, scalar_grad};
use crate::autodiff::saved_tensor::SavedTensor;
use crate::autodiff::tape::{GradFn, NodeId, NodeInputs, Tape};
use crate::autodiff::var::Var;
use crate::backend::Backend;
use crate::error::TensorError;
use crate::scalar::Float;
use crate::tensor::Tensor;

/// Backward function for mean softmax cross-entropy.
///
/// `dlogits = (softmax(logits) - onehot(labels)) / N`.
#[derive(Debug)]
pub struct CrossEntropyBackward<T: Float> {
    saved_probs: SavedTensor<T>,
    labels: Vec<usize>,
    input_id: Option<NodeId>,
}

impl<T: Float> GradFn<T> for CrossEntropyBackward<T> {
    fn name(&self) -> &'static str {
        "cross_entropy"
    }

    fn backward(
        &self,
        grad_output: &Tensor<T>,
        backend: &dyn Backend<T>,
    ) -> Result<Vec<(NodeId, Tensor<T>)>, TensorError> {
        let Some(id) = self.input_id else {
            return Ok(Vec::new());
        };
        let g = scalar_grad(grad_output)?;
        let probs = self.saved_probs.get();
        let rows = self.labels.len();
        let mut grad = probs.detach();
        {
            let data = grad.data_mut();
            for (i, &label) in self.labels.iter().enumerate() {
                data[i + label * rows] = data[i + label * rows] - T::one();
            }
        }
        let n = T::from_f64(rows as f64);
        Ok(vec![(id, backend.scale(&grad, g / n))])
    }

    fn inputs(&self) -> NodeInputs {
        present(&[self.input_id])
    }
}

/// Validate integer class labels against `[rows, num_classes]` logits.
pub(crate) fn class_indices(
    labels: &Tensor<i64>,
    rows: usize,
    num_classes: usize,
) -> Result<Vec<usize>, TensorError> {
    if labels.len() != rows {
        return Err(TensorError::ShapeMismatch {
            expected: rows,
            actual: labels.len(),
        });
    }
    labels
        .data()
        .iter()
        .map(|&label| match usize::try_from(label) {
            Ok(idx) if idx < num_classes => Ok(idx),
            _ => Err(TensorError::LabelOutOfRange { label, num_classes }),
        })
        .collect()
}

/// Tracked mean cross-entropy between row-wise softmax of `logits`
/// (`[N, C]`) and integer class `labels` (`N` entries).
pub fn tracked_cross_entropy<T: Float>(
    tape: &mut Tape<T>,
    backend: &dyn Backend<T>,
    logits: &Var<T>,
    labels: &Tensor<i64>,
) -> Result<Var<T>, TensorError> {
    let (rows, cols) = logits.tensor().matrix_dims()?;
    let indices = class_indices(labels, rows, cols)?;
    let log_probs = backend.log_softmax_rows(logits.tensor())?;
    let lp = log_probs.data();
    let total = indices
        .iter()
        .enumerate()
        .fold(T::zero(), |acc, (i, &label)| acc - lp[i + label * rows]);
    let loss = Tensor::scalar(total / T::from_f64(rows as f64));

    if !tape.is_recording() {
        return Ok(Var::constant(loss));
    }
    let probs = backend.map(&log_probs, &|x| x.exp());
    Ok(tape.track(loss, &[logits], |ids| {
        Box::new(CrossEntropyBackward {
            saved_probs: SavedTensor::new(&probs),
            labels: indices,
            input_id: ids[0],
        })
    }))
}
