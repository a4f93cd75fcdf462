//! Tracked activation functions.

use super::present;
use crate::autodiff::saved_tensor::SavedTensor;
use crate::autodiff::tape::{GradFn, NodeId, NodeInputs, Tape};
use crate::autodiff::var::Var;
use crate::backend::Backend;
use crate::error::TensorError;
use crate::scalar::Float;
use crate::tensor::Tensor;

/// Which local derivative an element-wise activation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
    /// `1` where the input is positive, else `0`. Saves the input.
    Relu,
    /// `s * (1 - s)`. Saves the output.
    Sigmoid,
    /// `1 - y^2`. Saves the output.
    Tanh,
}

/// Backward function for element-wise activations.
#[derive(Debug)]
pub struct ActivationBackward<T: Float> {
    kind: Activation,
    saved: SavedTensor<T>,
    input_id: Option<NodeId>,
}

impl<T: Float> GradFn<T> for ActivationBackward<T> {
    fn name(&self) -> &'static str {
        match self.kind {
            Activation::Relu => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
        }
    }

    fn backward(
        &self,
        grad_output: &Tensor<T>,
        backend: &dyn Backend<T>,
    ) -> Result<Vec<(NodeId, Tensor<T>)>, TensorError> {
        let Some(id) = self.input_id else {
            return Ok(Vec::new());
        };
        let local = match self.kind {
            Activation::Relu => backend.map(self.saved.get(), &|x| {
                if x > T::zero() { T::one() } else { T::zero() }
            }),
            Activation::Sigmoid => backend.map(self.saved.get(), &|s| s * (T::one() - s)),
            Activation::Tanh => backend.map(self.saved.get(), &|y| T::one() - y * y),
        };
        Ok(vec![(id, backend.mul(grad_output, &local)?)])
    }

    fn inputs(&self) -> NodeInputs {
        present(&[self.input_id])
    }
}

/// Backward function for row-wise softmax.
///
/// For each row, `dx = y * (g - sum(g * y))`.
#[derive(Debug)]
pub struct SoftmaxBackward<T: Float> {
    saved_output: SavedTensor<T>,
    input_id: Option<NodeId>,
}

impl<T: Float> GradFn<T> for SoftmaxBackward<T> {
    fn name(&self) -> &'static str {
        "softmax"
    }

    fn backward(
        &self,
        grad_output: &Tensor<T>,
        _backend: &dyn Backend<T>,
    ) -> Result<Vec<(NodeId, Tensor<T>)>, TensorError> {
        let Some(id) = self.input_id else {
            return Ok(Vec::new());
        };
        let y = self.saved_output.get();
        if grad_output.shape() != y.shape() {
            return Err(TensorError::IncompatibleShapes {
                op: "softmax_backward",
                lhs: grad_output.shape().to_vec(),
                rhs: y.shape().to_vec(),
            });
        }
        let (rows, cols) = y.matrix_dims()?;
        let (g, yd) = (grad_output.data(), y.data());
        let mut out = vec![T::zero(); yd.len()];
        for i in 0..rows {
            let mut dot = T::zero();
            for j in 0..cols {
                dot = dot + g[i + j * rows] * yd[i + j * rows];
            }
            for j in 0..cols {
                let k = i + j * rows;
                out[k] = yd[k] * (g[k] - dot);
            }
        }
        Ok(vec![(id, Tensor::from_vec(out, y.shape())?)])
    }

    fn inputs(&self) -> NodeInputs {
        present(&[self.input_id])
    }
}

fn tracked_activation<T: Float>(
    tape: &mut Tape<T>,
    kind: Activation,
    a: &Var<T>,
    result: Tensor<T>,
) -> Var<T> {
    let saved = match kind {
        Activation::Relu => SavedTensor::new(a.tensor()),
        Activation::Sigmoid | Activation::Tanh => SavedTensor::new(&result),
    };
    tape.track(result, &[a], |ids| {
        Box::new(ActivationBackward {
            kind,
            saved,
            input_id: ids[0],
        })
    })
}

/// Tracked `max(x, 0)`.
pub fn tracked_relu<T: Float>(tape: &mut Tape<T>, backend: &dyn Backend<T>, a: &Var<T>) -> Var<T> {
    let result = backend.relu(a.tensor());
    tracked_activation(tape, Activation::Relu, a, result)
}

/// Tracked logistic sigmoid.
pub fn tracked_sigmoid<T: Float>(
    tape: &mut Tape<T>,
    backend: &dyn Backend<T>,
    a: &Var<T>,
) -> Var<T> {
    let result = backend.sigmoid(a.tensor());
    tracked_activation(tape, Activation::Sigmoid, a, result)
}

/// Tracked hyperbolic tangent.
pub fn tracked_tanh<T: Float>(tape: &mut Tape<T>, backend: &dyn Backend<T>, a: &Var<T>) -> Var<T> {
    let result = backend.tanh(a.tensor());
    tracked_activation(tape, Activation::Tanh, a, result)
}

/// Tracked softmax over the columns of each row of a `[rows, cols]` tensor.
pub fn tracked_softmax<T: Float>(
    tape: &mut Tape<T>,
    backend: &dyn Backend<T>,
    a: &Var<T>,
) -> Result<Var<T>, TensorError> {
    let result = backend.softmax_rows(a.tensor())?;
    let saved_output = SavedTensor::new(&result);
    Ok(tape.track(result, &[a], |ids| {
        Box::new(SoftmaxBackward {
            saved_output,
            input_id: ids[0],
        })
    }))
}
