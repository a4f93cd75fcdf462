//! Tracked element-wise arithmetic.

use super::present;
use crate::autodiff::saved_tensor::SavedTensor;
use crate::autodiff::tape::{GradFn, NodeId, NodeInputs, Tape};
use crate::autodiff::var::Var;
use crate::backend::Backend;
use crate::error::TensorError;
use crate::scalar::Float;
use crate::tensor::Tensor;

/// Backward function for `a + b`.
#[derive(Debug)]
pub struct AddBackward {
    input_a_id: Option<NodeId>,
    input_b_id: Option<NodeId>,
}

impl<T: Float> GradFn<T> for AddBackward {
    fn name(&self) -> &'static str {
        "add"
    }

    fn backward(
        &self,
        grad_output: &Tensor<T>,
        _backend: &dyn Backend<T>,
    ) -> Result<Vec<(NodeId, Tensor<T>)>, TensorError> {
        Ok(self
            .input_a_id
            .iter()
            .chain(self.input_b_id.iter())
            .map(|&id| (id, grad_output.clone()))
            .collect())
    }

    fn inputs(&self) -> NodeInputs {
        present(&[self.input_a_id, self.input_b_id])
    }
}

/// Backward function for `a - b`.
#[derive(Debug)]
pub struct SubBackward {
    input_a_id: Option<NodeId>,
    input_b_id: Option<NodeId>,
}

impl<T: Float> GradFn<T> for SubBackward {
    fn name(&self) -> &'static str {
        "sub"
    }

    fn backward(
        &self,
        grad_output: &Tensor<T>,
        backend: &dyn Backend<T>,
    ) -> Result<Vec<(NodeId, Tensor<T>)>, TensorError> {
        let mut result = Vec::new();
        if let Some(id) = self.input_a_id {
            result.push((id, grad_output.clone()));
        }
        if let Some(id) = self.input_b_id {
            result.push((id, backend.scale(grad_output, -T::one())));
        }
        Ok(result)
    }

    fn inputs(&self) -> NodeInputs {
        present(&[self.input_a_id, self.input_b_id])
    }
}

/// Backward function for the element-wise product `a * b`.
#[derive(Debug)]
pub struct MulBackward<T: Float> {
    saved_a: SavedTensor<T>,
    saved_b: SavedTensor<T>,
    input_a_id: Option<NodeId>,
    input_b_id: Option<NodeId>,
}

impl<T: Float> GradFn<T> for MulBackward<T> {
    fn name(&self) -> &'static str {
        "mul"
    }

    fn backward(
        &self,
        grad_output: &Tensor<T>,
        backend: &dyn Backend<T>,
    ) -> Result<Vec<(NodeId, Tensor<T>)>, TensorError> {
        let mut result = Vec::new();
        if let Some(id) = self.input_a_id {
            result.push((id, backend.mul(grad_output, self.saved_b.get())?));
        }
        if let Some(id) = self.input_b_id {
            result.push((id, backend.mul(grad_output, self.saved_a.get())?));
        }
        Ok(result)
    }

    fn inputs(&self) -> NodeInputs {
        present(&[self.input_a_id, self.input_b_id])
    }
}

/// Backward function for `alpha * a`.
#[derive(Debug)]
pub struct ScaleBackward<T: Float> {
    alpha: T,
    input_id: Option<NodeId>,
}

impl<T: Float> GradFn<T> for ScaleBackward<T> {
    fn name(&self) -> &'static str {
        "scale"
    }

    fn backward(
        &self,
        grad_output: &Tensor<T>,
        backend: &dyn Backend<T>,
    ) -> Result<Vec<(NodeId, Tensor<T>)>, TensorError> {
        Ok(self
            .input_id
            .map(|id| (id, backend.scale(grad_output, self.alpha)))
            .into_iter()
            .collect())
    }

    fn inputs(&self) -> NodeInputs {
        present(&[self.input_id])
    }
}

/// Tracked element-wise addition.
pub fn tracked_add<T: Float>(
    tape: &mut Tape<T>,
    backend: &dyn Backend<T>,
    a: &Var<T>,
    b: &Var<T>,
) -> Result<Var<T>, TensorError> {
    let result = backend.add(a.tensor(), b.tensor())?;
    Ok(tape.track(result, &[a, b], |ids| {
        Box::new(AddBackward {
            input_a_id: ids[0],
            input_b_id: ids[1],
        })
    }))
}

/// Tracked element-wise subtraction.
pub fn tracked_sub<T: Float>(
    tape: &mut Tape<T>,
    backend: &dyn Backend<T>,
    a: &Var<T>,
    b: &Var<T>,
) -> Result<Var<T>, TensorError> {
    let result = backend.sub(a.tensor(), b.tensor())?;
    Ok(tape.track(result, &[a, b], |ids| {
        Box::new(SubBackward {
            input_a_id: ids[0],
            input_b_id: ids[1],
        })
    }))
}

/// Tracked element-wise product.
pub fn tracked_mul<T: Float>(
    tape: &mut Tape<T>,
    backend: &dyn Backend<T>,
    a: &Var<T>,
    b: &Var<T>,
) -> Result<Var<T>, TensorError> {
    let result = backend.mul(a.tensor(), b.tensor())?;
    Ok(tape.track(result, &[a, b], |ids| {
        Box::new(MulBackward {
            saved_a: SavedTensor::new(a.tensor()),
            saved_b: SavedTensor::new(b.tensor()),
            input_a_id: ids[0],
            input_b_id: ids[1],
        })
    }))
}

/// Tracked multiplication by a constant.
pub fn tracked_scale<T: Float>(
    tape: &mut Tape<T>,
    backend: &dyn Backend<T>,
    a: &Var<T>,
    alpha: T,
) -> Var<T> {
    let result = backend.scale(a.tensor(), alpha);
    tape.track(result, &[a], |ids| {
        Box::new(ScaleBackward {
            alpha,
            input_id: ids[0],
        })
    })
}

/// Tracked negation.
pub fn tracked_neg<T: Float>(tape: &mut Tape<T>, backend: &dyn Backend<T>, a: &Var<T>) -> Var<T> {
    tracked_scale(tape, backend, a, -T::one())
}

/// Tracked element-wise square, recorded as `a * a`.
pub fn tracked_square<T: Float>(
    tape: &mut Tape<T>,
    backend: &dyn Backend<T>,
    a: &Var<T>,
) -> Result<Var<T>, TensorError> {
    tracked_mul(tape, backend, a, a)
}
