//! Tracked reductions to a scalar.

use super::{present, scalar_grad};
use crate::autodiff::tape::{GradFn, NodeId, NodeInputs, Tape};
use crate::autodiff::var::Var;
use crate::backend::Backend;
use crate::error::TensorError;
use crate::scalar::Float;
use crate::tensor::Tensor;

/// Backward function for sum and mean: broadcasts `factor * grad` back to
/// the input shape.
#[derive(Debug)]
pub struct ReduceBackward<T: Float> {
    name: &'static str,
    input_shape: Vec<usize>,
    factor: T,
    input_id: Option<NodeId>,
}

impl<T: Float> GradFn<T> for ReduceBackward<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn backward(
        &self,
        grad_output: &Tensor<T>,
        _backend: &dyn Backend<T>,
    ) -> Result<Vec<(NodeId, Tensor<T>)>, TensorError> {
        let g = scalar_grad(grad_output)?;
        Ok(self
            .input_id
            .map(|id| (id, Tensor::full(&self.input_shape, g * self.factor)))
            .into_iter()
            .collect())
    }

    fn inputs(&self) -> NodeInputs {
        present(&[self.input_id])
    }
}

/// Tracked sum of all elements.
pub fn tracked_sum<T: Float>(tape: &mut Tape<T>, backend: &dyn Backend<T>, a: &Var<T>) -> Var<T> {
    let result = backend.sum(a.tensor());
    tape.track(result, &[a], |ids| {
        Box::new(ReduceBackward {
            name: "sum",
            input_shape: a.shape().to_vec(),
            factor: T::one(),
            input_id: ids[0],
        })
    })
}

/// Tracked mean of all elements.
pub fn tracked_mean<T: Float>(tape: &mut Tape<T>, backend: &dyn Backend<T>, a: &Var<T>) -> Var<T> {
    let result = backend.mean(a.tensor());
    let n = T::from_f64(a.len() as f64);
    tape.track(result, &[a], |ids| {
        Box::new(ReduceBackward {
            name: "mean",
            input_shape: a.shape().to_vec(),
            factor: T::one() / n,
            input_id: ids[0],
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::backward::backward;
    use crate::backend::CpuBackend;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_gradient_is_uniform() {
        let mut tape = Tape::new();
        tape.set_recording(true);
        let t: Tensor<f64> = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let x = Var::tracked(t.clone(), tape.leaf(t.shape(), true).unwrap());

        let m = tracked_mean(&mut tape, &CpuBackend, &x);
        assert_relative_eq!(m.item().unwrap(), 2.5);

        let grads = backward(&tape, &m, &CpuBackend).unwrap();
        let g = grads.wrt(&x).unwrap();
        assert_eq!(g.shape(), &[2, 2]);
        for &v in g.data() {
            assert_relative_eq!(v, 0.25);
        }
    }

    #[test]
    fn test_sum_of_sum() {
        let mut tape = Tape::new();
        tape.set_recording(true);
        let t: Tensor<f32> = Tensor::ones(&[3]);
        let x = Var::tracked(t.clone(), tape.leaf(t.shape(), true).unwrap());

        let s = tracked_sum(&mut tape, &CpuBackend, &x);
        let s2 = tracked_sum(&mut tape, &CpuBackend, &s);
        assert_eq!(s2.item(), Some(3.0));

        let grads = backward(&tape, &s2, &CpuBackend).unwrap();
        assert_eq!(grads.wrt(&x).unwrap().data(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_reduce_rejects_non_scalar_gradient() {
        let grad_fn = ReduceBackward {
            name: "sum",
            input_shape: vec![2],
            factor: 1.0f64,
            input_id: Some(NodeId::new_for_test(0)),
        };
        let result = grad_fn.backward(&Tensor::ones(&[2]), &CpuBackend);
        assert!(matches!(
            result,
            Err(TensorError::ShapeMismatch {
                expected: 1,
                actual: 2
            })
        ));
    }
}
