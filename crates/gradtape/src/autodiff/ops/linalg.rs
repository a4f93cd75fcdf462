//! Tracked matrix multiplication with backward pass.

use super::present;
use crate::autodiff::saved_tensor::SavedTensor;
use crate::autodiff::tape::{GradFn, NodeId, NodeInputs, Tape};
use crate::autodiff::var::Var;
use crate::backend::Backend;
use crate::error::TensorError;
use crate::scalar::Float;
use crate::tensor::Tensor;

/// Backward function for `C = A @ B`.
///
/// `dA = dC @ B^T`, `dB = A^T @ dC`.
#[derive(Debug)]
pub struct MatmulBackward<T: Float> {
    saved_a: SavedTensor<T>,
    saved_b: SavedTensor<T>,
    input_a_id: Option<NodeId>,
    input_b_id: Option<NodeId>,
}

impl<T: Float> GradFn<T> for MatmulBackward<T> {
    fn name(&self) -> &'static str {
        "matmul"
    }

    fn backward(
        &self,
        grad_output: &Tensor<T>,
        backend: &dyn Backend<T>,
    ) -> Result<Vec<(NodeId, Tensor<T>)>, TensorError> {
        let mut result = Vec::new();
        if let Some(id) = self.input_a_id {
            let grad_a = backend.matmul(grad_output, false, self.saved_b.get(), true)?;
            result.push((id, grad_a));
        }
        if let Some(id) = self.input_b_id {
            let grad_b = backend.matmul(self.saved_a.get(), true, grad_output, false)?;
            result.push((id, grad_b));
        }
        Ok(result)
    }

    fn inputs(&self) -> NodeInputs {
        present(&[self.input_a_id, self.input_b_id])
    }
}

/// Tracked matrix product of two rank-2 tensors.
///
/// # Example
///
/// ```
/// use gradtape::{Tensor, Var};
/// use gradtape::autodiff::{Tape, tracked_matmul};
/// use gradtape::backend::CpuBackend;
///
/// let mut tape = Tape::new();
/// let a = Var::constant(Tensor::<f64>::ones(&[2, 3]));
/// let b = Var::constant(Tensor::<f64>::ones(&[3, 4]));
/// let c = tracked_matmul(&mut tape, &CpuBackend, &a, &b).unwrap();
/// assert_eq!(c.shape(), &[2, 4]);
/// assert_eq!(c.data()[0], 3.0);
/// ```
pub fn tracked_matmul<T: Float>(
    tape: &mut Tape<T>,
    backend: &dyn Backend<T>,
    a: &Var<T>,
    b: &Var<T>,
) -> Result<Var<T>, TensorError> {
    let result = backend.matmul(a.tensor(), false, b.tensor(), false)?;
    Ok(tape.track(result, &[a, b], |ids| {
        Box::new(MatmulBackward {
            saved_a: SavedTensor::new(a.tensor()),
            saved_b: SavedTensor::new(b.tensor()),
            input_a_id: ids[0],
            input_b_id: ids[1],
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::backward::backward;
    use crate::autodiff::ops::test_util::check_gradient;
    use crate::autodiff::ops::{tracked_mul, tracked_sum};
    use crate::backend::CpuBackend;
    use approx::assert_relative_eq;

    #[test]
    fn test_matmul_gradient_with_ones() {
        let mut tape = Tape::new();
        tape.set_recording(true);
        let a_t: Tensor<f64> = Tensor::ones(&[2, 3]);
        let b_t: Tensor<f64> = Tensor::ones(&[3, 4]);
        let a = Var::tracked(a_t.clone(), tape.leaf(a_t.shape(), true).unwrap());
        let b = Var::tracked(b_t.clone(), tape.leaf(b_t.shape(), true).unwrap());

        let c = tracked_matmul(&mut tape, &CpuBackend, &a, &b).unwrap();
        assert!(c.is_tracked());
        let loss = tracked_sum(&mut tape, &CpuBackend, &c);
        let grads = backward(&tape, &loss, &CpuBackend).unwrap();

        // dL/dA[i,j] = sum_k B[j,k] = 4, dL/dB[j,k] = sum_i A[i,j] = 2
        let grad_a = grads.wrt(&a).unwrap();
        assert_eq!(grad_a.shape(), &[2, 3]);
        for &v in grad_a.data() {
            assert_relative_eq!(v, 4.0);
        }
        let grad_b = grads.wrt(&b).unwrap();
        assert_eq!(grad_b.shape(), &[3, 4]);
        for &v in grad_b.data() {
            assert_relative_eq!(v, 2.0);
        }
    }

    #[test]
    fn test_matmul_only_one_side_tracked() {
        let mut tape = Tape::new();
        tape.set_recording(true);
        let w_t: Tensor<f64> = Tensor::from_row_major(vec![1.0, 2.0], &[2, 1]).unwrap();
        let w = Var::tracked(w_t.clone(), tape.leaf(w_t.shape(), true).unwrap());
        let x = Var::constant(Tensor::from_row_major(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap());

        let y = tracked_matmul(&mut tape, &CpuBackend, &x, &w).unwrap();
        let loss = tracked_sum(&mut tape, &CpuBackend, &y);
        let grads = backward(&tape, &loss, &CpuBackend).unwrap();

        // dL/dw = X^T @ 1 = [1+3, 2+4]
        assert_eq!(grads.wrt(&w).unwrap().data(), &[4.0, 6.0]);
        assert_eq!(grads.len(), 1);
    }

    #[test]
    fn test_matmul_numerical() {
        let x = Tensor::from_row_major(vec![0.5, -1.0, 2.0, 0.25, 1.5, -0.75], &[2, 3]).unwrap();
        let b = Tensor::from_row_major(vec![1.0, 2.0, -1.0, 0.5, 0.3, 0.7], &[3, 2]).unwrap();
        check_gradient(
            |tape, v| {
                let c = tracked_matmul(tape, &CpuBackend, v, &Var::constant(b.clone())).unwrap();
                let sq = tracked_mul(tape, &CpuBackend, &c, &c).unwrap();
                tracked_sum(tape, &CpuBackend, &sq)
            },
            &x,
        );
    }

    #[test]
    fn test_matmul_inner_dim_mismatch() {
        let mut tape: Tape<f64> = Tape::new();
        let a = Var::constant(Tensor::ones(&[2, 3]));
        let b = Var::constant(Tensor::ones(&[2, 3]));
        assert!(tracked_matmul(&mut tape, &CpuBackend, &a, &b).is_err());
    }
}
